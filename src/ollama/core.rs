use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;

use crate::chat::{CompletionProvider, FragmentStream};
use crate::core::ChatError;

// {"model":"llama3.2:1b","created_at":"...","response":"Hel","done":false}
// ...
// {"model":"llama3.2:1b","created_at":"...","response":"","done":true,"done_reason":"stop",...}
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

/// Streams completions from an Ollama compatible `/api/generate`
/// endpoint.
#[derive(Clone, Debug)]
pub struct OllamaProvider {
    api_hostname: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(api_hostname: &str) -> Self {
        Self {
            api_hostname: api_hostname.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

/// Parse one NDJSON line. Returns the fragment (if any) and whether
/// the provider signaled completion.
fn parse_line(line: &[u8]) -> Result<(Option<String>, bool), ChatError> {
    let line = std::str::from_utf8(line).map_err(ChatError::provider)?.trim();
    if line.is_empty() {
        return Ok((None, false));
    }
    let chunk = serde_json::from_str::<GenerateChunk>(line).inspect_err(|e| {
        tracing::error!("Parsing completion chunk failed for {}\nError:{}", line, e)
    });
    let chunk = chunk.map_err(ChatError::provider)?;
    if let Some(err) = chunk.error {
        return Err(ChatError::ProviderStream(err));
    }
    let fragment = (!chunk.response.is_empty()).then_some(chunk.response);
    Ok((fragment, chunk.done))
}

/// Decode a byte stream of newline delimited JSON into fragments.
fn ndjson_fragments<S, B, E>(
    bytes: S,
) -> impl Stream<Item = Result<String, ChatError>> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    async_stream::try_stream! {
        let mut bytes = Box::pin(bytes);
        // Lines can be split across network chunks, including in the
        // middle of a multi-byte character, so buffer raw bytes and only
        // decode complete lines
        let mut buffer: Vec<u8> = Vec::new();

        'outer: while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(ChatError::provider)?;
            buffer.extend_from_slice(chunk.as_ref());

            while let Some(line_end) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=line_end).collect();
                let (fragment, done) = parse_line(&line)?;
                if let Some(fragment) = fragment {
                    yield fragment;
                }
                if done {
                    break 'outer;
                }
            }
        }

        // Trailing line without a newline
        let (fragment, _) = parse_line(&buffer)?;
        if let Some(fragment) = fragment {
            yield fragment;
        }
    }
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    async fn fragments(&self, model: &str, prompt: &str) -> Result<FragmentStream, ChatError> {
        let payload = json!({
            "model": model,
            "prompt": prompt,
            "stream": true,
        });
        let url = format!("{}/api/generate", self.api_hostname);
        tracing::debug!("Requesting completion from {} with {}", url, model);

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .timeout(Duration::from_secs(60 * 5))
            .json(&payload)
            .send()
            .await
            .map_err(ChatError::provider)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::ProviderStream(format!("{}: {}", status, body)));
        }

        Ok(Box::pin(ndjson_fragments(response.bytes_stream())))
    }
}
