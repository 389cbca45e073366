//! Streaming completions from a provider into a live sink.
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;

use crate::core::ChatError;

/// Ordered text fragments emitted by a provider. The stream ending is
/// the completion signal; there is no terminal marker fragment.
pub type FragmentStream = BoxStream<'static, Result<String, ChatError>>;

/// The external text generation engine.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Start generating a response to `prompt` with `model`. Errors
    /// returned here mean generation never started.
    async fn fragments(&self, model: &str, prompt: &str) -> Result<FragmentStream, ChatError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Invoking,
    Streaming,
    Completed,
    Failed,
}

impl StreamState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamState::Completed | StreamState::Failed)
    }
}

/// A validated model selection. Only `CompletionStreamer::select_provider`
/// constructs one, and each handle streams a single response.
#[derive(Debug)]
pub struct ProviderHandle {
    model: String,
    state: StreamState,
}

impl ProviderHandle {
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    fn transition(&mut self, next: StreamState) {
        tracing::debug!("Stream for {}: {:?} -> {:?}", self.model, self.state, next);
        self.state = next;
    }
}

#[derive(Clone)]
pub struct CompletionStreamer {
    provider: Arc<dyn CompletionProvider>,
    models: Arc<Vec<String>>,
}

impl CompletionStreamer {
    pub fn new(provider: Arc<dyn CompletionProvider>, models: Vec<String>) -> Self {
        Self {
            provider,
            models: Arc::new(models),
        }
    }

    /// The allow-list of locally available models.
    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Validate `model_id` against the allow-list. This is a
    /// configuration check, the provider is not contacted.
    pub fn select_provider(&self, model_id: &str) -> Result<ProviderHandle, ChatError> {
        if !self.models.iter().any(|m| m == model_id) {
            tracing::debug!("Rejected model {}", model_id);
            return Err(ChatError::ProviderUnavailable(model_id.to_string()));
        }
        Ok(ProviderHandle {
            model: model_id.to_string(),
            state: StreamState::Idle,
        })
    }

    /// Check the handle is unused and ask the provider to start. Leaves
    /// the handle `Streaming` on success and `Failed` otherwise.
    async fn start(
        &self,
        handle: &mut ProviderHandle,
        prompt: &str,
    ) -> Result<FragmentStream, ChatError> {
        if handle.state != StreamState::Idle {
            return Err(ChatError::ProviderStream(format!(
                "Stream for {} was already started ({:?})",
                handle.model, handle.state
            )));
        }

        handle.transition(StreamState::Invoking);
        match self.provider.fragments(&handle.model, prompt).await {
            Ok(fragments) => {
                handle.transition(StreamState::Streaming);
                Ok(fragments)
            }
            Err(err) => {
                handle.transition(StreamState::Failed);
                Err(err)
            }
        }
    }

    /// Pull-based access to the raw fragments. The caller drives the
    /// stream and may drop it at any point to stop consuming. The handle
    /// is used up either way.
    pub async fn fragments(
        &self,
        handle: &mut ProviderHandle,
        prompt: &str,
    ) -> Result<FragmentStream, ChatError> {
        self.start(handle, prompt).await
    }

    /// Run the completion to the end. After each fragment `on_fragment`
    /// is called with the text accumulated so far. Returns the full
    /// response. On failure the partial text is dropped.
    pub async fn stream<F>(
        &self,
        handle: &mut ProviderHandle,
        prompt: &str,
        mut on_fragment: F,
    ) -> Result<String, ChatError>
    where
        F: FnMut(&str),
    {
        let mut fragments = self.start(handle, prompt).await?;

        let mut response = String::new();
        while let Some(fragment) = fragments.next().await {
            match fragment {
                Ok(fragment) => {
                    response.push_str(&fragment);
                    on_fragment(&response);
                }
                Err(err) => {
                    tracing::error!(
                        "Stream for {} failed after {} bytes: {}",
                        handle.model,
                        response.len(),
                        err
                    );
                    handle.transition(StreamState::Failed);
                    return Err(err);
                }
            }
        }

        handle.transition(StreamState::Completed);
        Ok(response)
    }
}
