//! Test utilities for integration tests
#![allow(dead_code)]

use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use axum::{Router, body::Body};
use futures_util::StreamExt;
use futures_util::stream;
use tempfile::TempDir;

use parley::api::AppState;
use parley::api::app;
use parley::chat::{CompletionProvider, CompletionStreamer, FragmentStream};
use parley::core::db::Database;
use parley::core::{AppConfig, ChatError};

pub const TEST_MODEL: &str = "llama3.2:1b";

/// Creates an initialized database in a temporary directory. The
/// directory is removed when the returned `TempDir` is dropped so keep
/// it alive for the duration of the test.
pub async fn test_db() -> (TempDir, Database) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db = Database::new(dir.path().join("parley.db"));
    db.initialize().await.expect("Failed to initialize db");
    (dir, db)
}

/// A provider that replays a fixed script of fragments and records
/// the prompts it was given.
#[derive(Clone, Default)]
pub struct FakeProvider {
    fragments: Vec<String>,
    // Emit an error after this many fragments
    fail_after: Option<usize>,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl FakeProvider {
    pub fn new(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn failing_after(fragments: &[&str], n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::new(fragments)
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for FakeProvider {
    async fn fragments(&self, _model: &str, prompt: &str) -> Result<FragmentStream, ChatError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let mut items: Vec<Result<String, ChatError>> =
            self.fragments.iter().cloned().map(Ok).collect();
        if let Some(n) = self.fail_after {
            items.truncate(n);
            items.push(Err(ChatError::ProviderStream("provider went away".to_string())));
        }
        Ok(stream::iter(items).boxed())
    }
}

pub fn test_streamer(provider: FakeProvider) -> CompletionStreamer {
    CompletionStreamer::new(
        Arc::new(provider),
        vec![TEST_MODEL.to_string(), "falcon:7b".to_string()],
    )
}

/// Creates a test application router backed by a temporary database
/// and a fake provider.
pub async fn test_app(provider: FakeProvider) -> (TempDir, Router) {
    let (dir, db) = test_db().await;
    let app_config = AppConfig {
        storage_path: dir.path().display().to_string(),
        db_path: db.path().display().to_string(),
        ollama_api_hostname: String::from("http://localhost:11434"),
        models: vec![TEST_MODEL.to_string(), "falcon:7b".to_string()],
        default_model: TEST_MODEL.to_string(),
    };
    let app_state = AppState::new(db, test_streamer(provider), app_config);
    (dir, app(Arc::new(RwLock::new(app_state))))
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not utf8")
}

/// Splits an SSE body into `(event, data)` pairs, decoding each data
/// field as JSON. Keep-alive comments are skipped.
pub fn sse_events(body: &str) -> Vec<(String, serde_json::Value)> {
    body.split("\n\n")
        .filter_map(|block| {
            let mut event = None;
            let mut data = None;
            for line in block.lines() {
                if let Some(name) = line.strip_prefix("event: ") {
                    event = Some(name.to_string());
                } else if let Some(payload) = line.strip_prefix("data: ") {
                    data = Some(serde_json::from_str(payload).expect("Data is not JSON"));
                }
            }
            Some((event?, data?))
        })
        .collect()
}
