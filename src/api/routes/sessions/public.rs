//! Public types for the sessions API
use serde::{Deserialize, Serialize};

use crate::chat::{ChatMessage, Session};

#[derive(Deserialize)]
pub struct SessionNameRequest {
    pub name: String,
}

#[derive(Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<Session>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub session: Session,
    pub history: Vec<ChatMessage>,
}

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
    // Falls back to the configured default model
    pub model: Option<String>,
}

/// Final event of a chat stream
#[derive(Serialize)]
pub struct ChatDone {
    pub message: ChatMessage,
}

/// Live text of a chat stream so far. Sent as JSON so carriage returns
/// and newlines survive SSE framing.
#[derive(Serialize)]
pub struct ChatFragment<'a> {
    pub text: &'a str,
}

#[derive(Serialize)]
pub struct ChatFailed {
    pub error: String,
}
