use thiserror::Error;

/// Errors raised by the chat core. Every variant ends the current user
/// action; nothing in the core retries.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("A session named \"{0}\" already exists")]
    DuplicateSessionName(String),

    #[error("The model '{0}' is not available locally")]
    ProviderUnavailable(String),

    #[error("Session {0} not found")]
    SessionNotFound(i64),

    #[error("Store error: {0}")]
    Store(#[from] tokio_rusqlite::Error),

    #[error("Completion provider failed: {0}")]
    ProviderStream(String),
}

impl ChatError {
    pub fn provider<E: std::fmt::Display>(err: E) -> Self {
        Self::ProviderStream(err.to_string())
    }
}

impl From<rusqlite::Error> for ChatError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(tokio_rusqlite::Error::Rusqlite(err))
    }
}
