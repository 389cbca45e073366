//! Public API types

use axum::response::{IntoResponse, Response};
use http::StatusCode;

use crate::core::ChatError;

// Errors

pub struct ApiError(anyhow::Error);

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0.downcast_ref::<ChatError>() {
            Some(ChatError::DuplicateSessionName(_)) => StatusCode::CONFLICT,
            Some(ChatError::ProviderUnavailable(_)) => StatusCode::BAD_REQUEST,
            Some(ChatError::SessionNotFound(_)) => StatusCode::NOT_FOUND,
            Some(ChatError::ProviderStream(_)) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convert `ApiError` into an Axum compatible response.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self.0);
            return (status, format!("Something went wrong: {}", self.0)).into_response();
        }

        tracing::debug!("Rejected request: {}", self.0);
        (status, self.0.to_string()).into_response()
    }
}

/// Enables using `?` on functions that return `Result<_,
/// anyhow::Error>` to turn them into `Result<_, ApiError>`
impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

// Re-export public types from each route

pub mod sessions {
    pub use crate::api::routes::sessions::public::*;
}

pub mod models {
    pub use crate::api::routes::models::public::*;
}
