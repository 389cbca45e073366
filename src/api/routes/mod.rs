//! API routes module

pub mod models;
pub mod sessions;

use std::sync::{Arc, RwLock};

use crate::api::state::AppState;
use axum::Router;

type SharedState = Arc<RwLock<AppState>>;

/// Create the combined API router
pub fn router() -> Router<SharedState> {
    Router::new()
        // Session management, history, and chat
        .nest("/sessions", sessions::router())
        // Locally available models
        .nest("/models", models::router())
}
