//! Router for the models API

use std::sync::{Arc, RwLock};

use axum::{Router, extract::State, routing::get};

use super::public;
use crate::api::state::AppState;

type SharedState = Arc<RwLock<AppState>>;

/// List the models that can be selected for a chat
async fn models_list(State(state): State<SharedState>) -> axum::Json<public::ModelsResponse> {
    let shared_state = state.read().expect("Unable to read share state");
    axum::Json(public::ModelsResponse {
        models: shared_state.streamer.models().to_vec(),
        default_model: shared_state.config.default_model.clone(),
    })
}

/// Create the models router
pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(models_list))
}
