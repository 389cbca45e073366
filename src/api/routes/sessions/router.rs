//! Router for the sessions API

use std::convert::Infallible;
use std::sync::{Arc, RwLock};

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, sse::Event, sse::KeepAlive, sse::Sse},
    routing::{get, patch, post},
};
use tokio::sync::mpsc;
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::public;
use crate::api::public::ApiError;
use crate::api::state::AppState;
use crate::chat::{
    ConversationSession, Session, create_session, delete_session, list_sessions, rename_session,
    submit_prompt,
};

type SharedState = Arc<RwLock<AppState>>;

/// Get a list of all chat sessions, newest first
async fn session_list(
    State(state): State<SharedState>,
) -> Result<axum::Json<public::SessionsResponse>, ApiError> {
    let db = state.read().expect("Unable to read share state").db.clone();
    let sessions = list_sessions(&db).await?;
    Ok(axum::Json(public::SessionsResponse { sessions }))
}

/// Start a new named session
async fn session_create(
    State(state): State<SharedState>,
    axum::Json(payload): axum::Json<public::SessionNameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.read().expect("Unable to read share state").db.clone();
    let id = create_session(&db, &payload.name).await?;
    Ok((
        StatusCode::CREATED,
        axum::Json(Session {
            id,
            name: payload.name,
        }),
    ))
}

async fn session_rename(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    axum::Json(payload): axum::Json<public::SessionNameRequest>,
) -> Result<axum::Json<Session>, ApiError> {
    let db = state.read().expect("Unable to read share state").db.clone();
    rename_session(&db, id, &payload.name).await?;
    Ok(axum::Json(Session {
        id,
        name: payload.name,
    }))
}

/// Delete a session along with its messages
async fn session_delete(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let db = state.read().expect("Unable to read share state").db.clone();
    delete_session(&db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Get the transcript of a single session
async fn session_history(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<axum::Json<public::HistoryResponse>, ApiError> {
    let db = state.read().expect("Unable to read share state").db.clone();
    let conversation = ConversationSession::open_by_id(&db, id).await?;
    Ok(axum::Json(public::HistoryResponse {
        session: conversation.session(),
        history: conversation.transcript.messages().to_vec(),
    }))
}

/// Add a prompt to a session and stream the response.
///
/// Emits a `fragment` event with the accumulated text (`{"text"}`)
/// after each fragment, then either a `done` event with the stored
/// response or an `error` event (`{"error"}`). Every payload is JSON.
async fn chat_handler(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    axum::Json(payload): axum::Json<public::ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (db, streamer, default_model) = {
        let shared_state = state.read().expect("Unable to read share state");
        (
            shared_state.db.clone(),
            shared_state.streamer.clone(),
            shared_state.config.default_model.clone(),
        )
    };
    let model = payload.model.unwrap_or(default_model);

    // Reject before the stream is opened so the client gets a status code
    streamer.select_provider(&model)?;
    let mut conversation = ConversationSession::open_by_id(&db, id).await?;

    let (tx, rx) = mpsc::unbounded_channel::<Event>();
    let sse_stream = UnboundedReceiverStream::new(rx).map(Ok::<Event, Infallible>);

    tokio::spawn(async move {
        let fragment_tx = tx.clone();
        let result = submit_prompt(
            &db,
            &streamer,
            &mut conversation,
            &model,
            &payload.message,
            |text| {
                match Event::default()
                    .event("fragment")
                    .json_data(public::ChatFragment { text })
                {
                    // Keep generating if the client disconnected so the
                    // response is still saved
                    Ok(event) => {
                        let _ = fragment_tx.send(event);
                    }
                    Err(e) => tracing::error!("Failed to encode chat fragment: {}", e),
                }
            },
        )
        .await;

        let event = match result {
            Ok(message) => Event::default()
                .event("done")
                .json_data(public::ChatDone { message }),
            Err(e) => {
                tracing::error!("Chat handler error for session {}: {}", id, e);
                Event::default()
                    .event("error")
                    .json_data(public::ChatFailed {
                        error: e.to_string(),
                    })
            }
        };
        match event {
            Ok(event) => {
                let _ = tx.send(event);
            }
            Err(e) => tracing::error!("Failed to encode chat event: {}", e),
        }
    });

    Ok(Sse::new(sse_stream)
        .keep_alive(KeepAlive::default())
        .into_response())
}

/// Create the sessions router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(session_list).post(session_create))
        .route("/{id}", patch(session_rename).delete(session_delete))
        .route("/{id}/history", get(session_history))
        .route("/{id}/chat", post(chat_handler))
}
