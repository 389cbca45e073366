use super::context::build_context;
use super::db::{append_message, find_session, load_history};
use super::models::{ChatMessage, ConversationSession, NewMessage, Session, Transcript};
use super::stream::CompletionStreamer;
use crate::core::ChatError;
use crate::core::db::Database;

impl ConversationSession {
    /// Load a session's stored history into a new conversation.
    pub async fn open(db: &Database, session: Session) -> Result<Self, ChatError> {
        let history = load_history(db, session.id).await?;
        Ok(Self::new(session, Transcript::new_with_messages(history)))
    }

    pub async fn open_by_id(db: &Database, session_id: i64) -> Result<Self, ChatError> {
        let session = find_session(db, session_id)
            .await?
            .ok_or(ChatError::SessionNotFound(session_id))?;
        Self::open(db, session).await
    }
}

/// Runs one turn of the conversation: persists the prompt, streams the
/// response from `model` to `on_fragment`, then persists the response
/// tagged with the model that produced it.
///
/// The model is validated before anything is written. When the
/// provider fails the prompt stays stored but the partial response is
/// discarded.
pub async fn submit_prompt<F>(
    db: &Database,
    streamer: &CompletionStreamer,
    conversation: &mut ConversationSession,
    model: &str,
    prompt: &str,
    on_fragment: F,
) -> Result<ChatMessage, ChatError>
where
    F: FnMut(&str),
{
    let mut handle = streamer.select_provider(model)?;

    // Context comes from the transcript before this prompt so the
    // prompt only appears once, as the last line
    let context = build_context(conversation.transcript.messages(), prompt);

    let user_msg = append_message(db, conversation.id, &NewMessage::user(prompt)).await?;
    conversation.push(user_msg);

    let response = streamer.stream(&mut handle, &context, on_fragment).await?;

    let assistant_msg =
        append_message(db, conversation.id, &NewMessage::assistant(model, &response)).await?;
    conversation.push(assistant_msg.clone());

    Ok(assistant_msg)
}
