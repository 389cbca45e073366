//! The core models for a stateful, persisted chat.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The value stored in the `role` column for user messages. Assistant
/// messages store the id of the model that produced them instead.
pub const USER_ROLE: &str = "User";

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Session {
    pub id: i64,
    pub name: String,
}

/// A message that hasn't been stored yet and so has no timestamp.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewMessage {
    pub speaker: Speaker,
    pub produced_by: Option<String>,
    pub content: String,
}

impl NewMessage {
    pub fn user(content: &str) -> Self {
        Self {
            speaker: Speaker::User,
            produced_by: None,
            content: content.to_string(),
        }
    }

    pub fn assistant(model: &str, content: &str) -> Self {
        Self {
            speaker: Speaker::Assistant,
            produced_by: Some(model.to_string()),
            content: content.to_string(),
        }
    }

    /// Encode speaker and provenance into the single `role` column.
    pub fn role(&self) -> String {
        match (self.speaker, &self.produced_by) {
            (Speaker::User, _) => USER_ROLE.to_string(),
            (Speaker::Assistant, Some(model)) => model.clone(),
            (Speaker::Assistant, None) => "Assistant".to_string(),
        }
    }

    pub fn stored_at(self, timestamp: DateTime<Utc>) -> ChatMessage {
        ChatMessage {
            timestamp,
            speaker: self.speaker,
            produced_by: self.produced_by,
            content: self.content,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub timestamp: DateTime<Utc>,
    pub speaker: Speaker,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub produced_by: Option<String>,
    pub content: String,
}

impl ChatMessage {
    /// Decode a stored row. The user marker is matched case
    /// insensitively; any other role is the producing model's id.
    pub fn from_row(timestamp: DateTime<Utc>, role: String, content: String) -> Self {
        let (speaker, produced_by) = if role.eq_ignore_ascii_case(USER_ROLE) {
            (Speaker::User, None)
        } else {
            (Speaker::Assistant, Some(role))
        };
        Self {
            timestamp,
            speaker,
            produced_by,
            content,
        }
    }

    pub fn is_user(&self) -> bool {
        self.speaker == Speaker::User
    }

    /// Label used when rendering or building prompts, e.g. `User` or
    /// `llama3.2:1b`.
    pub fn label(&self) -> &str {
        match (self.speaker, &self.produced_by) {
            (Speaker::User, _) => USER_ROLE,
            (Speaker::Assistant, Some(model)) => model,
            (Speaker::Assistant, None) => "Assistant",
        }
    }
}

#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct Transcript(Vec<ChatMessage>);

impl Transcript {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn new_with_messages(messages: Vec<ChatMessage>) -> Self {
        Self(messages)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.0
    }

    pub fn push(&mut self, msg: ChatMessage) {
        self.0.push(msg)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChatMessage> {
        self.0.iter()
    }
}

/// The active conversation: which session is selected and what it
/// contains so far. Passed explicitly through each turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationSession {
    pub id: i64,
    pub name: String,
    pub transcript: Transcript,
}

impl ConversationSession {
    pub fn new(session: Session, transcript: Transcript) -> Self {
        Self {
            id: session.id,
            name: session.name,
            transcript,
        }
    }

    pub fn session(&self) -> Session {
        Session {
            id: self.id,
            name: self.name.clone(),
        }
    }

    pub fn renamed(self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..self
        }
    }

    pub fn push(&mut self, msg: ChatMessage) {
        self.transcript.push(msg)
    }
}
