use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use rusqlite::types::{Type, Value};

use super::models::{ChatMessage, NewMessage, Session};
use crate::core::ChatError;
use crate::core::db::Database;

// Sessions

/// Create a new session and return its id. Fails with
/// `DuplicateSessionName` without inserting anything when a session
/// with exactly the same name exists.
pub async fn create_session(db: &Database, session_name: &str) -> Result<i64, ChatError> {
    let name = session_name.to_owned();
    // The check, insert, and id lookup all happen under one write lock
    // so two callers can't both pass the check
    let session_id = db
        .transaction(move |tx| {
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT session_id FROM chat_sessions WHERE session_name = ?1",
                    [&name],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                return Ok(None);
            }

            tx.execute(
                "INSERT INTO chat_sessions (session_name) VALUES (?1)",
                [&name],
            )?;
            let session_id: i64 = tx.query_row(
                "SELECT session_id FROM chat_sessions ORDER BY session_id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )?;
            Ok(Some(session_id))
        })
        .await?;

    match session_id {
        Some(id) => {
            tracing::info!("Created session {} ({})", id, session_name);
            Ok(id)
        }
        None => Err(ChatError::DuplicateSessionName(session_name.to_string())),
    }
}

/// All sessions, most recently created first.
pub async fn list_sessions(db: &Database) -> Result<Vec<Session>, ChatError> {
    db.fetch(
        "SELECT session_id, session_name FROM chat_sessions ORDER BY session_id DESC",
        vec![],
        |row| {
            Ok(Session {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        },
    )
    .await
}

pub async fn find_session(db: &Database, session_id: i64) -> Result<Option<Session>, ChatError> {
    let sessions = db
        .fetch(
            "SELECT session_id, session_name FROM chat_sessions WHERE session_id = ?1",
            vec![Value::Integer(session_id)],
            |row| {
                Ok(Session {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .await?;
    Ok(sessions.into_iter().next())
}

/// Names are only unique at creation time so after a rename the newest
/// match wins.
pub async fn find_session_by_name(
    db: &Database,
    session_name: &str,
) -> Result<Option<Session>, ChatError> {
    let sessions = db
        .fetch(
            "SELECT session_id, session_name FROM chat_sessions WHERE session_name = ?1 ORDER BY session_id DESC",
            vec![Value::from(session_name.to_string())],
            |row| {
                Ok(Session {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .await?;
    Ok(sessions.into_iter().next())
}

/// Unconditional rename. Name uniqueness is not re-checked here.
pub async fn rename_session(
    db: &Database,
    session_id: i64,
    new_name: &str,
) -> Result<(), ChatError> {
    let changed = db
        .execute(
            "UPDATE chat_sessions SET session_name = ?1 WHERE session_id = ?2",
            vec![Value::from(new_name.to_string()), Value::Integer(session_id)],
        )
        .await?;
    tracing::info!(
        "Renamed session {} to {} ({} row(s))",
        session_id,
        new_name,
        changed
    );
    Ok(())
}

/// Delete a session and all of its messages. Both deletes either
/// commit together or not at all.
pub async fn delete_session(db: &Database, session_id: i64) -> Result<(), ChatError> {
    db.transaction(move |tx| {
        tx.execute(
            "DELETE FROM chat_history WHERE session_id = ?1",
            [session_id],
        )?;
        tx.execute(
            "DELETE FROM chat_sessions WHERE session_id = ?1",
            [session_id],
        )?;
        Ok(())
    })
    .await?;
    tracing::info!("Deleted session {}", session_id);
    Ok(())
}

// Transcript

fn parse_timestamp(idx: usize, val: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(val)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Store one message. The timestamp is assigned by the store and
/// returned along with the stored message.
pub async fn append_message(
    db: &Database,
    session_id: i64,
    msg: &NewMessage,
) -> Result<ChatMessage, ChatError> {
    let timestamp = db
        .fetch_one(
            "INSERT INTO chat_history (session_id, role, content) VALUES (?1, ?2, ?3) RETURNING timestamp",
            vec![
                Value::Integer(session_id),
                Value::from(msg.role()),
                Value::from(msg.content.clone()),
            ],
            |row| {
                let ts: String = row.get(0)?;
                parse_timestamp(0, &ts)
            },
        )
        .await?;

    Ok(msg.clone().stored_at(timestamp))
}

/// Ordered history for a session, oldest first. Messages with the same
/// timestamp keep the order they were appended in.
pub async fn load_history(db: &Database, session_id: i64) -> Result<Vec<ChatMessage>, ChatError> {
    db.fetch(
        r#"
        SELECT timestamp, role, content
        FROM chat_history
        WHERE session_id = ?1
        ORDER BY timestamp ASC, rowid ASC
        "#,
        vec![Value::Integer(session_id)],
        |row| {
            let ts: String = row.get(0)?;
            Ok(ChatMessage::from_row(
                parse_timestamp(0, &ts)?,
                row.get(1)?,
                row.get(2)?,
            ))
        },
    )
    .await
}
