use anyhow::Result;

use super::chat::render_message;
use crate::chat::{ConversationSession, delete_session, list_sessions, rename_session};
use crate::core::AppConfig;
use crate::core::db::Database;

/// Open the store, creating the schema on first use.
async fn open_db(config: &AppConfig) -> Result<Database> {
    let db = Database::new(&config.db_path);
    db.initialize().await?;
    Ok(db)
}

pub async fn list(config: &AppConfig) -> Result<()> {
    let db = open_db(config).await?;
    let sessions = list_sessions(&db).await?;
    if sessions.is_empty() {
        println!("No sessions found");
    }
    for session in sessions {
        println!("{}\t{}", session.id, session.name);
    }
    Ok(())
}

pub async fn history(config: &AppConfig, id: i64) -> Result<()> {
    let db = open_db(config).await?;
    let conversation = ConversationSession::open_by_id(&db, id).await?;
    println!("== {} ==", conversation.name);
    for msg in conversation.transcript.iter() {
        println!("{}\n", render_message(msg));
    }
    Ok(())
}

pub async fn rename(config: &AppConfig, id: i64, name: &str) -> Result<()> {
    let db = open_db(config).await?;
    rename_session(&db, id, name).await?;
    println!("Session name updated successfully.");
    Ok(())
}

pub async fn delete(config: &AppConfig, id: i64) -> Result<()> {
    let db = open_db(config).await?;
    delete_session(&db, id).await?;
    println!("Session deleted successfully.");
    Ok(())
}
