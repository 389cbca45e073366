//! Persistence gateway for the chat store.
//!
//! A `Database` is only a handle to a SQLite file. Each logical
//! operation opens its own connection, runs its statements, and drops
//! the connection when it returns so nothing is held between calls.
//! Statements are `&'static str` and every value is a bound parameter.
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::types::Value;
use rusqlite::{Row, Transaction, TransactionBehavior, params_from_iter};
use tokio_rusqlite::Connection;

use super::ChatError;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chat_sessions (
    session_id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chat_history (
    session_id INTEGER NOT NULL REFERENCES chat_sessions(session_id) ON DELETE CASCADE,
    timestamp TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    role TEXT NOT NULL,
    content TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS chat_history_session_id_timestamp
    ON chat_history (session_id, timestamp);
"#;

/// Create the tables if they don't already exist. Safe to run on
/// every start.
pub fn initialize_db(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}

#[derive(Clone, Debug)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a fresh connection with foreign keys enforced.
    pub async fn connect(&self) -> Result<Connection, ChatError> {
        let conn = Connection::open(&self.path).await?;
        conn.call(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            Ok(())
        })
        .await?;
        Ok(conn)
    }

    pub async fn initialize(&self) -> Result<(), ChatError> {
        let conn = self.connect().await?;
        conn.call(|conn| {
            initialize_db(conn)?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    /// Run a single statement and return the number of rows affected.
    pub async fn execute(&self, sql: &'static str, params: Vec<Value>) -> Result<usize, ChatError> {
        tracing::debug!("execute: {}", sql);
        let conn = self.connect().await?;
        let changed = conn
            .call(move |conn| {
                let changed = conn.execute(sql, params_from_iter(params.iter()))?;
                Ok(changed)
            })
            .await?;
        Ok(changed)
    }

    /// Run a query and map every row.
    pub async fn fetch<T, F>(
        &self,
        sql: &'static str,
        params: Vec<Value>,
        map_row: F,
    ) -> Result<Vec<T>, ChatError>
    where
        T: Send + 'static,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T> + Send + 'static,
    {
        tracing::debug!("fetch: {}", sql);
        let conn = self.connect().await?;
        let rows = conn
            .call(move |conn| {
                let mut stmt = conn.prepare(sql)?;
                let rows = stmt
                    .query_map(params_from_iter(params.iter()), map_row)?
                    .collect::<rusqlite::Result<Vec<T>>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    /// Run a query that must produce exactly one row.
    pub async fn fetch_one<T, F>(
        &self,
        sql: &'static str,
        params: Vec<Value>,
        map_row: F,
    ) -> Result<T, ChatError>
    where
        T: Send + 'static,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T> + Send + 'static,
    {
        tracing::debug!("fetch_one: {}", sql);
        let conn = self.connect().await?;
        let row = conn
            .call(move |conn| {
                let row = conn.query_row(sql, params_from_iter(params.iter()), map_row)?;
                Ok(row)
            })
            .await?;
        Ok(row)
    }

    /// Run `f` inside a single immediate transaction. The write lock is
    /// taken up front so a read followed by a write can't interleave
    /// with another writer. Returning an error rolls everything back.
    pub async fn transaction<T, F>(&self, f: F) -> Result<T, ChatError>
    where
        T: Send + 'static,
        F: FnOnce(&Transaction<'_>) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = self.connect().await?;
        let out = conn
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let out = f(&tx)?;
                tx.commit()?;
                Ok(out)
            })
            .await?;
        Ok(out)
    }
}
