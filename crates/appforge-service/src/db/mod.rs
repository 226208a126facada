//! Persistence layer: a rusqlite connection behind a blocking-task bridge
//! and one repository per aggregate.

pub mod apps;
pub mod chats;
pub mod schema;
pub mod settings;
pub mod users;

use crate::error::ApiError;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

pub use apps::{App, AppRepository};
pub use chats::{Chat, ChatRepository, Message, MessageRole};
pub use settings::{Settings, SettingsRepository};
pub use users::{User, UserRepository};

/// Shared handle to the sqlite database.
///
/// All queries run on the blocking pool; the connection is never touched from
/// an async context directly.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub async fn connect(path: &str) -> Result<Self, ApiError> {
        let db_path = path.to_string();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, rusqlite::Error> {
            let mut conn = if db_path == ":memory:" {
                Connection::open_in_memory()?
            } else {
                Connection::open(&db_path)?
            };
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            schema::init_schema(&mut conn)?;
            Ok(conn)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("failed to spawn blocking task: {e}")))??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    pub(crate) async fn run_blocking<F, R>(&self, f: F) -> Result<R, ApiError>
    where
        F: FnOnce(&mut Connection) -> Result<R, rusqlite::Error> + Send + 'static,
        R: Send + 'static,
    {
        let conn_arc = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn_arc.lock().expect("database mutex poisoned");
            f(&mut conn)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("task execution failed: {e}")))?
        .map_err(ApiError::from)
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.clone())
    }

    pub fn apps(&self) -> AppRepository {
        AppRepository::new(self.clone())
    }

    pub fn chats(&self) -> ChatRepository {
        ChatRepository::new(self.clone())
    }

    pub fn settings(&self) -> SettingsRepository {
        SettingsRepository::new(self.clone())
    }
}

pub(crate) fn now_unix() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

#[cfg(test)]
pub(crate) async fn test_db() -> Database {
    Database::connect(":memory:").await.expect("in-memory db")
}
