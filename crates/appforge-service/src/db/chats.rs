//! Chats and their append-only messages.

use crate::db::{now_unix, Database};
use crate::error::ApiError;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: i64,
    pub app_id: i64,
    pub title: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "assistant" => MessageRole::Assistant,
            _ => MessageRole::User,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub chat_id: i64,
    pub role: MessageRole,
    pub content: String,
    pub request_id: Option<String>,
    pub created_at: i64,
}

fn chat_from_row(row: &Row<'_>) -> Result<Chat, rusqlite::Error> {
    Ok(Chat {
        id: row.get(0)?,
        app_id: row.get(1)?,
        title: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn message_from_row(row: &Row<'_>) -> Result<Message, rusqlite::Error> {
    Ok(Message {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        role: MessageRole::from_str(&row.get::<_, String>(2)?),
        content: row.get(3)?,
        request_id: row.get(4)?,
        created_at: row.get(5)?,
    })
}

#[derive(Clone)]
pub struct ChatRepository {
    db: Database,
}

impl ChatRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn create(&self, app_id: i64, title: Option<String>) -> Result<Chat, ApiError> {
        self.db
            .run_blocking(move |conn| {
                let now = now_unix();
                conn.execute(
                    "INSERT INTO chats (app_id, title, created_at) VALUES (?, ?, ?)",
                    params![app_id, title, now],
                )?;
                Ok(Chat {
                    id: conn.last_insert_rowid(),
                    app_id,
                    title,
                    created_at: now,
                })
            })
            .await
    }

    pub async fn list_for_app(&self, app_id: i64) -> Result<Vec<Chat>, ApiError> {
        self.db
            .run_blocking(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, app_id, title, created_at FROM chats
                     WHERE app_id = ? ORDER BY created_at DESC, id DESC",
                )?;
                let chats = stmt.query_map(params![app_id], chat_from_row)?;
                chats.collect()
            })
            .await
    }

    pub async fn search(&self, app_id: i64, query: &str) -> Result<Vec<Chat>, ApiError> {
        let pattern = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));
        self.db
            .run_blocking(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, app_id, title, created_at FROM chats
                     WHERE app_id = ? AND title LIKE ? ESCAPE '\\'
                     ORDER BY created_at DESC, id DESC",
                )?;
                let chats = stmt.query_map(params![app_id, pattern], chat_from_row)?;
                chats.collect()
            })
            .await
    }

    /// Fetch a chat only when the workspace it belongs to is owned by
    /// `user_id`. Returns the chat together with the owning app id.
    pub async fn get_owned(
        &self,
        chat_id: i64,
        user_id: i64,
    ) -> Result<Option<Chat>, ApiError> {
        self.db
            .run_blocking(move |conn| {
                conn.query_row(
                    "SELECT c.id, c.app_id, c.title, c.created_at
                     FROM chats c JOIN apps a ON a.id = c.app_id
                     WHERE c.id = ? AND a.user_id = ?",
                    params![chat_id, user_id],
                    chat_from_row,
                )
                .optional()
            })
            .await
    }

    pub async fn rename(
        &self,
        chat_id: i64,
        user_id: i64,
        title: String,
    ) -> Result<Option<Chat>, ApiError> {
        self.db
            .run_blocking(move |conn| {
                let affected = conn.execute(
                    "UPDATE chats SET title = ? WHERE id = ? AND app_id IN
                     (SELECT id FROM apps WHERE user_id = ?)",
                    params![title, chat_id, user_id],
                )?;
                if affected == 0 {
                    return Ok(None);
                }
                conn.query_row(
                    "SELECT id, app_id, title, created_at FROM chats WHERE id = ?",
                    params![chat_id],
                    chat_from_row,
                )
                .optional()
            })
            .await
    }

    pub async fn delete(&self, chat_id: i64, user_id: i64) -> Result<bool, ApiError> {
        self.db
            .run_blocking(move |conn| {
                let affected = conn.execute(
                    "DELETE FROM chats WHERE id = ? AND app_id IN
                     (SELECT id FROM apps WHERE user_id = ?)",
                    params![chat_id, user_id],
                )?;
                Ok(affected > 0)
            })
            .await
    }

    /// Append a message to a chat.
    pub async fn append_message(
        &self,
        chat_id: i64,
        role: MessageRole,
        content: &str,
        request_id: Option<String>,
    ) -> Result<Message, ApiError> {
        let content = content.to_string();
        self.db
            .run_blocking(move |conn| {
                let now = now_unix();
                conn.execute(
                    "INSERT INTO messages (chat_id, role, content, request_id, created_at)
                     VALUES (?, ?, ?, ?, ?)",
                    params![chat_id, role.as_str(), content, request_id, now],
                )?;
                Ok(Message {
                    id: conn.last_insert_rowid(),
                    chat_id,
                    role,
                    content,
                    request_id,
                    created_at: now,
                })
            })
            .await
    }

    pub async fn list_messages(&self, chat_id: i64) -> Result<Vec<Message>, ApiError> {
        self.db
            .run_blocking(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, chat_id, role, content, request_id, created_at
                     FROM messages WHERE chat_id = ? ORDER BY created_at ASC, id ASC",
                )?;
                let messages = stmt.query_map(params![chat_id], message_from_row)?;
                messages.collect()
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_db, Database};

    async fn fixture(db: &Database) -> (i64, Chat) {
        let uid = db
            .users()
            .create("owner@example.com", "Owner", "hash")
            .await
            .unwrap()
            .id;
        let (_, chat) = db
            .apps()
            .create_with_chat(uid, "app", None, None)
            .await
            .unwrap();
        (uid, chat)
    }

    #[tokio::test]
    async fn messages_keep_insertion_order() {
        let db = test_db().await;
        let (_, chat) = fixture(&db).await;
        let chats = db.chats();

        for i in 0..5 {
            chats
                .append_message(chat.id, MessageRole::User, &format!("m{i}"), None)
                .await
                .unwrap();
        }

        let messages = chats.list_messages(chat.id).await.unwrap();
        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["m0", "m1", "m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn deleting_chat_removes_only_its_messages() {
        let db = test_db().await;
        let (uid, chat) = fixture(&db).await;
        let chats = db.chats();

        let other = chats.create(chat.app_id, Some("second".into())).await.unwrap();
        chats
            .append_message(chat.id, MessageRole::User, "doomed", None)
            .await
            .unwrap();
        chats
            .append_message(other.id, MessageRole::User, "survivor", None)
            .await
            .unwrap();

        assert!(chats.delete(chat.id, uid).await.unwrap());

        assert!(chats.list_messages(chat.id).await.unwrap().is_empty());
        let kept = chats.list_messages(other.id).await.unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].content, "survivor");
    }

    #[tokio::test]
    async fn ownership_flows_through_the_workspace() {
        let db = test_db().await;
        let (_, chat) = fixture(&db).await;
        let stranger = db
            .users()
            .create("b@example.com", "B", "hash")
            .await
            .unwrap()
            .id;

        assert!(db.chats().get_owned(chat.id, stranger).await.unwrap().is_none());
        assert!(!db.chats().delete(chat.id, stranger).await.unwrap());
        assert!(db
            .chats()
            .rename(chat.id, stranger, "hijack".into())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn search_matches_titles() {
        let db = test_db().await;
        let (_, chat) = fixture(&db).await;
        db.chats()
            .create(chat.app_id, Some("styling pass".into()))
            .await
            .unwrap();

        let hits = db.chats().search(chat.app_id, "styling").await.unwrap();
        assert_eq!(hits.len(), 1);
    }
}
