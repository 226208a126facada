//! App workspaces.

use crate::db::chats::Chat;
use crate::db::{now_unix, Database};
use crate::error::ApiError;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub prompt: Option<String>,
    pub template: Option<String>,
    pub favorite: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

fn app_from_row(row: &Row<'_>) -> Result<App, rusqlite::Error> {
    Ok(App {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        prompt: row.get(3)?,
        template: row.get(4)?,
        favorite: row.get::<_, i64>(5)? != 0,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

const APP_COLUMNS: &str = "id, user_id, name, prompt, template, favorite, created_at, updated_at";

#[derive(Clone)]
pub struct AppRepository {
    db: Database,
}

impl AppRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a workspace and its initial chat in one transaction.
    pub async fn create_with_chat(
        &self,
        user_id: i64,
        name: &str,
        prompt: Option<String>,
        template: Option<String>,
    ) -> Result<(App, Chat), ApiError> {
        let name = name.to_string();
        self.db
            .run_blocking(move |conn| {
                let tx = conn.transaction()?;
                let now = now_unix();

                tx.execute(
                    "INSERT INTO apps (user_id, name, prompt, template, created_at, updated_at)
                     VALUES (?, ?, ?, ?, ?, ?)",
                    params![user_id, name, prompt, template, now, now],
                )?;
                let app_id = tx.last_insert_rowid();

                tx.execute(
                    "INSERT INTO chats (app_id, title, created_at) VALUES (?, ?, ?)",
                    params![app_id, format!("{name} chat"), now],
                )?;
                let chat_id = tx.last_insert_rowid();

                tx.commit()?;
                Ok((
                    App {
                        id: app_id,
                        user_id,
                        name: name.clone(),
                        prompt,
                        template,
                        favorite: false,
                        created_at: now,
                        updated_at: now,
                    },
                    Chat {
                        id: chat_id,
                        app_id,
                        title: Some(format!("{name} chat")),
                        created_at: now,
                    },
                ))
            })
            .await
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<App>, ApiError> {
        self.db
            .run_blocking(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {APP_COLUMNS} FROM apps WHERE user_id = ? ORDER BY updated_at DESC"
                ))?;
                let apps = stmt.query_map(params![user_id], app_from_row)?;
                apps.collect()
            })
            .await
    }

    /// Fetch an app only when `user_id` owns it. Missing and not-owned are
    /// indistinguishable to the caller.
    pub async fn get_owned(&self, app_id: i64, user_id: i64) -> Result<Option<App>, ApiError> {
        self.db
            .run_blocking(move |conn| get_owned_sync(conn, app_id, user_id))
            .await
    }

    pub async fn update(
        &self,
        app_id: i64,
        user_id: i64,
        name: Option<String>,
        prompt: Option<String>,
    ) -> Result<Option<App>, ApiError> {
        self.db
            .run_blocking(move |conn| {
                let Some(current) = get_owned_sync(conn, app_id, user_id)? else {
                    return Ok(None);
                };
                conn.execute(
                    "UPDATE apps SET name = ?, prompt = ?, updated_at = ? WHERE id = ?",
                    params![
                        name.clone().unwrap_or(current.name),
                        prompt.clone().or(current.prompt),
                        now_unix(),
                        app_id
                    ],
                )?;
                get_owned_sync(conn, app_id, user_id)
            })
            .await
    }

    /// Delete an owned app; returns whether a row was removed.
    pub async fn delete(&self, app_id: i64, user_id: i64) -> Result<bool, ApiError> {
        self.db
            .run_blocking(move |conn| {
                let affected = conn.execute(
                    "DELETE FROM apps WHERE id = ? AND user_id = ?",
                    params![app_id, user_id],
                )?;
                Ok(affected > 0)
            })
            .await
    }

    /// Flip the favorite flag; returns the new value when the app is owned.
    pub async fn toggle_favorite(
        &self,
        app_id: i64,
        user_id: i64,
    ) -> Result<Option<bool>, ApiError> {
        self.db
            .run_blocking(move |conn| {
                let affected = conn.execute(
                    "UPDATE apps SET favorite = 1 - favorite, updated_at = ? WHERE id = ? AND user_id = ?",
                    params![now_unix(), app_id, user_id],
                )?;
                if affected == 0 {
                    return Ok(None);
                }
                conn.query_row(
                    "SELECT favorite FROM apps WHERE id = ?",
                    params![app_id],
                    |row| Ok(Some(row.get::<_, i64>(0)? != 0)),
                )
            })
            .await
    }

    pub async fn search(&self, user_id: i64, query: &str) -> Result<Vec<App>, ApiError> {
        let pattern = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));
        self.db
            .run_blocking(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {APP_COLUMNS} FROM apps
                     WHERE user_id = ? AND name LIKE ? ESCAPE '\\'
                     ORDER BY updated_at DESC"
                ))?;
                let apps = stmt.query_map(params![user_id, pattern], app_from_row)?;
                apps.collect()
            })
            .await
    }
}

fn get_owned_sync(
    conn: &Connection,
    app_id: i64,
    user_id: i64,
) -> Result<Option<App>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {APP_COLUMNS} FROM apps WHERE id = ? AND user_id = ?"),
        params![app_id, user_id],
        app_from_row,
    )
    .optional()
}

#[cfg(test)]
mod tests {
    use crate::db::test_db;
    use crate::db::Database;

    async fn user(db: &Database) -> i64 {
        db.users()
            .create("owner@example.com", "Owner", "hash")
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn create_returns_app_and_initial_chat() {
        let db = test_db().await;
        let uid = user(&db).await;

        let (app, chat) = db
            .apps()
            .create_with_chat(uid, "counter", Some("make a counter".into()), None)
            .await
            .unwrap();
        assert_eq!(chat.app_id, app.id);
        assert!(!app.favorite);

        let listed = db.apps().list_for_user(uid).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn ownership_gates_get_update_delete() {
        let db = test_db().await;
        let uid = user(&db).await;
        let other = db
            .users()
            .create("other@example.com", "Other", "hash")
            .await
            .unwrap()
            .id;

        let (app, _) = db
            .apps()
            .create_with_chat(uid, "mine", None, None)
            .await
            .unwrap();

        assert!(db.apps().get_owned(app.id, other).await.unwrap().is_none());
        assert!(db
            .apps()
            .update(app.id, other, Some("stolen".into()), None)
            .await
            .unwrap()
            .is_none());
        assert!(!db.apps().delete(app.id, other).await.unwrap());
        assert!(db.apps().get_owned(app.id, uid).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn favorite_toggles_back_and_forth() {
        let db = test_db().await;
        let uid = user(&db).await;
        let (app, _) = db
            .apps()
            .create_with_chat(uid, "fav", None, None)
            .await
            .unwrap();

        assert_eq!(db.apps().toggle_favorite(app.id, uid).await.unwrap(), Some(true));
        assert_eq!(db.apps().toggle_favorite(app.id, uid).await.unwrap(), Some(false));
    }

    #[tokio::test]
    async fn search_matches_by_name_substring() {
        let db = test_db().await;
        let uid = user(&db).await;
        db.apps()
            .create_with_chat(uid, "todo list", None, None)
            .await
            .unwrap();
        db.apps()
            .create_with_chat(uid, "weather", None, None)
            .await
            .unwrap();

        let hits = db.apps().search(uid, "todo").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "todo list");
    }

    #[tokio::test]
    async fn deleting_user_cascades_to_apps() {
        let db = test_db().await;
        let uid = user(&db).await;
        db.apps()
            .create_with_chat(uid, "doomed", None, None)
            .await
            .unwrap();

        db.run_blocking(move |conn| {
            conn.execute("DELETE FROM users WHERE id = ?", rusqlite::params![uid])
        })
        .await
        .unwrap();

        assert!(db.apps().list_for_user(uid).await.unwrap().is_empty());
    }
}
