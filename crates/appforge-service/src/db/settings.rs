//! Per-user provider and model selection.

use crate::db::{now_unix, Database};
use crate::error::ApiError;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PROVIDER: &str = "openai";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub provider: String,
    pub model: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct SettingsRepository {
    db: Database,
}

impl SettingsRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// The user's selection, falling back to the baseline.
    pub async fn get(&self, user_id: i64) -> Result<Settings, ApiError> {
        let row = self
            .db
            .run_blocking(move |conn| {
                conn.query_row(
                    "SELECT provider, model FROM settings WHERE user_id = ?",
                    params![user_id],
                    |row| {
                        Ok(Settings {
                            provider: row.get(0)?,
                            model: row.get(1)?,
                        })
                    },
                )
                .optional()
            })
            .await?;
        Ok(row.unwrap_or_default())
    }

    pub async fn upsert(&self, user_id: i64, settings: Settings) -> Result<Settings, ApiError> {
        let stored = settings.clone();
        self.db
            .run_blocking(move |conn| {
                conn.execute(
                    "INSERT INTO settings (user_id, provider, model, updated_at)
                     VALUES (?, ?, ?, ?)
                     ON CONFLICT(user_id) DO UPDATE SET
                       provider = excluded.provider,
                       model = excluded.model,
                       updated_at = excluded.updated_at",
                    params![user_id, stored.provider, stored.model, now_unix()],
                )?;
                Ok(())
            })
            .await?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    #[tokio::test]
    async fn missing_row_falls_back_to_defaults() {
        let db = test_db().await;
        let uid = db
            .users()
            .create("a@example.com", "A", "hash")
            .await
            .unwrap()
            .id;

        let settings = db.settings().get(uid).await.unwrap();
        assert_eq!(settings.provider, DEFAULT_PROVIDER);
        assert_eq!(settings.model, DEFAULT_MODEL);
    }

    #[tokio::test]
    async fn upsert_overwrites_previous_selection() {
        let db = test_db().await;
        let uid = db
            .users()
            .create("a@example.com", "A", "hash")
            .await
            .unwrap()
            .id;
        let repo = db.settings();

        repo.upsert(
            uid,
            Settings {
                provider: "anthropic".into(),
                model: "claude-sonnet".into(),
            },
        )
        .await
        .unwrap();
        repo.upsert(
            uid,
            Settings {
                provider: "google".into(),
                model: "gemini-pro".into(),
            },
        )
        .await
        .unwrap();

        let settings = repo.get(uid).await.unwrap();
        assert_eq!(settings.provider, "google");
        assert_eq!(settings.model, "gemini-pro");
    }
}
