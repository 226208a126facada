//! User accounts.

use crate::db::{now_unix, Database};
use crate::error::ApiError;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
}

#[derive(Clone)]
pub struct UserRepository {
    db: Database,
}

impl UserRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new account. Fails with a conflict when the email is taken.
    pub async fn create(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
    ) -> Result<User, ApiError> {
        let email = email.to_string();
        let name = name.to_string();
        let password_hash = password_hash.to_string();
        self.db
            .run_blocking(move |conn| {
                conn.execute(
                    "INSERT INTO users (email, name, password_hash, created_at) VALUES (?, ?, ?, ?)",
                    params![email, name, password_hash, now_unix()],
                )?;
                Ok(User {
                    id: conn.last_insert_rowid(),
                    email,
                    name,
                })
            })
            .await
            .map_err(|e| match e {
                ApiError::Conflict(_) => ApiError::Conflict("email already registered".to_string()),
                other => other,
            })
    }

    /// Look up an account with its password hash for credential checks.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<(User, String)>, ApiError> {
        let email = email.to_string();
        self.db
            .run_blocking(move |conn| {
                conn.query_row(
                    "SELECT id, email, name, password_hash FROM users WHERE email = ?",
                    params![email],
                    |row| {
                        Ok((
                            User {
                                id: row.get(0)?,
                                email: row.get(1)?,
                                name: row.get(2)?,
                            },
                            row.get::<_, String>(3)?,
                        ))
                    },
                )
                .optional()
            })
            .await
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, ApiError> {
        self.db
            .run_blocking(move |conn| {
                conn.query_row(
                    "SELECT id, email, name FROM users WHERE id = ?",
                    params![id],
                    |row| {
                        Ok(User {
                            id: row.get(0)?,
                            email: row.get(1)?,
                            name: row.get(2)?,
                        })
                    },
                )
                .optional()
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_db;

    #[tokio::test]
    async fn create_and_find_round_trip() {
        let db = test_db().await;
        let users = db.users();

        let created = users.create("a@example.com", "Ada", "hash").await.unwrap();
        assert_eq!(created.email, "a@example.com");

        let (found, hash) = users
            .find_by_email("a@example.com")
            .await
            .unwrap()
            .expect("present");
        assert_eq!(found.id, created.id);
        assert_eq!(hash, "hash");

        let by_id = users.find_by_id(created.id).await.unwrap().expect("present");
        assert_eq!(by_id.name, "Ada");
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let db = test_db().await;
        let users = db.users();

        users.create("a@example.com", "Ada", "h1").await.unwrap();
        let err = users.create("a@example.com", "Bob", "h2").await.unwrap_err();
        assert!(matches!(err, crate::error::ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn unknown_email_is_none() {
        let db = test_db().await;
        assert!(db.users().find_by_email("x@y.z").await.unwrap().is_none());
    }
}
