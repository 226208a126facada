//! Bearer token issue and verification (HS256).

use crate::db::User;
use crate::error::ApiError;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

const TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Identity carried on a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: i64,
    email: String,
    name: String,
    iat: i64,
    exp: i64,
}

pub fn issue_token(user: &User, secret: &str) -> Result<String, ApiError> {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
        iat: now,
        exp: now + TOKEN_TTL_SECS,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))
}

pub fn verify_token(token: &str, secret: &str) -> Result<AuthUser, ApiError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| ApiError::Auth(format!("invalid token: {e}")))?;

    Ok(AuthUser {
        id: data.claims.sub,
        email: data.claims.email,
        name: data.claims.name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 7,
            email: "a@example.com".into(),
            name: "Ada".into(),
        }
    }

    #[test]
    fn token_round_trip_preserves_identity() {
        let token = issue_token(&user(), "secret").unwrap();
        let verified = verify_token(&token, "secret").unwrap();
        assert_eq!(verified.id, 7);
        assert_eq!(verified.email, "a@example.com");
        assert_eq!(verified.name, "Ada");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token(&user(), "secret").unwrap();
        let err = verify_token(&token, "other").unwrap_err();
        assert!(matches!(err, ApiError::Auth(_)));
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(matches!(
            verify_token("not.a.token", "secret"),
            Err(ApiError::Auth(_))
        ));
    }
}
