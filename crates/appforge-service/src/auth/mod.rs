//! Authentication: password hashing, token issue/verify, and the request
//! extractor that turns a bearer header into an [`AuthUser`].

pub mod password;
pub mod token;

pub use password::{hash_password, verify_password};
pub use token::{issue_token, verify_token, AuthUser};

use crate::context::AppContext;
use crate::error::ApiError;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::sync::Arc;

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| ApiError::Auth("missing authorization header".to_string()))?;
    let value = header
        .to_str()
        .map_err(|_| ApiError::Auth("invalid authorization header".to_string()))?;
    value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Auth("expected bearer token".to_string()))
}

#[async_trait]
impl FromRequestParts<Arc<AppContext>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &Arc<AppContext>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        verify_token(token, &ctx.config.jwt_secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_header(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/apps");
        if let Some(v) = value {
            builder = builder.header(axum::http::header::AUTHORIZATION, v);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[test]
    fn bearer_token_extracts_the_token() {
        let parts = parts_with_header(Some("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&parts).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn missing_header_is_auth_error() {
        let parts = parts_with_header(None);
        assert!(matches!(bearer_token(&parts), Err(ApiError::Auth(_))));
    }

    #[test]
    fn non_bearer_scheme_is_rejected() {
        let parts = parts_with_header(Some("Basic dXNlcjpwYXNz"));
        assert!(matches!(bearer_token(&parts), Err(ApiError::Auth(_))));
    }
}
