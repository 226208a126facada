//! Registration, login, and identity.

use crate::auth::{hash_password, issue_token, verify_password, AuthUser};
use crate::context::AppContext;
use crate::error::ApiError;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn register(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<Value>, ApiError> {
    if !req.email.contains('@') {
        return Err(ApiError::Validation("invalid email address".to_string()));
    }
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("name is required".to_string()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::Validation(
            "password must be at least 8 characters".to_string(),
        ));
    }

    let hash = hash_password(&req.password)?;
    let user = ctx
        .db
        .users()
        .create(req.email.trim(), req.name.trim(), &hash)
        .await?;
    let token = issue_token(&user, &ctx.config.jwt_secret)?;

    tracing::info!(user_id = user.id, "registered user");
    Ok(Json(json!({ "user": user, "token": token })))
}

pub async fn login(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let invalid = || ApiError::Auth("invalid email or password".to_string());

    let (user, hash) = ctx
        .db
        .users()
        .find_by_email(req.email.trim())
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(&req.password, &hash) {
        return Err(invalid());
    }

    let token = issue_token(&user, &ctx.config.jwt_secret)?;
    Ok(Json(json!({ "user": user, "token": token })))
}

pub async fn me(user: AuthUser) -> Json<AuthUser> {
    Json(user)
}
