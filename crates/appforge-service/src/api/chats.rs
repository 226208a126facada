//! Chat and message CRUD. Ownership always flows through the workspace.

use crate::auth::AuthUser;
use crate::context::AppContext;
use crate::db::{Chat, Message, MessageRole};
use crate::error::ApiError;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::apps::SearchQuery;

#[derive(Debug, Deserialize)]
pub struct UpdateChatRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct AppendMessageRequest {
    #[serde(default = "default_role")]
    pub role: MessageRole,
    pub content: String,
}

fn default_role() -> MessageRole {
    MessageRole::User
}

async fn require_app(ctx: &AppContext, app_id: i64, user_id: i64) -> Result<(), ApiError> {
    ctx.db
        .apps()
        .get_owned(app_id, user_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| ApiError::NotFound("app not found".to_string()))
}

async fn require_chat(ctx: &AppContext, chat_id: i64, user_id: i64) -> Result<Chat, ApiError> {
    ctx.db
        .chats()
        .get_owned(chat_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("chat not found".to_string()))
}

pub async fn list_for_app(
    State(ctx): State<Arc<AppContext>>,
    user: AuthUser,
    Path(app_id): Path<i64>,
) -> Result<Json<Vec<Chat>>, ApiError> {
    require_app(&ctx, app_id, user.id).await?;
    Ok(Json(ctx.db.chats().list_for_app(app_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    pub title: Option<String>,
}

pub async fn create(
    State(ctx): State<Arc<AppContext>>,
    user: AuthUser,
    Path(app_id): Path<i64>,
    Json(req): Json<CreateChatRequest>,
) -> Result<Json<Chat>, ApiError> {
    require_app(&ctx, app_id, user.id).await?;
    Ok(Json(ctx.db.chats().create(app_id, req.title).await?))
}

pub async fn search(
    State(ctx): State<Arc<AppContext>>,
    user: AuthUser,
    Path(app_id): Path<i64>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Chat>>, ApiError> {
    require_app(&ctx, app_id, user.id).await?;
    Ok(Json(ctx.db.chats().search(app_id, &query.q).await?))
}

pub async fn get_one(
    State(ctx): State<Arc<AppContext>>,
    user: AuthUser,
    Path(chat_id): Path<i64>,
) -> Result<Json<Chat>, ApiError> {
    Ok(Json(require_chat(&ctx, chat_id, user.id).await?))
}

pub async fn update(
    State(ctx): State<Arc<AppContext>>,
    user: AuthUser,
    Path(chat_id): Path<i64>,
    Json(req): Json<UpdateChatRequest>,
) -> Result<Json<Chat>, ApiError> {
    ctx.db
        .chats()
        .rename(chat_id, user.id, req.title)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("chat not found".to_string()))
}

pub async fn remove(
    State(ctx): State<Arc<AppContext>>,
    user: AuthUser,
    Path(chat_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    if !ctx.db.chats().delete(chat_id, user.id).await? {
        return Err(ApiError::NotFound("chat not found".to_string()));
    }
    Ok(Json(json!({ "success": true })))
}

pub async fn messages(
    State(ctx): State<Arc<AppContext>>,
    user: AuthUser,
    Path(chat_id): Path<i64>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let chat = require_chat(&ctx, chat_id, user.id).await?;
    Ok(Json(ctx.db.chats().list_messages(chat.id).await?))
}

pub async fn append_message(
    State(ctx): State<Arc<AppContext>>,
    user: AuthUser,
    Path(chat_id): Path<i64>,
    Json(req): Json<AppendMessageRequest>,
) -> Result<Json<Message>, ApiError> {
    if req.content.trim().is_empty() {
        return Err(ApiError::Validation("content is required".to_string()));
    }
    let chat = require_chat(&ctx, chat_id, user.id).await?;
    let message = ctx
        .db
        .chats()
        .append_message(chat.id, req.role, &req.content, None)
        .await?;
    Ok(Json(message))
}
