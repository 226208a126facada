//! Workspace CRUD.

use crate::auth::AuthUser;
use crate::context::AppContext;
use crate::db::App;
use crate::error::ApiError;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct CreateAppRequest {
    pub name: String,
    pub prompt: Option<String>,
    pub template: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAppRequest {
    pub name: Option<String>,
    pub prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

pub async fn list(
    State(ctx): State<Arc<AppContext>>,
    user: AuthUser,
) -> Result<Json<Vec<App>>, ApiError> {
    Ok(Json(ctx.db.apps().list_for_user(user.id).await?))
}

/// Create a workspace; the initial chat is created atomically with it.
pub async fn create(
    State(ctx): State<Arc<AppContext>>,
    user: AuthUser,
    Json(req): Json<CreateAppRequest>,
) -> Result<Json<Value>, ApiError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("name is required".to_string()));
    }

    let (app, chat) = ctx
        .db
        .apps()
        .create_with_chat(user.id, name, req.prompt, req.template)
        .await?;
    // Materialize the root directory up front so previews and file routes
    // have somewhere to land.
    ctx.store_for(user.id, app.id)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    tracing::info!(app_id = app.id, user_id = user.id, "created workspace");
    Ok(Json(json!({ "app": app, "chat": chat })))
}

pub async fn get_one(
    State(ctx): State<Arc<AppContext>>,
    user: AuthUser,
    Path(app_id): Path<i64>,
) -> Result<Json<App>, ApiError> {
    ctx.db
        .apps()
        .get_owned(app_id, user.id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("app not found".to_string()))
}

pub async fn update(
    State(ctx): State<Arc<AppContext>>,
    user: AuthUser,
    Path(app_id): Path<i64>,
    Json(req): Json<UpdateAppRequest>,
) -> Result<Json<App>, ApiError> {
    ctx.db
        .apps()
        .update(app_id, user.id, req.name, req.prompt)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("app not found".to_string()))
}

/// Delete a workspace: stop its dev server, drop the rows (cascading to
/// chats and messages), and remove the root directory.
pub async fn remove(
    State(ctx): State<Arc<AppContext>>,
    user: AuthUser,
    Path(app_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    if ctx.db.apps().get_owned(app_id, user.id).await?.is_none() {
        return Err(ApiError::NotFound("app not found".to_string()));
    }

    ctx.supervisor.stop(app_id).await?;
    ctx.db.apps().delete(app_id, user.id).await?;
    if let Ok(store) = ctx.store_for(user.id, app_id) {
        if let Err(e) = store.delete_root().await {
            tracing::warn!(app_id, error = %e, "failed to remove workspace root");
        }
    }

    Ok(Json(json!({ "success": true })))
}

pub async fn favorite(
    State(ctx): State<Arc<AppContext>>,
    user: AuthUser,
    Path(app_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let favorite = ctx
        .db
        .apps()
        .toggle_favorite(app_id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("app not found".to_string()))?;
    Ok(Json(json!({ "favorite": favorite })))
}

pub async fn search(
    State(ctx): State<Arc<AppContext>>,
    user: AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<App>>, ApiError> {
    Ok(Json(ctx.db.apps().search(user.id, &query.q).await?))
}
