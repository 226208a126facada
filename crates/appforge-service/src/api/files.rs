//! File routes over the workspace store.

use crate::auth::AuthUser;
use crate::context::AppContext;
use crate::error::ApiError;
use crate::workspace::WorkspaceStore;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ListingQuery {
    #[serde(default)]
    pub recursive: bool,
}

async fn require_store(
    ctx: &AppContext,
    app_id: i64,
    user_id: i64,
) -> Result<WorkspaceStore, ApiError> {
    if ctx.db.apps().get_owned(app_id, user_id).await?.is_none() {
        return Err(ApiError::NotFound("app not found".to_string()));
    }
    ctx.store_for(user_id, app_id).map_err(ApiError::from)
}

pub async fn listing(
    State(ctx): State<Arc<AppContext>>,
    user: AuthUser,
    Path(app_id): Path<i64>,
    Query(query): Query<ListingQuery>,
) -> Result<Json<Value>, ApiError> {
    let store = require_store(&ctx, app_id, user.id).await?;
    if query.recursive {
        let files = store.list_recursive("", None).await?;
        Ok(Json(json!({ "files": files })))
    } else {
        let files = store.list("").await?;
        Ok(Json(json!({ "files": files })))
    }
}

/// GET a file (`{content}`) or a directory (`{files}`).
pub async fn read(
    State(ctx): State<Arc<AppContext>>,
    user: AuthUser,
    Path((app_id, path)): Path<(i64, String)>,
) -> Result<Json<Value>, ApiError> {
    let store = require_store(&ctx, app_id, user.id).await?;
    let stat = store.stat(&path).await?;
    if stat.is_directory {
        let files = store.list(&path).await?;
        Ok(Json(json!({ "files": files })))
    } else {
        let content = store.read(&path).await?;
        Ok(Json(json!({ "content": content })))
    }
}

pub async fn write(
    State(ctx): State<Arc<AppContext>>,
    user: AuthUser,
    Path((app_id, path)): Path<(i64, String)>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let store = require_store(&ctx, app_id, user.id).await?;
    store.write(&path, &body).await?;
    Ok(Json(json!({ "success": true, "path": path })))
}

pub async fn remove(
    State(ctx): State<Arc<AppContext>>,
    user: AuthUser,
    Path((app_id, path)): Path<(i64, String)>,
) -> Result<Json<Value>, ApiError> {
    let store = require_store(&ctx, app_id, user.id).await?;
    store.delete(&path).await?;
    Ok(Json(json!({ "success": true, "path": path })))
}
