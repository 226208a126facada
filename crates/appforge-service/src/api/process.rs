//! Dev-server lifecycle routes.

use crate::auth::AuthUser;
use crate::context::AppContext;
use crate::error::ApiError;
use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

async fn require_app(ctx: &AppContext, app_id: i64, user_id: i64) -> Result<(), ApiError> {
    ctx.db
        .apps()
        .get_owned(app_id, user_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| ApiError::NotFound("app not found".to_string()))
}

pub async fn start(
    State(ctx): State<Arc<AppContext>>,
    user: AuthUser,
    Path(app_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    require_app(&ctx, app_id, user.id).await?;
    let store = ctx.store_for(user.id, app_id)?;
    let port = ctx.supervisor.start(app_id, store.root()).await?;
    Ok(Json(json!({
        "success": true,
        "port": port,
        "previewUrl": ctx.config.preview_url(app_id),
    })))
}

pub async fn stop(
    State(ctx): State<Arc<AppContext>>,
    user: AuthUser,
    Path(app_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    require_app(&ctx, app_id, user.id).await?;
    let stopped = ctx.supervisor.stop(app_id).await?;
    Ok(Json(json!({ "success": true, "stopped": stopped })))
}

pub async fn status(
    State(ctx): State<Arc<AppContext>>,
    user: AuthUser,
    Path(app_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    require_app(&ctx, app_id, user.id).await?;
    Ok(Json(match ctx.supervisor.status(app_id) {
        Some(lease) => json!({
            "running": true,
            "port": lease.port,
            "previewUrl": ctx.config.preview_url(app_id),
        }),
        None => json!({ "running": false }),
    }))
}
