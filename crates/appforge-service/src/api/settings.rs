//! Per-user provider/model selection consumed by the pipeline.

use crate::auth::AuthUser;
use crate::context::AppContext;
use crate::db::Settings;
use crate::error::ApiError;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;

const KNOWN_PROVIDERS: &[&str] = &["openai", "anthropic", "google"];

pub async fn get_settings(
    State(ctx): State<Arc<AppContext>>,
    user: AuthUser,
) -> Result<Json<Settings>, ApiError> {
    Ok(Json(ctx.db.settings().get(user.id).await?))
}

pub async fn put_settings(
    State(ctx): State<Arc<AppContext>>,
    user: AuthUser,
    Json(settings): Json<Settings>,
) -> Result<Json<Settings>, ApiError> {
    if !KNOWN_PROVIDERS.contains(&settings.provider.as_str()) {
        return Err(ApiError::Validation(format!(
            "unknown provider: {}",
            settings.provider
        )));
    }
    if settings.model.trim().is_empty() {
        return Err(ApiError::Validation("model is required".to_string()));
    }
    Ok(Json(ctx.db.settings().upsert(user.id, settings).await?))
}
