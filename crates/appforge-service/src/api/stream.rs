//! Generation stream endpoints: the SSE edge over the pipeline, plus
//! cancellation.

use crate::auth::AuthUser;
use crate::context::AppContext;
use crate::error::ApiError;
use crate::pipeline::{self, GenerationRequest};
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// `POST /stream/{chatId}` - run a generation, emitting frames as SSE.
pub async fn start_stream(
    State(ctx): State<Arc<AppContext>>,
    user: AuthUser,
    Path(chat_id): Path<i64>,
    Json(request): Json<GenerationRequest>,
) -> Result<Response, ApiError> {
    if request.prompt.trim().is_empty() && !request.redo {
        return Err(ApiError::Validation("prompt is required".to_string()));
    }

    let chat = ctx
        .db
        .chats()
        .get_owned(chat_id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("chat not found".to_string()))?;

    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(pipeline::run_generation(ctx.clone(), user, chat, request, tx));

    let frames = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|frame| (frame, rx))
    })
    .filter_map(|frame| async move {
        serde_json::to_string(&frame)
            .ok()
            .map(|data| Ok::<_, Infallible>(Event::default().data(data)))
    });

    Ok(Sse::new(frames)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(15))
                .text("keep-alive"),
        )
        .into_response())
}

/// `POST /stream/cancel/{streamId}`. Unknown ids (including races with
/// completion) are a 404.
pub async fn cancel_stream(
    State(ctx): State<Arc<AppContext>>,
    user: AuthUser,
    Path(stream_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let owned = ctx
        .sessions
        .get(&stream_id)
        .map(|session| session.user_id == user.id)
        .unwrap_or(false);
    if !owned || !ctx.sessions.cancel(&stream_id) {
        return Err(ApiError::NotFound("stream not found".to_string()));
    }
    Ok(Json(json!({ "success": true })))
}
