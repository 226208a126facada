//! HTTP surface: route table and CORS wiring.

pub mod apps;
pub mod auth;
pub mod chats;
pub mod files;
pub mod process;
pub mod settings;
pub mod statics;
pub mod stream;

use crate::context::AppContext;
use crate::proxy;
use crate::sockets;
use axum::body::Body;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, Request};
use axum::response::Response;
use axum::routing::{any, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

pub fn router(ctx: Arc<AppContext>) -> Router {
    let cors = match &ctx.config.cors_origin {
        Some(origin) => {
            let origin = origin
                .parse::<HeaderValue>()
                .unwrap_or_else(|_| HeaderValue::from_static("*"));
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::permissive(),
    };

    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/apps", get(apps::list).post(apps::create))
        .route("/apps/search", get(apps::search))
        .route(
            "/apps/:id",
            get(apps::get_one).patch(apps::update).delete(apps::remove),
        )
        .route("/apps/:id/favorite", post(apps::favorite))
        .route(
            "/chats/app/:app_id",
            get(chats::list_for_app).post(chats::create),
        )
        .route("/chats/app/:app_id/search", get(chats::search))
        .route(
            "/chats/:id",
            get(chats::get_one).patch(chats::update).delete(chats::remove),
        )
        .route(
            "/chats/:id/messages",
            get(chats::messages).post(chats::append_message),
        )
        .route("/stream/:chat_id", post(stream::start_stream))
        .route("/stream/cancel/:stream_id", post(stream::cancel_stream))
        .route("/files/app/:app_id", get(files::listing))
        .route(
            "/files/app/:app_id/*path",
            get(files::read).put(files::write).delete(files::remove),
        )
        .route("/process/:app_id/start", post(process::start))
        .route("/process/:app_id/stop", post(process::stop))
        .route("/process/:app_id/status", get(process::status))
        .route("/settings", get(settings::get_settings).put(settings::put_settings))
        .route("/ws", get(sockets::ws_handler))
        .route("/preview/:app_id", any(preview_root))
        .route("/preview/:app_id/*path", any(preview_path))
        .fallback(statics::fallback)
        .layer(cors)
        .with_state(ctx)
}

async fn preview_root(
    State(ctx): State<Arc<AppContext>>,
    Path(app_id): Path<i64>,
    upgrade: Option<WebSocketUpgrade>,
    req: Request<Body>,
) -> Response {
    proxy::proxy_request(&ctx, app_id, String::new(), upgrade, req).await
}

async fn preview_path(
    State(ctx): State<Arc<AppContext>>,
    Path((app_id, path)): Path<(i64, String)>,
    upgrade: Option<WebSocketUpgrade>,
    req: Request<Body>,
) -> Response {
    proxy::proxy_request(&ctx, app_id, path, upgrade, req).await
}
