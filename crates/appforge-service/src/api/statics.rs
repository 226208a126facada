//! SPA fallback. API paths 404 as JSON; everything else is served from the
//! configured frontend bundle, falling back to its `index.html`.

use crate::context::AppContext;
use crate::error::ApiError;
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};

const API_PREFIXES: &[&str] = &[
    "/auth", "/apps", "/chats", "/stream", "/files", "/process", "/settings", "/preview", "/ws",
];

fn is_api_path(path: &str) -> bool {
    API_PREFIXES.iter().any(|prefix| {
        path == *prefix || path.starts_with(&format!("{prefix}/"))
    })
}

pub async fn fallback(
    State(ctx): State<Arc<AppContext>>,
    req: Request<Body>,
) -> Response {
    let path = req.uri().path().to_string();
    if is_api_path(&path) {
        return ApiError::NotFound("route not found".to_string()).into_response();
    }

    let Some(dir) = ctx.config.static_dir.clone() else {
        return ApiError::NotFound("route not found".to_string()).into_response();
    };

    let serve = ServeDir::new(&dir).fallback(ServeFile::new(dir.join("index.html")));
    match serve.oneshot(req).await {
        Ok(response) => response.into_response(),
        Err(_) => ApiError::NotFound("route not found".to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_prefixes_are_recognized() {
        assert!(is_api_path("/apps"));
        assert!(is_api_path("/apps/3/favorite"));
        assert!(is_api_path("/stream/7"));
        assert!(is_api_path("/ws"));
        assert!(!is_api_path("/"));
        assert!(!is_api_path("/assets/index.js"));
        assert!(!is_api_path("/appsmith"));
    }
}
