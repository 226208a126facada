//! Preview reverse proxy.
//!
//! Forwards `/preview/{appId}/*` to the workspace's dev server on its leased
//! local port, for both plain HTTP and WebSocket upgrades (the dev server's
//! live-reload channel). Fail-closed: without a lease no loopback connection
//! is ever attempted and the client gets a self-refreshing 503 page.

use crate::context::AppContext;
use axum::body::Body;
use axum::extract::ws::{Message as ClientMessage, WebSocket, WebSocketUpgrade};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;

const MAX_PROXY_BODY: usize = 32 * 1024 * 1024;

/// Entry point for one preview request. `path` is already stripped of the
/// `/preview/{appId}` prefix.
pub async fn proxy_request(
    ctx: &Arc<AppContext>,
    app_id: i64,
    path: String,
    upgrade: Option<WebSocketUpgrade>,
    req: Request<Body>,
) -> Response {
    let Some(lease) = ctx.supervisor.status(app_id) else {
        return waiting_page(app_id);
    };

    match upgrade {
        Some(ws) => proxy_websocket(ws, lease.port, path, req.uri().query().map(str::to_string)),
        None => proxy_http(ctx, lease.port, &path, req).await,
    }
}

async fn proxy_http(
    ctx: &Arc<AppContext>,
    port: u16,
    path: &str,
    req: Request<Body>,
) -> Response {
    let query = req
        .uri()
        .query()
        .map(|q| format!("?{q}"))
        .unwrap_or_default();
    let target = format!("http://127.0.0.1:{port}/{path}{query}");

    let (parts, body) = req.into_parts();
    let body = match axum::body::to_bytes(body, MAX_PROXY_BODY).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return (StatusCode::PAYLOAD_TOO_LARGE, "request body too large").into_response();
        }
    };

    let mut headers = parts.headers.clone();
    // reqwest derives Host from the target origin.
    headers.remove(header::HOST);

    let upstream = ctx
        .http
        .request(parts.method, &target)
        .headers(headers)
        .body(body)
        .send()
        .await;

    match upstream {
        Ok(upstream) => {
            let status = upstream.status();
            let headers = response_headers(upstream.headers());
            let mut response = Response::builder().status(status);
            if let Some(response_headers) = response.headers_mut() {
                *response_headers = headers;
            }
            response
                .body(Body::from_stream(upstream.bytes_stream()))
                .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
        }
        Err(e) => {
            tracing::debug!(target, error = %e, "preview upstream unreachable");
            (
                StatusCode::BAD_GATEWAY,
                Html("<h1>502</h1><p>The dev server did not respond.</p>".to_string()),
            )
                .into_response()
        }
    }
}

fn response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in upstream {
        if name == header::TRANSFER_ENCODING || name == header::CONNECTION {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

fn proxy_websocket(
    ws: WebSocketUpgrade,
    port: u16,
    path: String,
    query: Option<String>,
) -> Response {
    ws.on_upgrade(move |client| async move {
        let query = query.map(|q| format!("?{q}")).unwrap_or_default();
        let target = format!("ws://127.0.0.1:{port}/{path}{query}");
        match tokio_tungstenite::connect_async(&target).await {
            Ok((upstream, _)) => bridge(client, upstream).await,
            Err(e) => {
                tracing::debug!(target, error = %e, "preview websocket upstream unreachable");
            }
        }
    })
}

async fn bridge<S>(client: WebSocket, upstream: tokio_tungstenite::WebSocketStream<S>)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut client_tx, mut client_rx) = client.split();
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    let client_to_upstream = async {
        while let Some(Ok(message)) = client_rx.next().await {
            let Some(message) = to_upstream(message) else {
                continue;
            };
            let closing = matches!(message, UpstreamMessage::Close(_));
            if upstream_tx.send(message).await.is_err() || closing {
                break;
            }
        }
    };

    let upstream_to_client = async {
        while let Some(Ok(message)) = upstream_rx.next().await {
            let Some(message) = to_client(message) else {
                continue;
            };
            let closing = matches!(message, ClientMessage::Close(_));
            if client_tx.send(message).await.is_err() || closing {
                break;
            }
        }
    };

    tokio::select! {
        _ = client_to_upstream => {}
        _ = upstream_to_client => {}
    }
}

fn to_upstream(message: ClientMessage) -> Option<UpstreamMessage> {
    match message {
        ClientMessage::Text(text) => Some(UpstreamMessage::Text(text)),
        ClientMessage::Binary(data) => Some(UpstreamMessage::Binary(data)),
        ClientMessage::Ping(data) => Some(UpstreamMessage::Ping(data)),
        ClientMessage::Pong(data) => Some(UpstreamMessage::Pong(data)),
        ClientMessage::Close(_) => Some(UpstreamMessage::Close(None)),
    }
}

fn to_client(message: UpstreamMessage) -> Option<ClientMessage> {
    match message {
        UpstreamMessage::Text(text) => Some(ClientMessage::Text(text)),
        UpstreamMessage::Binary(data) => Some(ClientMessage::Binary(data)),
        UpstreamMessage::Ping(data) => Some(ClientMessage::Ping(data)),
        UpstreamMessage::Pong(data) => Some(ClientMessage::Pong(data)),
        UpstreamMessage::Close(_) => Some(ClientMessage::Close(None)),
        UpstreamMessage::Frame(_) => None,
    }
}

fn waiting_page(app_id: i64) -> Response {
    let body = format!(
        r#"<!doctype html>
<html>
  <head>
    <meta http-equiv="refresh" content="3">
    <title>Preview not running</title>
  </head>
  <body style="font-family: system-ui, sans-serif; text-align: center; margin-top: 4rem;">
    <h1>Dev server is not running</h1>
    <p>Start workspace {app_id} to see its preview. This page refreshes automatically.</p>
  </body>
</html>
"#
    );
    (StatusCode::SERVICE_UNAVAILABLE, Html(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::Database;
    use tempfile::TempDir;

    async fn context(tmp: &TempDir) -> Arc<AppContext> {
        let db = Database::connect(":memory:").await.unwrap();
        Arc::new(AppContext::new(
            Config::for_tests(tmp.path().to_path_buf()),
            db,
        ))
    }

    fn get(path: &str) -> Request<Body> {
        Request::builder()
            .uri(format!("/{path}"))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn missing_lease_yields_self_refreshing_503() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp).await;

        let response = proxy_request(&ctx, 3, "index.html".into(), None, get("index.html")).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("http-equiv=\"refresh\""));
        assert!(body.contains("workspace 3"));
    }

    #[tokio::test]
    async fn dead_upstream_yields_502() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp).await;

        // A real lease whose process does not listen on its port.
        let store = ctx.store_for(1, 3).unwrap();
        store.write("package.json", "{}").await.unwrap();
        store.ensure_dir("node_modules").await.unwrap();
        store.write("dev.sh", "sleep 30\n").await.unwrap();
        ctx.supervisor.start(3, store.root()).await.unwrap();

        let response = proxy_request(&ctx, 3, "".into(), None, get("")).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        ctx.supervisor.stop(3).await.unwrap();
    }

    #[test]
    fn close_frames_translate_in_both_directions() {
        assert!(matches!(
            to_upstream(ClientMessage::Close(None)),
            Some(UpstreamMessage::Close(None))
        ));
        assert!(matches!(
            to_client(UpstreamMessage::Close(None)),
            Some(ClientMessage::Close(None))
        ));
    }
}
