//! AppForge service - multi-tenant backend for AI-assisted app workspaces.

use anyhow::Result;
use appforge_service::api;
use appforge_service::config::Config;
use appforge_service::context::AppContext;
use appforge_service::db::Database;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("appforge_service=info,tower_http=info"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = Config::parse();
    info!(
        port = config.port,
        database = %config.database_url,
        storage = %config.storage_path.display(),
        "starting service"
    );

    tokio::fs::create_dir_all(&config.storage_path).await?;
    let db = Database::connect(&config.database_url).await?;
    let ctx = Arc::new(AppContext::new(config.clone(), db));

    let app = api::router(ctx.clone());
    let listener =
        tokio::net::TcpListener::bind((config.bind_addr.as_str(), config.port)).await?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down: cancelling streams and stopping dev servers");
    ctx.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
