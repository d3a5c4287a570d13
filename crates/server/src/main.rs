use std::{sync::Arc, time::Duration};

use anyhow::Context;
use db::DBService;
use server::{AppState, file_logging, routes};
use services::services::{
    config::load_config_from_file,
    datasource::HttpFetcher,
};
use utils::assets::config_path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let _file_log_guard = file_logging::init_logging(&log_level);

    let config = load_config_from_file(&config_path()).await;
    config.validate().context("invalid configuration")?;

    let db = DBService::new().await.context("failed to open database")?;
    let fetcher = HttpFetcher::new(Duration::from_secs(config.datasource_timeout_secs))
        .context("failed to build HTTP client")?;
    let state = AppState::new(db.pool.clone(), config, Arc::new(fetcher));

    let app_router = routes::router(state);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.trim().parse::<u16>().ok())
        .unwrap_or_else(|| {
            tracing::info!("No PORT environment variable set, using 8000");
            8000
        });
    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
    let actual_port = listener.local_addr()?.port();

    tracing::info!("Server running on http://{host}:{actual_port}");

    axum::serve(listener, app_router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    perform_cleanup_actions(&db).await;
    Ok(())
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let terminate = async {
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
            } else {
                tracing::error!("Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}

/// Flush the WAL into the main database file and close the pool.
pub async fn perform_cleanup_actions(db: &DBService) {
    tracing::info!("Running final WAL checkpoint...");
    match sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
        .execute(&db.pool)
        .await
    {
        Ok(_) => tracing::info!("Final WAL checkpoint completed"),
        Err(e) => tracing::warn!("Final WAL checkpoint failed: {}", e),
    }

    db.pool.close().await;
    tracing::info!("Database connection pool closed");
}
