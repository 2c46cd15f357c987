pub mod app_state;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod notify;
pub mod persistence;
pub mod routes;
pub mod services;
pub mod tasks;
pub mod telemetry;

pub type Result<T> = std::result::Result<T, anyhow::Error>;

use std::{future::Future, net::SocketAddr, sync::Arc};

use tokio::sync::watch;
use tracing::{error, info};

use crate::app_state::AppState;
use crate::notify::LogNotifier;

pub use crate::telemetry::init_tracing;

/// Boot the control-plane and serve until a shutdown signal arrives.
pub async fn run() -> Result<()> {
    run_with_shutdown(shutdown_signal()).await
}

pub async fn run_with_shutdown<S>(shutdown: S) -> Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let app_config = config::load()?;
    let metrics_handle = telemetry::init_metrics_recorder();

    let db_pool = persistence::migrations::init_pool(&app_config.database.url).await?;
    persistence::migrations::run_migrations(&db_pool).await?;
    info!(database = %app_config.database.url, "database ready");

    let state = AppState {
        db: db_pool,
        jwt_secret: app_config.auth.jwt_secret.clone(),
        notifier: Arc::new(LogNotifier),
        thresholds: app_config.notifications.clone(),
        watcher: app_config.watcher.clone(),
    };

    tokio::spawn(tasks::offline::offline_watcher_loop(state.clone()));

    let metrics_addr: SocketAddr =
        format!("{}:{}", app_config.metrics.host, app_config.metrics.port)
            .parse()
            .map_err(|err| anyhow::anyhow!("invalid metrics bind address: {}", err))?;
    tokio::spawn(async move {
        if let Err(err) = telemetry::serve_metrics(metrics_handle, metrics_addr).await {
            error!(?err, "metrics server exited with error");
        }
    });

    let api_addr: SocketAddr = format!("{}:{}", app_config.server.host, app_config.server.port)
        .parse()
        .map_err(|err| anyhow::anyhow!("invalid listen address: {}", err))?;

    let app = routes::build_router(state.clone()).with_state(state);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();

    let listener = tokio::net::TcpListener::bind(api_addr).await?;
    info!(%api_addr, "control-plane listening");

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown.await;
        let _ = shutdown_tx.send(true);
    });

    axum::serve(listener, make_service)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => stream.recv().await,
            Err(err) => {
                error!(%err, "failed to install SIGTERM handler");
                None
            }
        };
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("received SIGTERM, shutting down");
        },
    }
}
