pub mod config;
pub mod proxy;
pub mod sync;
pub mod table;

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{proxy::ProxyState, table::RouteTable};

/// Hard cap on how long in-flight requests get to drain after a shutdown
/// signal.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(30);

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json())
        .init();
}

/// Boot the proxy: route table, sync loop, HTTP server, graceful shutdown.
pub async fn run() -> anyhow::Result<()> {
    let cfg = config::load()?;
    run_with_shutdown(cfg, shutdown_signal()).await
}

pub async fn run_with_shutdown<S>(cfg: config::AppConfig, shutdown: S) -> anyhow::Result<()>
where
    S: std::future::Future<Output = ()> + Send + 'static,
{
    let table = RouteTable::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        shutdown.await;
        let _ = shutdown_tx.send(true);
    });

    let sync_handle = tokio::spawn(sync::sync_loop(
        cfg.server_url.clone(),
        table.clone(),
        cfg.sync_interval_secs,
        shutdown_rx.clone(),
    ));

    let listen_addr: SocketAddr = cfg
        .listen_addr
        .parse()
        .map_err(|err| anyhow::anyhow!("invalid listen address: {}", err))?;

    let state = ProxyState::new(cfg, table)?;
    let app = proxy::build_router(state);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!(%listen_addr, "edge proxy listening");

    let mut serve_shutdown = shutdown_rx.clone();
    let mut drain_watch = shutdown_rx.clone();
    let serve_task = tokio::spawn(async move {
        axum::serve(listener, make_service)
            .with_graceful_shutdown(async move {
                let _ = serve_shutdown.changed().await;
            })
            .await
    });

    let mut serve_task = serve_task;
    tokio::select! {
        // Server died on its own; surface the error.
        join_result = &mut serve_task => {
            join_result
                .map_err(|err| anyhow::anyhow!("serve task failed: {err}"))?
                .map_err(|err| anyhow::anyhow!("server failed: {err}"))?;
            let _ = sync_handle.await;
            return Ok(());
        }
        // Signal received; give in-flight requests the drain window.
        _ = drain_watch.changed() => {}
    }
    info!("shutting down edge proxy");

    match tokio::time::timeout(SHUTDOWN_DRAIN, serve_task).await {
        Ok(join_result) => {
            join_result
                .map_err(|err| anyhow::anyhow!("serve task failed: {err}"))?
                .map_err(|err| anyhow::anyhow!("server failed: {err}"))?;
        }
        Err(_) => {
            warn!(drain_secs = SHUTDOWN_DRAIN.as_secs(), "drain window elapsed, aborting");
        }
    }

    let _ = sync_handle.await;
    info!("edge proxy stopped");
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
            info!("received Ctrl+C");
        },
        _ = terminate => {
            info!("received SIGTERM");
        },
    }
}
