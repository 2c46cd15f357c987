pub mod actions;
pub mod collector;
pub mod config;
pub mod core_client;
pub mod poller;
pub mod runtime;
pub mod stun;
pub mod telemetry;

#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

use crate::runtime::{DockerRuntime, DynContainerRuntime};

pub use crate::telemetry::init_tracing;

/// Boot the agent: docker client, optional metrics endpoint, poll loop,
/// signal-driven shutdown.
pub async fn run() -> anyhow::Result<()> {
    let cfg = config::load()?;

    let runtime: DynContainerRuntime = Arc::new(DockerRuntime::connect()?);

    if let Some(metrics_addr) = &cfg.metrics_addr {
        let handle = telemetry::init_metrics_recorder();
        let addr: SocketAddr = metrics_addr
            .parse()
            .map_err(|err| anyhow::anyhow!("invalid metrics bind address: {}", err))?;
        tokio::spawn(async move {
            if let Err(err) = telemetry::serve_metrics(handle, addr).await {
                error!(?err, "metrics server exited with error");
            }
        });
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, stopping agent");
        let _ = shutdown_tx.send(true);
    });

    poller::poll_loop(cfg, runtime, shutdown_rx).await
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
