use std::net::SocketAddr;
use std::sync::OnceLock;

use axum::{http::StatusCode, routing::get, Router};
use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json())
        .init();
}

pub fn init_metrics_recorder() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .expect("metrics recorder already installed")
        })
        .clone()
}

pub async fn serve_metrics(handle: PrometheusHandle, addr: SocketAddr) -> anyhow::Result<()> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let body = handle.render();
            async move {
                (
                    StatusCode::OK,
                    [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
                    body,
                )
            }
        }),
    );

    let listener = TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr().unwrap_or(addr);
    info!(%bound_addr, "metrics server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn record_ping_result(result: &str) {
    counter!(
        "fleet_core_pings_total",
        "result" => result.to_string()
    )
    .increment(1);
}

pub fn record_action_transition(status: &str) {
    counter!(
        "fleet_core_action_transitions_total",
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_action_enqueued(action_type: &str) {
    counter!(
        "fleet_core_actions_enqueued_total",
        "type" => action_type.to_string()
    )
    .increment(1);
}

pub fn record_offline_agent() {
    counter!("fleet_core_offline_agents_total").increment(1);
}

pub fn record_internal_error() {
    counter!("fleet_core_internal_errors_total").increment(1);
}
