use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::{
    actions::{self, nginx::NginxManager},
    collector,
    config::AppConfig,
    core_client::CoreClient,
    runtime::DynContainerRuntime,
    telemetry,
};

/// The agent's main loop. One cycle per tick: collect, ping, execute the
/// returned actions sequentially, ack each one. A cycle always runs to
/// completion before the next tick is awaited, so cycles never overlap.
pub async fn poll_loop(
    cfg: AppConfig,
    runtime: DynContainerRuntime,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let client = CoreClient::new(&cfg)?;
    let nginx = NginxManager::new(
        cfg.nginx_conf_dir.clone(),
        cfg.nginx_container.clone(),
        runtime.clone(),
    );

    let mut interval = tokio::time::interval(Duration::from_secs(cfg.interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!(url = %cfg.url, interval_secs = cfg.interval_secs, "agent loop starting");

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = interval.tick() => {
                run_cycle(&cfg, &runtime, &client, &nginx).await;
            }
        }
    }

    Ok(())
}

/// One full telemetry/action cycle. Core failures skip the rest of the tick;
/// individual action failures never abort the batch.
pub async fn run_cycle(
    cfg: &AppConfig,
    runtime: &DynContainerRuntime,
    client: &CoreClient,
    nginx: &NginxManager,
) {
    let snapshot = match collector::collect_snapshot(cfg, runtime).await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!(?err, "telemetry collection failed, skipping tick");
            telemetry::record_cycle_result("collect_error");
            return;
        }
    };

    let pending = match client.ping(&snapshot).await {
        Ok(actions) => actions,
        Err(err) => {
            warn!(?err, "ping failed, skipping tick");
            telemetry::record_cycle_result("ping_error");
            return;
        }
    };

    if !pending.is_empty() {
        info!(count = pending.len(), "received actions to process");
    }

    for action in &pending {
        let outcome = actions::execute(runtime, nginx, action).await;
        let ack = outcome.into_ack(action.id);
        // No retry here: a lost ack leaves the action pending on the core and
        // it will be re-delivered with the next ping.
        if let Err(err) = client.report(action.id, &ack).await {
            warn!(?err, action_id = %action.id, "failed to report action result");
        }
    }

    telemetry::record_cycle_result("success");
}
