use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use tracing::warn;

use crate::{
    app_state::AppState,
    notify::NotifierEvent,
    persistence::{self as db, agents},
    telemetry,
};

/// Periodic sweep for agents that stopped pinging. Runs for the lifetime of
/// the process; every failure is logged and the next tick proceeds.
pub async fn offline_watcher_loop(state: AppState) {
    let sweep_interval = Duration::from_secs(state.watcher.sweep_interval_secs.max(1));
    let mut interval = tokio::time::interval(sweep_interval);

    loop {
        interval.tick().await;
        if let Err(err) = run_offline_sweep(&state).await {
            warn!(?err, "offline sweep failed");
        }
    }
}

/// One sweep: report every active agent whose last ping is missing or older
/// than the configured staleness window.
pub async fn run_offline_sweep(state: &AppState) -> crate::Result<usize> {
    let cutoff = Utc::now() - ChronoDuration::seconds(state.watcher.offline_after_secs);
    let stale = stale_agents(&state.db, cutoff).await?;
    let count = stale.len();

    for agent in stale {
        telemetry::record_offline_agent();
        if let Err(err) = state
            .notifier
            .notify(NotifierEvent::AgentOffline {
                agent_name: agent.name.clone(),
            })
            .await
        {
            warn!(?err, agent = %agent.name, "offline notification failed");
        }
    }

    Ok(count)
}

async fn stale_agents(
    pool: &db::Db,
    cutoff: chrono::DateTime<Utc>,
) -> crate::Result<Vec<agents::AgentRecord>> {
    agents::find_stale_active_agents(pool, cutoff).await
}
