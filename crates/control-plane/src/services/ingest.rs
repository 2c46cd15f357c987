use common::api::{ActionEnvelope, TelemetrySnapshot};
use uuid::Uuid;

use crate::{
    app_state::AppState,
    error::ApiResult,
    notify,
    persistence::{actions, pings},
    telemetry,
};

/// Full ping pipeline for one authenticated agent: persist the snapshot in a
/// single transaction, run best-effort notifier checks, then drain the
/// pending action queue. Any storage failure aborts before the queue is read,
/// so the agent retries with its actions still pending.
pub async fn ingest_ping(
    state: &AppState,
    agent_id: Uuid,
    agent_name: &str,
    snapshot: TelemetrySnapshot,
) -> ApiResult<Vec<ActionEnvelope>> {
    if let Err(err) = pings::record_snapshot(&state.db, agent_id, &snapshot).await {
        telemetry::record_ping_result("storage_error");
        return Err(err.into());
    }

    notify::check_snapshot(&state.notifier, agent_name, &snapshot, &state.thresholds).await;

    let pending = actions::list_pending_for_agent(&state.db, agent_id).await?;
    telemetry::record_ping_result("success");

    Ok(pending.into_iter().map(|r| r.into_envelope()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::test_support::RecordingNotifier;
    use crate::notify::NotifierEvent;
    use crate::persistence::{agents, migrations};
    use crate::{
        config::{NotificationConfig, WatcherConfig},
        persistence::actions::NewAction,
    };
    use common::api::{ActionType, CpuSample, MemoryBank};
    use std::sync::Arc;

    async fn test_state() -> (AppState, Arc<RecordingNotifier>) {
        let pool = migrations::init_pool("sqlite::memory:").await.expect("pool");
        migrations::run_migrations(&pool).await.expect("migrations");
        let notifier = Arc::new(RecordingNotifier::default());
        let state = AppState {
            db: pool,
            jwt_secret: "test-secret".into(),
            notifier: notifier.clone(),
            thresholds: NotificationConfig {
                cpu_threshold: 80.0,
                ram_threshold: 80.0,
            },
            watcher: WatcherConfig {
                sweep_interval_secs: 30,
                offline_after_secs: 60,
            },
        };
        (state, notifier)
    }

    fn busy_snapshot() -> TelemetrySnapshot {
        let mut snapshot = TelemetrySnapshot::default();
        snapshot.metrics.cpu = vec![CpuSample {
            name: "cpu0".into(),
            usage: 0.95,
        }];
        snapshot.metrics.memory.ram = MemoryBank {
            total: 1000,
            usage: 100,
        };
        snapshot.metrics.network.public_ip = "9.9.9.9".into();
        snapshot
    }

    #[tokio::test]
    async fn ping_persists_checks_and_drains_in_order() {
        let (state, notifier) = test_state().await;
        let agent = agents::create_agent(
            &state.db,
            agents::NewAgent {
                id: Uuid::new_v4(),
                name: "host-1".into(),
                token: "tk-1".into(),
            },
        )
        .await
        .unwrap();

        let first = actions::insert_action(
            &state.db,
            NewAction::new(agent.id, ActionType::PullImage, serde_json::json!({})),
        )
        .await
        .unwrap();
        let second = actions::insert_action(
            &state.db,
            NewAction::new(agent.id, ActionType::StopContainer, serde_json::json!({})),
        )
        .await
        .unwrap();

        let envelopes = ingest_ping(&state, agent.id, &agent.name, busy_snapshot())
            .await
            .unwrap();

        assert_eq!(envelopes.len(), 2);
        assert_eq!(envelopes[0].id, first.id);
        assert_eq!(envelopes[1].id, second.id);

        assert_eq!(pings::count_pings(&state.db, agent.id).await.unwrap(), 1);
        assert_eq!(
            pings::latest_public_ip(&state.db, agent.id).await.unwrap().as_deref(),
            Some("9.9.9.9")
        );

        let events = notifier.events.lock().unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e, NotifierEvent::CpuThreshold { .. })));
    }

    #[tokio::test]
    async fn ping_with_empty_queue_returns_empty_array() {
        let (state, _notifier) = test_state().await;
        let agent = agents::create_agent(
            &state.db,
            agents::NewAgent {
                id: Uuid::new_v4(),
                name: "host-2".into(),
                token: "tk-2".into(),
            },
        )
        .await
        .unwrap();

        let envelopes = ingest_ping(&state, agent.id, &agent.name, TelemetrySnapshot::default())
            .await
            .unwrap();
        assert!(envelopes.is_empty());
    }
}
