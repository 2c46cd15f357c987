use common::api::{ActionAck, ActionEnvelope, ActionStatus, ActionType};
use tracing::info;

use crate::{actions::nginx::NginxManager, runtime::DynContainerRuntime, telemetry};

pub mod containers;
pub mod nginx;

/// Result of executing one action: exactly one of `response` / `error` is
/// set, mirroring the ack contract.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub status: ActionStatus,
    pub response: Option<String>,
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn completed(message: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Completed,
            response: Some(message.into()),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Failed,
            response: None,
            error: Some(message.into()),
        }
    }

    pub fn into_ack(self, action_id: uuid::Uuid) -> ActionAck {
        ActionAck {
            id: action_id,
            status: self.status,
            response: self.response,
            error: self.error,
        }
    }
}

/// Dispatches one action to its handler. Actions may be re-delivered after a
/// lost ack, so every handler tolerates re-execution of the same id.
pub async fn execute(
    runtime: &DynContainerRuntime,
    nginx: &NginxManager,
    action: &ActionEnvelope,
) -> ActionOutcome {
    info!(action_id = %action.id, action_type = %action.action_type, "processing action");

    let outcome = match &action.action_type {
        ActionType::StartContainer => {
            containers::start_container(runtime, nginx, &action.payload).await
        }
        ActionType::StopContainer => containers::stop_container(runtime, &action.payload).await,
        ActionType::RestartContainer => {
            containers::restart_container(runtime, &action.payload).await
        }
        ActionType::RemoveContainer => containers::remove_container(runtime, &action.payload).await,
        ActionType::RemoveImage => containers::remove_image(runtime, &action.payload).await,
        ActionType::PullImage => containers::pull_image(runtime, &action.payload).await,
        ActionType::UpdateNginxConfig => match parse_payload(&action.payload) {
            Ok(payload) => nginx_outcome(nginx.apply_update(&payload).await),
            Err(outcome) => outcome,
        },
        ActionType::CreateNginxConfig => match parse_payload(&action.payload) {
            Ok(payload) => nginx_outcome(nginx.apply_create(&payload).await),
            Err(outcome) => outcome,
        },
        ActionType::DeleteNginxConfig => match parse_payload(&action.payload) {
            Ok(payload) => nginx_outcome(nginx.apply_delete(&payload).await),
            Err(outcome) => outcome,
        },
        ActionType::Other(raw) => ActionOutcome::failed(format!("Unknown action type: {raw}")),
    };

    telemetry::record_action_result(
        action.action_type.as_str(),
        outcome.status.as_str(),
    );

    outcome
}

fn parse_payload<P: serde::de::DeserializeOwned>(
    payload: &serde_json::Value,
) -> Result<P, ActionOutcome> {
    serde_json::from_value(payload.clone())
        .map_err(|err| ActionOutcome::failed(format!("Invalid payload: {err}")))
}

fn nginx_outcome(result: anyhow::Result<String>) -> ActionOutcome {
    match result {
        Ok(message) => ActionOutcome::completed(message),
        Err(err) => ActionOutcome::failed(format!("{err:#}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockRuntime;
    use chrono::Utc;
    use std::sync::Arc;
    use uuid::Uuid;

    fn envelope(action_type: &str, payload: serde_json::Value) -> ActionEnvelope {
        ActionEnvelope {
            id: Uuid::new_v4(),
            agent_id: Uuid::new_v4(),
            action_type: ActionType::from(action_type.to_string()),
            payload,
            status: ActionStatus::Pending,
            created: Utc::now(),
            completed: None,
            response: None,
            error: None,
        }
    }

    #[tokio::test]
    async fn unknown_action_type_fails_with_stable_message() {
        let runtime: DynContainerRuntime = Arc::new(MockRuntime::default());
        let dir = tempfile::tempdir().unwrap();
        let nginx = NginxManager::new(dir.path(), "agent-nginx-1".into(), runtime.clone());

        let outcome = execute(
            &runtime,
            &nginx,
            &envelope("reboot_host", serde_json::json!({})),
        )
        .await;

        assert_eq!(outcome.status, ActionStatus::Failed);
        assert_eq!(outcome.error.as_deref(), Some("Unknown action type: reboot_host"));
        assert!(outcome.response.is_none());
    }

    #[tokio::test]
    async fn outcome_becomes_ack_with_one_side_set() {
        let id = Uuid::new_v4();
        let ack = ActionOutcome::completed("done").into_ack(id);
        assert_eq!(ack.id, id);
        assert_eq!(ack.status, ActionStatus::Completed);
        assert!(ack.response.is_some() && ack.error.is_none());

        let ack = ActionOutcome::failed("boom").into_ack(id);
        assert_eq!(ack.status, ActionStatus::Failed);
        assert!(ack.response.is_none() && ack.error.is_some());
    }

    #[tokio::test]
    async fn nginx_update_round_trips_through_dispatch() {
        let runtime_impl = Arc::new(MockRuntime::default());
        let runtime: DynContainerRuntime = runtime_impl.clone();
        let dir = tempfile::tempdir().unwrap();
        let nginx = NginxManager::new(dir.path(), "agent-nginx-1".into(), runtime.clone());

        let outcome = execute(
            &runtime,
            &nginx,
            &envelope(
                "update_nginx_config",
                serde_json::json!({
                    "domain": "x.example.com",
                    "ssl_enabled": false,
                    "routes": [{"path": "/", "container_name": "web", "port": "3000"}]
                }),
            ),
        )
        .await;

        assert_eq!(outcome.status, ActionStatus::Completed);
        assert!(dir.path().join("x.example.com.conf").exists());
        assert_eq!(runtime_impl.restarted(), vec!["agent-nginx-1".to_string()]);
    }

    #[tokio::test]
    async fn malformed_nginx_payload_fails_without_touching_disk() {
        let runtime: DynContainerRuntime = Arc::new(MockRuntime::default());
        let dir = tempfile::tempdir().unwrap();
        let nginx = NginxManager::new(dir.path(), "agent-nginx-1".into(), runtime.clone());

        let outcome = execute(
            &runtime,
            &nginx,
            &envelope("update_nginx_config", serde_json::json!({"domain": 42})),
        )
        .await;

        assert_eq!(outcome.status, ActionStatus::Failed);
        assert!(outcome.error.unwrap().starts_with("Invalid payload"));
    }
}
