//! Shared API DTOs used across control-plane, host-agent, and edge-proxy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Lifecycle state of a queued action (wire format uses lowercase values).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    /// Queued, not yet acknowledged by the agent.
    Pending,
    /// Executed successfully.
    Completed,
    /// Executed and failed.
    Failed,
}

impl ActionStatus {
    /// Returns the canonical lowercase representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Pending => "pending",
            ActionStatus::Completed => "completed",
            ActionStatus::Failed => "failed",
        }
    }

    /// Whether this status ends the action's lifecycle.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ActionStatus::Pending)
    }
}

/// Kind of work an action asks the agent to perform.
///
/// Unknown values survive deserialization via [`ActionType::Other`] so the
/// control-plane can store operator-supplied types it does not recognize;
/// agents report those back as failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum ActionType {
    /// Create (or start an existing) container.
    StartContainer,
    /// Stop a running container.
    StopContainer,
    /// Restart a container.
    RestartContainer,
    /// Remove a container.
    RemoveContainer,
    /// Remove an image.
    RemoveImage,
    /// Pull an image from a registry.
    PullImage,
    /// Rewrite one domain's nginx site config from a route list.
    UpdateNginxConfig,
    /// Write a fresh nginx site config, optionally with SSL material.
    CreateNginxConfig,
    /// Remove a domain's nginx site config and SSL directory.
    DeleteNginxConfig,
    /// Any type this build does not know.
    Other(String),
}

impl ActionType {
    /// Returns the canonical snake_case representation.
    pub fn as_str(&self) -> &str {
        match self {
            ActionType::StartContainer => "start_container",
            ActionType::StopContainer => "stop_container",
            ActionType::RestartContainer => "restart_container",
            ActionType::RemoveContainer => "remove_container",
            ActionType::RemoveImage => "remove_image",
            ActionType::PullImage => "pull_image",
            ActionType::UpdateNginxConfig => "update_nginx_config",
            ActionType::CreateNginxConfig => "create_nginx_config",
            ActionType::DeleteNginxConfig => "delete_nginx_config",
            ActionType::Other(raw) => raw,
        }
    }
}

impl From<String> for ActionType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "start_container" => ActionType::StartContainer,
            "stop_container" => ActionType::StopContainer,
            "restart_container" => ActionType::RestartContainer,
            "remove_container" => ActionType::RemoveContainer,
            "remove_image" => ActionType::RemoveImage,
            "pull_image" => ActionType::PullImage,
            "update_nginx_config" => ActionType::UpdateNginxConfig,
            "create_nginx_config" => ActionType::CreateNginxConfig,
            "delete_nginx_config" => ActionType::DeleteNginxConfig,
            _ => ActionType::Other(raw),
        }
    }
}

impl From<ActionType> for String {
    fn from(value: ActionType) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One queued action exactly as it appears in the ping response array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEnvelope {
    /// Action identifier.
    pub id: Uuid,
    /// Owning agent.
    pub agent_id: Uuid,
    /// Action kind.
    #[serde(rename = "type")]
    pub action_type: ActionType,
    /// Raw JSON payload; parsed into a typed payload at the executing edge.
    pub payload: Value,
    /// Current lifecycle state.
    pub status: ActionStatus,
    /// Enqueue time.
    pub created: DateTime<Utc>,
    /// Terminal transition time, if any.
    pub completed: Option<DateTime<Utc>>,
    /// Success message reported by the agent.
    pub response: Option<String>,
    /// Failure message reported by the agent.
    pub error: Option<String>,
}

/// Result an agent reports back for one executed action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionAck {
    /// Action identifier being acknowledged.
    pub id: Uuid,
    /// Terminal status (`completed` or `failed`).
    pub status: ActionStatus,
    /// Success message; set exactly when `error` is not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Failure message; set exactly when `response` is not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Telemetry snapshot
// ---------------------------------------------------------------------------

/// One full telemetry submission; the body of `POST /api/agent/ping`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Host-level metrics.
    pub metrics: HostMetrics,
    /// Container runtime inventory.
    pub docker: DockerTelemetry,
}

/// Host-level metrics block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostMetrics {
    /// Per-core utilization samples.
    pub cpu: Vec<CpuSample>,
    /// RAM and swap usage.
    pub memory: MemorySample,
    /// Per-device cumulative disk IO counters.
    pub disk: Vec<DiskSample>,
    /// Public IP plus primary-interface traffic counters.
    pub network: NetworkSample,
}

/// Utilization of one logical core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuSample {
    /// Core name, `cpu0`, `cpu1`, ...
    pub name: String,
    /// Utilization as a fraction in [0, 1].
    pub usage: f64,
}

/// RAM and swap usage, both in MiB.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemorySample {
    /// RAM totals.
    pub ram: MemoryBank,
    /// Swap totals.
    pub swap: MemoryBank,
}

/// Total and used size of one memory bank in MiB.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryBank {
    /// Total MiB.
    pub total: u64,
    /// Used MiB.
    pub usage: u64,
}

/// Cumulative IO counters for one block device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskSample {
    /// Device name.
    pub name: String,
    /// Bytes read since boot.
    pub read_bytes: u64,
    /// Bytes written since boot.
    pub write_bytes: u64,
    /// Read operations since boot.
    pub reads: u64,
    /// Write operations since boot.
    pub writes: u64,
}

/// Public IP and primary-interface traffic counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSample {
    /// STUN-discovered public IP, `127.0.0.1` when discovery failed.
    pub public_ip: String,
    /// Cumulative bytes sent on the primary interface.
    pub sent: u64,
    /// Cumulative bytes received on the primary interface.
    pub received: u64,
}

impl Default for NetworkSample {
    fn default() -> Self {
        Self {
            public_ip: "127.0.0.1".to_string(),
            sent: 0,
            received: 0,
        }
    }
}

/// Container runtime inventory block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockerTelemetry {
    /// All containers, running or not.
    pub containers: Vec<ContainerSample>,
    /// All locally present images.
    pub images: Vec<ImageSample>,
}

/// One container's snapshot. Missing metrics are `None`, never zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSample {
    /// Full container id.
    pub id: String,
    /// Creation time, RFC3339Nano.
    pub created: String,
    /// Raw runtime status string.
    pub status: String,
    /// Restart count reported by the runtime.
    pub restart_count: i64,
    /// Image id with the `sha256:` prefix stripped.
    pub image: String,
    /// Container name with the leading `/` stripped.
    pub name: String,
    /// First non-empty IP across attached networks.
    pub ip: Option<String>,
    /// First non-empty MAC across attached networks.
    pub mac: Option<String>,
    /// CPU usage percent derived from a one-shot stats sample.
    pub cpu: Option<f64>,
    /// Memory usage in MiB.
    pub memory: Option<u64>,
    /// Aggregate interface counters and attached network names.
    pub network: ContainerNetworkSample,
    /// Log lines since the last collection window, timestamps preserved.
    pub logs: Vec<String>,
}

/// Aggregate network view of one container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerNetworkSample {
    /// Total tx bytes across interfaces.
    pub sent: Option<u64>,
    /// Total rx bytes across interfaces.
    pub received: Option<u64>,
    /// Attached network names.
    pub networks: Vec<String>,
}

/// One image's snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSample {
    /// Image id with the `sha256:` prefix stripped.
    pub id: String,
    /// Creation time, RFC3339.
    pub created: String,
    /// Size in bytes.
    pub size: i64,
    /// Repo tags, `<none>:<none>` filtered out.
    pub tags: Vec<String>,
}

// ---------------------------------------------------------------------------
// Typed action payloads (parsed at the executing boundary)
// ---------------------------------------------------------------------------

/// Payload of `start_container`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartContainerPayload {
    /// Image reference to run.
    pub image: String,
    /// Container name.
    pub name: String,
    /// Existing container to start instead of creating a new one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    /// Port map, `"container/proto" -> "host"`; `"host:container"` keys are
    /// also tolerated and normalized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<std::collections::HashMap<String, String>>,
    /// Environment variables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<std::collections::HashMap<String, String>>,
    /// Volume binds, host path -> container path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<std::collections::HashMap<String, String>>,
    /// Domain to point at the container via a best-effort local nginx rewrite.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// Payload of `stop_container`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopContainerPayload {
    /// Container to stop.
    pub container_id: String,
    /// Seconds to wait before the runtime kills the container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
}

/// Payload of `restart_container`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartContainerPayload {
    /// Container to restart.
    pub container_id: String,
    /// Seconds to wait before the runtime kills the container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
}

/// Payload of `remove_container`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveContainerPayload {
    /// Container to remove.
    pub container_id: String,
    /// Remove even if running.
    #[serde(default)]
    pub force: bool,
}

/// Payload of `remove_image`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveImagePayload {
    /// Image to remove.
    pub image_id: String,
    /// Remove even if tagged in multiple repositories.
    #[serde(default)]
    pub force: bool,
}

/// Payload of `pull_image`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullImagePayload {
    /// Image reference without tag.
    pub image: String,
    /// Tag, defaults to `latest`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// One `location` block within a domain's nginx site config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NginxRoutePayload {
    /// Location path, e.g. `/` or `/api`.
    pub path: String,
    /// Upstream container name.
    pub container_name: String,
    /// Upstream container port.
    pub port: String,
}

/// Payload of `update_nginx_config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateNginxConfigPayload {
    /// Domain whose site config is rewritten.
    pub domain: String,
    /// Emit the SSL variant of the config.
    pub ssl_enabled: bool,
    /// Active routes ordered by path.
    pub routes: Vec<NginxRoutePayload>,
}

/// Payload of `create_nginx_config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNginxConfigPayload {
    /// Domain to configure.
    pub domain: String,
    /// Upstream container name.
    pub container_name: String,
    /// Upstream container port.
    pub port: String,
    /// Emit the SSL variant and write key material.
    #[serde(default)]
    pub ssl: bool,
    /// PEM private key, required when `ssl` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    /// PEM certificate, required when `ssl` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

/// Payload of `delete_nginx_config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteNginxConfigPayload {
    /// Domain whose config and SSL directory are removed.
    pub domain: String,
}

// ---------------------------------------------------------------------------
// Public routing feed (edge proxy sync)
// ---------------------------------------------------------------------------

/// Body of `GET /api/domains/public`; secrets-free by design.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublicDomainFeed {
    /// Active domains with their routes.
    pub domains: Vec<PublicDomain>,
    /// Number of domains in the feed.
    pub total: usize,
}

/// One routable domain as the edge proxy sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicDomain {
    /// Domain identifier.
    pub id: Uuid,
    /// Hostname.
    pub name: String,
    /// Public IP of the owning agent's host.
    pub agent_ip: String,
    /// Whether the agent terminates SSL for this domain.
    pub ssl_enabled: bool,
    /// Path routes within the domain.
    pub routes: Vec<PublicRoute>,
}

/// One path route in the public feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicRoute {
    /// Location path.
    pub path: String,
    /// Upstream container name.
    pub container_name: String,
    /// Upstream container port.
    pub port: String,
    /// Whether the route participates in the rendered config.
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_type_round_trips_known_and_unknown() {
        let json = serde_json::to_string(&ActionType::PullImage).unwrap();
        assert_eq!(json, "\"pull_image\"");
        let back: ActionType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ActionType::PullImage);

        let other: ActionType = serde_json::from_str("\"reboot_host\"").unwrap();
        assert_eq!(other, ActionType::Other("reboot_host".into()));
        assert_eq!(serde_json::to_string(&other).unwrap(), "\"reboot_host\"");
    }

    #[test]
    fn action_status_terminality() {
        assert!(!ActionStatus::Pending.is_terminal());
        assert!(ActionStatus::Completed.is_terminal());
        assert!(ActionStatus::Failed.is_terminal());
    }

    #[test]
    fn snapshot_deserializes_minimal_ping_body() {
        let body = serde_json::json!({
            "metrics": {
                "cpu": [{"name": "cpu0", "usage": 0.25}],
                "memory": {"ram": {"total": 2048, "usage": 512}, "swap": {"total": 0, "usage": 0}},
                "disk": [],
                "network": {"public_ip": "1.2.3.4", "sent": 0, "received": 0}
            },
            "docker": {"containers": [], "images": []}
        });

        let snapshot: TelemetrySnapshot = serde_json::from_value(body).unwrap();
        assert_eq!(snapshot.metrics.cpu.len(), 1);
        assert_eq!(snapshot.metrics.cpu[0].name, "cpu0");
        assert_eq!(snapshot.metrics.memory.ram.total, 2048);
        assert_eq!(snapshot.metrics.network.public_ip, "1.2.3.4");
        assert!(snapshot.docker.containers.is_empty());
    }

    #[test]
    fn container_sample_tolerates_null_metrics() {
        let body = serde_json::json!({
            "id": "abc", "created": "2024-01-01T00:00:00.000000000Z",
            "status": "Exited (0) 2 hours ago", "restart_count": 0,
            "image": "deadbeef", "name": "web",
            "ip": null, "mac": null, "cpu": null, "memory": null,
            "network": {"sent": null, "received": null, "networks": []},
            "logs": []
        });
        let sample: ContainerSample = serde_json::from_value(body).unwrap();
        assert!(sample.cpu.is_none());
        assert!(sample.memory.is_none());
        assert!(sample.network.sent.is_none());
    }

    #[test]
    fn ack_omits_absent_sides() {
        let ack = ActionAck {
            id: Uuid::nil(),
            status: ActionStatus::Completed,
            response: Some("done".into()),
            error: None,
        };
        let value = serde_json::to_value(&ack).unwrap();
        assert!(value.get("error").is_none());
        assert_eq!(value["response"], "done");
    }
}
