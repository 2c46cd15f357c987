use std::sync::Arc;

use async_trait::async_trait;
use common::api::TelemetrySnapshot;
use tracing::{info, warn};

use crate::config::NotificationConfig;

/// One fleet event worth telling an operator about.
#[derive(Debug, Clone, PartialEq)]
pub enum NotifierEvent {
    AgentOffline { agent_name: String },
    CpuThreshold { agent_name: String, usage_percent: f64 },
    RamThreshold { agent_name: String, usage_percent: f64 },
    ContainerStopped { agent_name: String, container_name: String },
}

/// Delivery channel for fleet events. Telegram/email transports live outside
/// this crate; the default sink only logs. Implementations must not block
/// ingest — callers treat every failure as best-effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: NotifierEvent) -> anyhow::Result<()>;
}

pub type DynNotifier = Arc<dyn Notifier>;

/// Sink that records events in the log stream only.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: NotifierEvent) -> anyhow::Result<()> {
        match &event {
            NotifierEvent::AgentOffline { agent_name } => {
                info!(agent = %agent_name, "notification: agent offline");
            }
            NotifierEvent::CpuThreshold { agent_name, usage_percent } => {
                info!(agent = %agent_name, usage_percent, "notification: cpu threshold exceeded");
            }
            NotifierEvent::RamThreshold { agent_name, usage_percent } => {
                info!(agent = %agent_name, usage_percent, "notification: ram threshold exceeded");
            }
            NotifierEvent::ContainerStopped { agent_name, container_name } => {
                info!(agent = %agent_name, container = %container_name, "notification: container stopped");
            }
        }
        Ok(())
    }
}

/// Derives threshold events from one snapshot. Pure so it is testable apart
/// from delivery.
pub fn threshold_events(
    agent_name: &str,
    snapshot: &TelemetrySnapshot,
    thresholds: &NotificationConfig,
) -> Vec<NotifierEvent> {
    let mut events = Vec::new();

    if !snapshot.metrics.cpu.is_empty() {
        let total: f64 = snapshot.metrics.cpu.iter().map(|c| c.usage).sum();
        let avg_percent = total / snapshot.metrics.cpu.len() as f64 * 100.0;
        if avg_percent > thresholds.cpu_threshold {
            events.push(NotifierEvent::CpuThreshold {
                agent_name: agent_name.to_string(),
                usage_percent: avg_percent,
            });
        }
    }

    let ram = &snapshot.metrics.memory.ram;
    if ram.total > 0 {
        let ram_percent = ram.usage as f64 / ram.total as f64 * 100.0;
        if ram_percent > thresholds.ram_threshold {
            events.push(NotifierEvent::RamThreshold {
                agent_name: agent_name.to_string(),
                usage_percent: ram_percent,
            });
        }
    }

    for container in &snapshot.docker.containers {
        let status = container.status.to_ascii_lowercase();
        if status.contains("exited") || status.contains("stopped") {
            events.push(NotifierEvent::ContainerStopped {
                agent_name: agent_name.to_string(),
                container_name: container.name.clone(),
            });
        }
    }

    events
}

/// Fires threshold checks for one ingested snapshot. Failures are logged and
/// swallowed so the ping path never depends on delivery.
pub async fn check_snapshot(
    notifier: &DynNotifier,
    agent_name: &str,
    snapshot: &TelemetrySnapshot,
    thresholds: &NotificationConfig,
) {
    for event in threshold_events(agent_name, snapshot, thresholds) {
        if let Err(err) = notifier.notify(event).await {
            warn!(?err, agent = %agent_name, "notification delivery failed");
        }
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Notifier that records every event for assertions.
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        pub events: Mutex<Vec<NotifierEvent>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, event: NotifierEvent) -> anyhow::Result<()> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::api::{ContainerNetworkSample, ContainerSample, CpuSample, MemoryBank};

    fn thresholds() -> NotificationConfig {
        NotificationConfig {
            cpu_threshold: 80.0,
            ram_threshold: 80.0,
        }
    }

    fn container(status: &str) -> ContainerSample {
        ContainerSample {
            id: "c-1".into(),
            created: "2024-01-01T00:00:00Z".into(),
            status: status.into(),
            restart_count: 0,
            image: "img".into(),
            name: "web".into(),
            ip: None,
            mac: None,
            cpu: None,
            memory: None,
            network: ContainerNetworkSample::default(),
            logs: vec![],
        }
    }

    #[test]
    fn quiet_snapshot_produces_no_events() {
        let mut snapshot = TelemetrySnapshot::default();
        snapshot.metrics.cpu = vec![CpuSample {
            name: "cpu0".into(),
            usage: 0.10,
        }];
        snapshot.metrics.memory.ram = MemoryBank {
            total: 1000,
            usage: 100,
        };
        assert!(threshold_events("a", &snapshot, &thresholds()).is_empty());
    }

    #[test]
    fn hot_cpu_and_ram_fire_events() {
        let mut snapshot = TelemetrySnapshot::default();
        snapshot.metrics.cpu = vec![
            CpuSample {
                name: "cpu0".into(),
                usage: 0.95,
            },
            CpuSample {
                name: "cpu1".into(),
                usage: 0.85,
            },
        ];
        snapshot.metrics.memory.ram = MemoryBank {
            total: 1000,
            usage: 950,
        };

        let events = threshold_events("a", &snapshot, &thresholds());
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], NotifierEvent::CpuThreshold { usage_percent, .. } if usage_percent > 80.0));
        assert!(matches!(events[1], NotifierEvent::RamThreshold { usage_percent, .. } if usage_percent > 80.0));
    }

    #[test]
    fn stopped_containers_fire_per_container() {
        let mut snapshot = TelemetrySnapshot::default();
        snapshot.docker.containers = vec![
            container("Exited (0) 5 minutes ago"),
            container("Up 3 hours"),
            container("stopped"),
        ];

        let events = threshold_events("a", &snapshot, &thresholds());
        assert_eq!(events.len(), 2);
    }
}
