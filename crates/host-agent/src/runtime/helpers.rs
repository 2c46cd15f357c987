use std::collections::HashMap;

use bollard::models::{ContainerStatsResponse, PortBinding, PortMap};

use crate::runtime::PortBindingSpec;

pub(crate) type ExposedPorts = HashMap<String, HashMap<(), ()>>;

pub(crate) fn format_env(env: &[(String, String)]) -> Option<Vec<String>> {
    if env.is_empty() {
        None
    } else {
        Some(env.iter().map(|(k, v)| format!("{k}={v}")).collect())
    }
}

pub(crate) fn format_binds(binds: &[(String, String)]) -> Option<Vec<String>> {
    if binds.is_empty() {
        None
    } else {
        Some(
            binds
                .iter()
                .map(|(host, container)| format!("{host}:{container}"))
                .collect(),
        )
    }
}

pub(crate) fn build_ports(ports: &[PortBindingSpec]) -> (Option<PortMap>, Option<ExposedPorts>) {
    if ports.is_empty() {
        return (None, None);
    }

    let mut port_bindings: PortMap = HashMap::new();
    let mut exposed_ports: ExposedPorts = HashMap::new();

    for spec in ports {
        exposed_ports.entry(spec.container_port.clone()).or_default();
        let entry = port_bindings
            .entry(spec.container_port.clone())
            .or_insert_with(|| Some(Vec::new()));
        if let Some(bindings) = entry.as_mut() {
            bindings.push(PortBinding {
                host_ip: None,
                host_port: Some(spec.host_port.clone()),
            });
        }
    }

    (Some(port_bindings), Some(exposed_ports))
}

/// Normalizes the payload's port map into runtime bindings.
///
/// The native form is `"container/proto" -> "host"`. Two legacy forms are
/// tolerated: a bare `"container" -> "host"` key (tcp assumed) and a
/// `"host:container"` key whose value is ignored.
pub fn normalize_port_map(ports: &HashMap<String, String>) -> Vec<PortBindingSpec> {
    let mut specs: Vec<PortBindingSpec> = ports
        .iter()
        .filter_map(|(key, value)| {
            if key.contains('/') {
                Some(PortBindingSpec {
                    container_port: key.clone(),
                    host_port: value.clone(),
                })
            } else if let Some((host, container)) = key.split_once(':') {
                Some(PortBindingSpec {
                    container_port: format!("{container}/tcp"),
                    host_port: host.to_string(),
                })
            } else if !key.is_empty() && !value.is_empty() {
                Some(PortBindingSpec {
                    container_port: format!("{key}/tcp"),
                    host_port: value.clone(),
                })
            } else {
                None
            }
        })
        .collect();

    specs.sort_by(|a, b| a.container_port.cmp(&b.container_port));
    specs
}

/// CPU percent from a one-shot stats sample:
/// `total_usage / system_cpu_usage * online_cpus`, percpu length as the
/// fallback core count, `None` when any input is missing or zero.
pub(crate) fn one_shot_cpu_percent(stats: &ContainerStatsResponse) -> Option<f64> {
    let cpu = stats.cpu_stats.as_ref()?;
    let usage = cpu.cpu_usage.as_ref()?;
    let total = usage.total_usage? as f64;
    let system = cpu.system_cpu_usage? as f64;
    if total <= 0.0 || system <= 0.0 {
        return None;
    }

    let cpu_count = cpu
        .online_cpus
        .filter(|n| *n > 0)
        .map(|n| n as f64)
        .or_else(|| {
            usage
                .percpu_usage
                .as_ref()
                .filter(|v| !v.is_empty())
                .map(|v| v.len() as f64)
        })?;

    Some(total / system * cpu_count)
}

pub(crate) fn memory_usage_mb(stats: &ContainerStatsResponse) -> Option<u64> {
    stats
        .memory_stats
        .as_ref()
        .and_then(|mem| mem.usage)
        .filter(|usage| *usage > 0)
        .map(|usage| usage / 1024 / 1024)
}

/// Sums one counter across all interfaces; `None` when the sum is zero so a
/// missing sample is never reported as a real zero.
pub(crate) fn interface_total(
    stats: &ContainerStatsResponse,
    selector: impl Fn(&bollard::models::ContainerNetworkStats) -> Option<u64>,
) -> Option<u64> {
    let total: u64 = stats
        .networks
        .as_ref()?
        .values()
        .filter_map(selector)
        .sum();
    (total > 0).then_some(total)
}

pub(crate) fn strip_sha256(id: &str) -> String {
    id.strip_prefix("sha256:").unwrap_or(id).to_string()
}

pub(crate) fn strip_name_slash(name: &str) -> String {
    name.strip_prefix('/').unwrap_or(name).to_string()
}
