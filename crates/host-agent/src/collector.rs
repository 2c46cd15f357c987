use chrono::{DateTime, SecondsFormat, Utc};
use common::api::{
    ContainerNetworkSample, ContainerSample, CpuSample, DiskSample, DockerTelemetry, HostMetrics,
    ImageSample, MemoryBank, MemorySample, NetworkSample, TelemetrySnapshot,
};
use sysinfo::{Networks, System};
use tracing::warn;

use crate::{config::AppConfig, runtime::DynContainerRuntime, stun};

const MIB: u64 = 1024 * 1024;

/// Assembles one full telemetry snapshot: host metrics, STUN public IP, and
/// the container runtime inventory. Runtime failures degrade to empty docker
/// sections rather than losing the whole snapshot.
pub async fn collect_snapshot(
    cfg: &AppConfig,
    runtime: &DynContainerRuntime,
) -> anyhow::Result<TelemetrySnapshot> {
    let public_ip = stun::discover_public_ip(&cfg.stun_server).await;
    let primary_interface = cfg.primary_interface.clone();

    let metrics = tokio::task::spawn_blocking(move || collect_host_metrics(&primary_interface))
        .await?
        .map(|mut metrics| {
            metrics.network.public_ip = public_ip;
            metrics
        })?;

    let docker = collect_docker_telemetry(runtime, cfg.interval_secs as i64).await;

    Ok(TelemetrySnapshot { metrics, docker })
}

fn collect_host_metrics(primary_interface: &str) -> anyhow::Result<HostMetrics> {
    let mut sys = System::new();

    // CPU utilization needs two samples spaced by the refresh interval.
    sys.refresh_cpu_usage();
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu_usage();
    let cpu = sys
        .cpus()
        .iter()
        .enumerate()
        .map(|(index, cpu)| CpuSample {
            name: format!("cpu{index}"),
            usage: (cpu.cpu_usage() as f64 / 100.0).clamp(0.0, 1.0),
        })
        .collect();

    sys.refresh_memory();
    let memory = MemorySample {
        ram: MemoryBank {
            total: sys.total_memory() / MIB,
            usage: sys.used_memory() / MIB,
        },
        swap: MemoryBank {
            total: sys.total_swap() / MIB,
            usage: sys.used_swap() / MIB,
        },
    };

    let disk = collect_disk_samples();

    let networks = Networks::new_with_refreshed_list();
    let (sent, received) = networks
        .iter()
        .find(|(name, _)| name.as_str() == primary_interface)
        .map(|(_, data)| (data.total_transmitted(), data.total_received()))
        .unwrap_or((0, 0));

    Ok(HostMetrics {
        cpu,
        memory,
        disk,
        network: NetworkSample {
            public_ip: String::new(),
            sent,
            received,
        },
    })
}

/// Per-device cumulative IO counters. sysinfo exposes byte totals but not
/// operation counts, so on Linux the kernel's diskstats table is read
/// directly; elsewhere the section is empty.
fn collect_disk_samples() -> Vec<DiskSample> {
    #[cfg(target_os = "linux")]
    {
        match std::fs::read_to_string("/proc/diskstats") {
            Ok(contents) => parse_diskstats(&contents),
            Err(err) => {
                warn!(?err, "failed to read /proc/diskstats");
                Vec::new()
            }
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        Vec::new()
    }
}

/// Parses `/proc/diskstats` lines into whole-device samples. Partitions
/// (names ending in a digit-suffixed parent, e.g. `sda1`, `nvme0n1p2`) and
/// pseudo devices (`loop*`, `ram*`) are skipped.
pub(crate) fn parse_diskstats(contents: &str) -> Vec<DiskSample> {
    const SECTOR_SIZE: u64 = 512;

    contents
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 14 {
                return None;
            }
            let name = fields[2];
            if name.starts_with("loop") || name.starts_with("ram") || is_partition(name) {
                return None;
            }

            let reads = fields[3].parse::<u64>().ok()?;
            let sectors_read = fields[5].parse::<u64>().ok()?;
            let writes = fields[7].parse::<u64>().ok()?;
            let sectors_written = fields[9].parse::<u64>().ok()?;

            Some(DiskSample {
                name: name.to_string(),
                read_bytes: sectors_read * SECTOR_SIZE,
                write_bytes: sectors_written * SECTOR_SIZE,
                reads,
                writes,
            })
        })
        .collect()
}

fn is_partition(name: &str) -> bool {
    // nvme0n1p1 / mmcblk0p2 style partitions carry a 'p<digit>' suffix.
    if let Some(idx) = name.rfind('p') {
        if idx > 0
            && name[idx + 1..].chars().all(|c| c.is_ascii_digit())
            && !name[idx + 1..].is_empty()
            && name[..idx].chars().rev().take(1).all(|c| c.is_ascii_digit())
        {
            return true;
        }
    }
    // sda1 / vdb2 style partitions end in digits on an sd/vd/hd/xvd stem.
    name.ends_with(|c: char| c.is_ascii_digit())
        && ["sd", "vd", "hd", "xvd"]
            .iter()
            .any(|prefix| name.starts_with(prefix))
}

async fn collect_docker_telemetry(
    runtime: &DynContainerRuntime,
    interval_secs: i64,
) -> DockerTelemetry {
    let containers = match runtime.list_container_overviews().await {
        Ok(overviews) => {
            let mut samples = Vec::with_capacity(overviews.len());
            for overview in overviews {
                let usage = runtime.container_usage(&overview.id).await;
                let logs = match runtime
                    .container_logs_since(&overview.id, interval_secs)
                    .await
                {
                    Ok(lines) => lines,
                    Err(err) => {
                        warn!(?err, container = %overview.id, "log collection failed");
                        Vec::new()
                    }
                };

                samples.push(ContainerSample {
                    id: overview.id,
                    created: unix_to_rfc3339_nano(overview.created_unix),
                    status: overview.status,
                    restart_count: overview.restart_count,
                    image: overview.image_id,
                    name: overview.name,
                    ip: overview.ip,
                    mac: overview.mac,
                    cpu: usage.cpu_percent,
                    memory: usage.memory_mb,
                    network: ContainerNetworkSample {
                        sent: usage.tx_bytes,
                        received: usage.rx_bytes,
                        networks: overview.networks,
                    },
                    logs,
                });
            }
            samples
        }
        Err(err) => {
            warn!(?err, "container listing failed");
            Vec::new()
        }
    };

    let images = match runtime.list_image_overviews().await {
        Ok(overviews) => overviews
            .into_iter()
            .map(|image| ImageSample {
                id: image.id,
                created: unix_to_rfc3339_nano(image.created_unix),
                size: image.size,
                tags: image.tags,
            })
            .collect(),
        Err(err) => {
            warn!(?err, "image listing failed");
            Vec::new()
        }
    };

    DockerTelemetry { containers, images }
}

fn unix_to_rfc3339_nano(unix: i64) -> String {
    DateTime::<Utc>::from_timestamp(unix, 0)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        .to_rfc3339_opts(SecondsFormat::Nanos, true)
}
