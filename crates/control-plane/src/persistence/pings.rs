use chrono::{DateTime, Utc};
use common::api::TelemetrySnapshot;
use sqlx::FromRow;
use uuid::Uuid;

use super::Db;
use crate::Result;

#[derive(Debug, Clone, FromRow)]
pub struct PingRecord {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub created: DateTime<Utc>,
}

/// Persists one telemetry snapshot: the agent's `last_ping`, the ping row,
/// and every metric child row, in a single transaction. Either the whole
/// snapshot lands or none of it does.
pub async fn record_snapshot(
    pool: &Db,
    agent_id: Uuid,
    snapshot: &TelemetrySnapshot,
) -> Result<Uuid> {
    let now = Utc::now();
    let ping_id = Uuid::new_v4();

    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE agents SET last_ping = ?2 WHERE id = ?1")
        .bind(agent_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    sqlx::query("INSERT INTO agent_pings (id, agent_id, created) VALUES (?1, ?2, ?3)")
        .bind(ping_id)
        .bind(agent_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    for cpu in &snapshot.metrics.cpu {
        sqlx::query(
            "INSERT INTO cpu_metrics (id, ping_id, cpu_name, usage_percent) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(Uuid::new_v4())
        .bind(ping_id)
        .bind(&cpu.name)
        .bind(cpu.usage)
        .execute(&mut *tx)
        .await?;
    }

    let memory = &snapshot.metrics.memory;
    sqlx::query(
        r#"
        INSERT INTO memory_metrics (id, ping_id, ram_total_mb, ram_usage_mb, swap_total_mb, swap_usage_mb)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(ping_id)
    .bind(memory.ram.total as i64)
    .bind(memory.ram.usage as i64)
    .bind(memory.swap.total as i64)
    .bind(memory.swap.usage as i64)
    .execute(&mut *tx)
    .await?;

    for disk in &snapshot.metrics.disk {
        sqlx::query(
            r#"
            INSERT INTO disk_metrics (id, ping_id, disk_name, read_bytes, write_bytes, reads, writes)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(ping_id)
        .bind(&disk.name)
        .bind(disk.read_bytes as i64)
        .bind(disk.write_bytes as i64)
        .bind(disk.reads as i64)
        .bind(disk.writes as i64)
        .execute(&mut *tx)
        .await?;
    }

    let network = &snapshot.metrics.network;
    sqlx::query(
        r#"
        INSERT INTO network_metrics (id, ping_id, public_ip, sent_bytes, received_bytes)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(ping_id)
    .bind(&network.public_ip)
    .bind(network.sent as i64)
    .bind(network.received as i64)
    .execute(&mut *tx)
    .await?;

    for container in &snapshot.docker.containers {
        let container_row_id = Uuid::new_v4();
        let created_at = container
            .created
            .parse::<DateTime<Utc>>()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        sqlx::query(
            r#"
            INSERT INTO containers (
                id, ping_id, container_id, name, image_id, status, restart_count,
                created_at, ip_address, mac_address, cpu_usage_percent,
                memory_usage_mb, network_sent_bytes, network_received_bytes
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(container_row_id)
        .bind(ping_id)
        .bind(&container.id)
        .bind(&container.name)
        .bind(&container.image)
        .bind(&container.status)
        .bind(container.restart_count)
        .bind(created_at)
        .bind(&container.ip)
        .bind(&container.mac)
        .bind(container.cpu)
        .bind(container.memory.map(|m| m as i64))
        .bind(container.network.sent.map(|b| b as i64))
        .bind(container.network.received.map(|b| b as i64))
        .execute(&mut *tx)
        .await?;

        for network_name in &container.network.networks {
            sqlx::query(
                "INSERT INTO container_networks (id, container_id, network_name) VALUES (?1, ?2, ?3)",
            )
            .bind(Uuid::new_v4())
            .bind(container_row_id)
            .bind(network_name)
            .execute(&mut *tx)
            .await?;
        }

        for line in &container.logs {
            // NUL bytes break TEXT storage; lines that are empty after
            // stripping carry no information.
            let clean = line.replace('\0', "");
            if clean.is_empty() {
                continue;
            }
            sqlx::query(
                "INSERT INTO container_logs (id, container_id, log_line, timestamp) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(Uuid::new_v4())
            .bind(container_row_id)
            .bind(&clean)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
    }

    for image in &snapshot.docker.images {
        let image_row_id = Uuid::new_v4();
        let created = image
            .created
            .parse::<DateTime<Utc>>()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        sqlx::query(
            "INSERT INTO images (id, ping_id, image_id, created, size) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(image_row_id)
        .bind(ping_id)
        .bind(&image.id)
        .bind(created)
        .bind(image.size)
        .execute(&mut *tx)
        .await?;

        for tag in &image.tags {
            sqlx::query("INSERT INTO image_tags (id, image_id, tag) VALUES (?1, ?2, ?3)")
                .bind(Uuid::new_v4())
                .bind(image_row_id)
                .bind(tag)
                .execute(&mut *tx)
                .await?;
        }
    }

    tx.commit().await?;

    Ok(ping_id)
}

/// Most recent public IP an agent has reported, if it ever pinged.
pub async fn latest_public_ip(pool: &Db, agent_id: Uuid) -> Result<Option<String>> {
    let ip: Option<String> = sqlx::query_scalar(
        r#"
        SELECT nm.public_ip
        FROM agents a
        JOIN agent_pings ap ON a.id = ap.agent_id
        JOIN network_metrics nm ON ap.id = nm.ping_id
        WHERE a.id = ?1
        ORDER BY ap.created DESC
        LIMIT 1
        "#,
    )
    .bind(agent_id)
    .fetch_optional(pool)
    .await?;

    Ok(ip)
}

pub async fn count_pings(pool: &Db, agent_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM agent_pings WHERE agent_id = ?1")
        .bind(agent_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}
