use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::Db;
use crate::Result;

#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct AgentRecord {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub is_active: bool,
    pub created: DateTime<Utc>,
    pub last_ping: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewAgent {
    pub id: Uuid,
    pub name: String,
    pub token: String,
}

const AGENT_COLUMNS: &str = "id, name, token, is_active, created, last_ping";

pub async fn create_agent(pool: &Db, new_agent: NewAgent) -> Result<AgentRecord> {
    sqlx::query(
        r#"
        INSERT INTO agents (id, name, token, is_active, created)
        VALUES (?1, ?2, ?3, 1, ?4)
        "#,
    )
    .bind(new_agent.id)
    .bind(&new_agent.name)
    .bind(&new_agent.token)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    get_agent(pool, new_agent.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("agent insert did not return row"))
}

pub async fn get_agent(pool: &Db, id: Uuid) -> Result<Option<AgentRecord>> {
    let record = sqlx::query_as::<_, AgentRecord>(&format!(
        "SELECT {AGENT_COLUMNS} FROM agents WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Looks up the agent a bearer token belongs to. Only active agents match.
pub async fn find_active_agent_by_token(pool: &Db, token: &str) -> Result<Option<AgentRecord>> {
    let record = sqlx::query_as::<_, AgentRecord>(&format!(
        "SELECT {AGENT_COLUMNS} FROM agents WHERE token = ?1 AND is_active = 1"
    ))
    .bind(token)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

pub async fn list_agents(pool: &Db) -> Result<Vec<AgentRecord>> {
    let records = sqlx::query_as::<_, AgentRecord>(&format!(
        "SELECT {AGENT_COLUMNS} FROM agents ORDER BY created ASC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(records)
}

pub async fn update_agent(
    pool: &Db,
    id: Uuid,
    name: Option<String>,
    is_active: Option<bool>,
) -> Result<Option<AgentRecord>> {
    let Some(current) = get_agent(pool, id).await? else {
        return Ok(None);
    };

    let name = name.unwrap_or(current.name);
    let is_active = is_active.unwrap_or(current.is_active);

    sqlx::query("UPDATE agents SET name = ?2, is_active = ?3 WHERE id = ?1")
        .bind(id)
        .bind(&name)
        .bind(is_active)
        .execute(pool)
        .await?;

    get_agent(pool, id).await
}

pub async fn delete_agent(pool: &Db, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM agents WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Active agents that have never pinged or whose last ping predates `stale_before`.
pub async fn find_stale_active_agents(
    pool: &Db,
    stale_before: DateTime<Utc>,
) -> Result<Vec<AgentRecord>> {
    let records = sqlx::query_as::<_, AgentRecord>(&format!(
        r#"
        SELECT {AGENT_COLUMNS}
        FROM agents
        WHERE is_active = 1 AND (last_ping IS NULL OR last_ping < ?1)
        ORDER BY created ASC
        "#
    ))
    .bind(stale_before)
    .fetch_all(pool)
    .await?;

    Ok(records)
}
