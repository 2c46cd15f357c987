use chrono::{DateTime, Utc};
use sqlx::{FromRow, Sqlite, Transaction};
use uuid::Uuid;

use super::Db;
use crate::Result;

#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct DomainRecord {
    pub id: Uuid,
    pub name: String,
    pub agent_id: Uuid,
    pub agent_ip: String,
    pub is_active: bool,
    pub ssl_enabled: bool,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct DomainRouteRecord {
    pub id: Uuid,
    pub domain_id: Uuid,
    pub container_name: String,
    pub port: String,
    pub path: String,
    pub is_active: bool,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDomain {
    pub id: Uuid,
    pub name: String,
    pub agent_id: Uuid,
    pub agent_ip: String,
    pub ssl_enabled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UpdatedDomain {
    pub name: Option<String>,
    pub agent_id: Option<Uuid>,
    pub agent_ip: Option<String>,
    pub is_active: Option<bool>,
    pub ssl_enabled: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewDomainRoute {
    pub id: Uuid,
    pub domain_id: Uuid,
    pub container_name: String,
    pub port: String,
    pub path: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdatedDomainRoute {
    pub container_name: Option<String>,
    pub port: Option<String>,
    pub path: Option<String>,
    pub is_active: Option<bool>,
}

const DOMAIN_COLUMNS: &str = "id, name, agent_id, agent_ip, is_active, ssl_enabled, created, updated";
const ROUTE_COLUMNS: &str =
    "id, domain_id, container_name, port, path, is_active, created, updated";

pub async fn create_domain_tx(tx: &mut Transaction<'_, Sqlite>, new: &NewDomain) -> Result<()> {
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO domains (id, name, agent_id, agent_ip, is_active, ssl_enabled, created, updated)
        VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?6)
        "#,
    )
    .bind(new.id)
    .bind(&new.name)
    .bind(new.agent_id)
    .bind(&new.agent_ip)
    .bind(new.ssl_enabled)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn get_domain(pool: &Db, id: Uuid) -> Result<Option<DomainRecord>> {
    let record = sqlx::query_as::<_, DomainRecord>(&format!(
        "SELECT {DOMAIN_COLUMNS} FROM domains WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

pub async fn get_domain_tx(
    tx: &mut Transaction<'_, Sqlite>,
    id: Uuid,
) -> Result<Option<DomainRecord>> {
    let record = sqlx::query_as::<_, DomainRecord>(&format!(
        "SELECT {DOMAIN_COLUMNS} FROM domains WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(record)
}

pub async fn list_domains(pool: &Db) -> Result<Vec<DomainRecord>> {
    let records = sqlx::query_as::<_, DomainRecord>(&format!(
        "SELECT {DOMAIN_COLUMNS} FROM domains ORDER BY created DESC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(records)
}

pub async fn list_active_domains(pool: &Db) -> Result<Vec<DomainRecord>> {
    let records = sqlx::query_as::<_, DomainRecord>(&format!(
        "SELECT {DOMAIN_COLUMNS} FROM domains WHERE is_active = 1 ORDER BY name ASC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(records)
}

pub async fn update_domain_tx(
    tx: &mut Transaction<'_, Sqlite>,
    id: Uuid,
    update: &UpdatedDomain,
) -> Result<Option<DomainRecord>> {
    let Some(current) = get_domain_tx(tx, id).await? else {
        return Ok(None);
    };

    let name = update.name.clone().unwrap_or(current.name);
    let agent_id = update.agent_id.unwrap_or(current.agent_id);
    let agent_ip = update.agent_ip.clone().unwrap_or(current.agent_ip);
    let is_active = update.is_active.unwrap_or(current.is_active);
    let ssl_enabled = update.ssl_enabled.unwrap_or(current.ssl_enabled);

    sqlx::query(
        r#"
        UPDATE domains
        SET name = ?2, agent_id = ?3, agent_ip = ?4, is_active = ?5, ssl_enabled = ?6, updated = ?7
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(&name)
    .bind(agent_id)
    .bind(&agent_ip)
    .bind(is_active)
    .bind(ssl_enabled)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;

    get_domain_tx(tx, id).await
}

pub async fn delete_domain(pool: &Db, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM domains WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

pub async fn create_route_tx(tx: &mut Transaction<'_, Sqlite>, new: &NewDomainRoute) -> Result<()> {
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO domain_routes (id, domain_id, container_name, port, path, is_active, created, updated)
        VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)
        "#,
    )
    .bind(new.id)
    .bind(new.domain_id)
    .bind(&new.container_name)
    .bind(&new.port)
    .bind(&new.path)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn get_route(pool: &Db, id: Uuid) -> Result<Option<DomainRouteRecord>> {
    let record = sqlx::query_as::<_, DomainRouteRecord>(&format!(
        "SELECT {ROUTE_COLUMNS} FROM domain_routes WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

pub async fn get_route_tx(
    tx: &mut Transaction<'_, Sqlite>,
    id: Uuid,
) -> Result<Option<DomainRouteRecord>> {
    let record = sqlx::query_as::<_, DomainRouteRecord>(&format!(
        "SELECT {ROUTE_COLUMNS} FROM domain_routes WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(record)
}

pub async fn list_routes_for_domain(pool: &Db, domain_id: Uuid) -> Result<Vec<DomainRouteRecord>> {
    let records = sqlx::query_as::<_, DomainRouteRecord>(&format!(
        "SELECT {ROUTE_COLUMNS} FROM domain_routes WHERE domain_id = ?1 ORDER BY path ASC"
    ))
    .bind(domain_id)
    .fetch_all(pool)
    .await?;

    Ok(records)
}

/// Active routes ordered by path; the shape the nginx action payload wants.
pub async fn active_routes_for_domain_tx(
    tx: &mut Transaction<'_, Sqlite>,
    domain_id: Uuid,
) -> Result<Vec<DomainRouteRecord>> {
    let records = sqlx::query_as::<_, DomainRouteRecord>(&format!(
        r#"
        SELECT {ROUTE_COLUMNS}
        FROM domain_routes
        WHERE domain_id = ?1 AND is_active = 1
        ORDER BY path ASC
        "#
    ))
    .bind(domain_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(records)
}

pub async fn update_route_tx(
    tx: &mut Transaction<'_, Sqlite>,
    id: Uuid,
    update: &UpdatedDomainRoute,
) -> Result<Option<DomainRouteRecord>> {
    let Some(current) = get_route_tx(tx, id).await? else {
        return Ok(None);
    };

    let container_name = update.container_name.clone().unwrap_or(current.container_name);
    let port = update.port.clone().unwrap_or(current.port);
    let path = update.path.clone().unwrap_or(current.path);
    let is_active = update.is_active.unwrap_or(current.is_active);

    sqlx::query(
        r#"
        UPDATE domain_routes
        SET container_name = ?2, port = ?3, path = ?4, is_active = ?5, updated = ?6
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(&container_name)
    .bind(&port)
    .bind(&path)
    .bind(is_active)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;

    get_route_tx(tx, id).await
}

pub async fn delete_route_tx(tx: &mut Transaction<'_, Sqlite>, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM domain_routes WHERE id = ?1")
        .bind(id)
        .execute(&mut **tx)
        .await?;

    Ok(result.rows_affected())
}
