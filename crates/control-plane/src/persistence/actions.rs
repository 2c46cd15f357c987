use chrono::{DateTime, Utc};
use common::api::{ActionEnvelope, ActionStatus, ActionType};
use sqlx::types::Json;
use sqlx::{FromRow, QueryBuilder, Sqlite};
use uuid::Uuid;

use super::Db;
use crate::Result;

#[derive(Debug, Clone, FromRow)]
pub struct ActionRecord {
    pub id: Uuid,
    pub agent_id: Uuid,
    #[sqlx(rename = "type")]
    pub action_type: String,
    pub payload: Json<serde_json::Value>,
    pub status: String,
    pub created: DateTime<Utc>,
    pub completed: Option<DateTime<Utc>>,
    pub response: Option<String>,
    pub error: Option<String>,
}

impl ActionRecord {
    pub fn into_envelope(self) -> ActionEnvelope {
        ActionEnvelope {
            id: self.id,
            agent_id: self.agent_id,
            action_type: ActionType::from(self.action_type),
            payload: self.payload.0,
            status: parse_status(&self.status),
            created: self.created,
            completed: self.completed,
            response: self.response,
            error: self.error,
        }
    }
}

fn parse_status(raw: &str) -> ActionStatus {
    match raw {
        "completed" => ActionStatus::Completed,
        "failed" => ActionStatus::Failed,
        _ => ActionStatus::Pending,
    }
}

#[derive(Debug, Clone)]
pub struct NewAction {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub action_type: ActionType,
    pub payload: serde_json::Value,
}

impl NewAction {
    pub fn new(agent_id: Uuid, action_type: ActionType, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id,
            action_type,
            payload,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActionFilter {
    pub agent_id: Option<Uuid>,
    pub status: Option<String>,
    pub action_type: Option<String>,
}

const ACTION_COLUMNS: &str =
    "id, agent_id, type, payload, status, created, completed, response, error";

pub async fn insert_action(pool: &Db, new_action: NewAction) -> Result<ActionRecord> {
    let mut tx = pool.begin().await?;
    insert_action_tx(&mut tx, &new_action).await?;
    tx.commit().await?;

    get_action(pool, new_action.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("action insert did not return row"))
}

/// Transaction-scoped insert used by the domain outbox.
pub async fn insert_action_tx(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    new_action: &NewAction,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO actions (id, agent_id, type, payload, status, created)
        VALUES (?1, ?2, ?3, ?4, 'pending', ?5)
        "#,
    )
    .bind(new_action.id)
    .bind(new_action.agent_id)
    .bind(new_action.action_type.as_str())
    .bind(Json(&new_action.payload))
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn get_action(pool: &Db, id: Uuid) -> Result<Option<ActionRecord>> {
    let record = sqlx::query_as::<_, ActionRecord>(&format!(
        "SELECT {ACTION_COLUMNS} FROM actions WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Pending actions for one agent, oldest first. The id tiebreak keeps the
/// order stable when several actions share a timestamp.
pub async fn list_pending_for_agent(pool: &Db, agent_id: Uuid) -> Result<Vec<ActionRecord>> {
    let records = sqlx::query_as::<_, ActionRecord>(&format!(
        r#"
        SELECT {ACTION_COLUMNS}
        FROM actions
        WHERE agent_id = ?1 AND status = 'pending'
        ORDER BY created ASC, id ASC
        "#
    ))
    .bind(agent_id)
    .fetch_all(pool)
    .await?;

    Ok(records)
}

pub async fn list_actions(pool: &Db, filter: ActionFilter) -> Result<Vec<ActionRecord>> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {ACTION_COLUMNS} FROM actions WHERE 1=1"
    ));

    if let Some(agent_id) = filter.agent_id {
        qb.push(" AND agent_id = ");
        qb.push_bind(agent_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ");
        qb.push_bind(status);
    }
    if let Some(action_type) = filter.action_type {
        qb.push(" AND type = ");
        qb.push_bind(action_type);
    }

    qb.push(" ORDER BY created DESC, id DESC");

    let records = qb.build_query_as::<ActionRecord>().fetch_all(pool).await?;
    Ok(records)
}

/// Outcome of an ack against the action state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// pending -> terminal transition happened.
    Transitioned,
    /// The action was already terminal; nothing changed.
    AlreadyTerminal,
}

/// Applies a terminal ack. The guard on `status = 'pending'` makes
/// re-delivered acks no-ops: terminal rows keep their original `completed`
/// timestamp and result, and nothing can revive an action to pending.
pub async fn apply_ack(
    pool: &Db,
    id: Uuid,
    status: ActionStatus,
    response: Option<&str>,
    error: Option<&str>,
) -> Result<AckOutcome> {
    let completed = if status.is_terminal() {
        Some(Utc::now())
    } else {
        None
    };

    let result = sqlx::query(
        r#"
        UPDATE actions
        SET status = ?2, completed = ?3, response = ?4, error = ?5
        WHERE id = ?1 AND status = 'pending'
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .bind(completed)
    .bind(response)
    .bind(error)
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        Ok(AckOutcome::Transitioned)
    } else {
        Ok(AckOutcome::AlreadyTerminal)
    }
}
