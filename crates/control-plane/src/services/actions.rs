use common::api::{ActionAck, ActionEnvelope, ActionType};
use uuid::Uuid;

use crate::{
    app_state::AppState,
    error::{ApiResult, AppError},
    persistence::{
        actions::{self, ActionFilter, NewAction},
        agents,
    },
    telemetry,
};

/// Enqueues one action for an active agent (operator path).
pub async fn enqueue(
    state: &AppState,
    agent_id: Uuid,
    action_type: ActionType,
    payload: serde_json::Value,
) -> ApiResult<ActionEnvelope> {
    let agent = agents::get_agent(&state.db, agent_id).await?;
    if !agent.map(|a| a.is_active).unwrap_or(false) {
        return Err(AppError::not_found("Agent not found"));
    }

    let record =
        actions::insert_action(&state.db, NewAction::new(agent_id, action_type, payload)).await?;
    telemetry::record_action_enqueued(&record.action_type);

    Ok(record.into_envelope())
}

pub async fn list(state: &AppState, filter: ActionFilter) -> ApiResult<Vec<ActionEnvelope>> {
    let records = actions::list_actions(&state.db, filter).await?;
    Ok(records.into_iter().map(|r| r.into_envelope()).collect())
}

/// Applies an agent's ack to the action state machine.
///
/// The caller is the authenticated agent; the ownership check is what keeps a
/// compromised agent from acknowledging another host's work.
pub async fn apply_agent_ack(
    state: &AppState,
    caller_agent_id: Uuid,
    action_id: Uuid,
    ack: ActionAck,
) -> ApiResult<()> {
    if !ack.status.is_terminal() {
        return Err(AppError::bad_request("Status must be completed or failed"));
    }

    let action = actions::get_action(&state.db, action_id)
        .await?
        .ok_or_else(|| AppError::not_found("Action not found"))?;

    if action.agent_id != caller_agent_id {
        return Err(AppError::forbidden("Action does not belong to this agent"));
    }

    let outcome = actions::apply_ack(
        &state.db,
        action_id,
        ack.status,
        ack.response.as_deref(),
        ack.error.as_deref(),
    )
    .await?;

    if outcome == actions::AckOutcome::Transitioned {
        telemetry::record_action_transition(ack.status.as_str());
    }

    Ok(())
}
