//! Agent-realm endpoints: the ping channel and the action ack.

use super::*;

/// `POST /api/agent/ping` — authenticates the bearer token, persists the
/// snapshot, and returns the agent's pending action queue.
pub(crate) async fn agent_ping(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(snapshot): Json<TelemetrySnapshot>,
) -> ApiResult<Json<Vec<ActionEnvelope>>> {
    let agent = auth::authenticate_agent(&state, &headers).await?;
    let pending = services::ingest::ingest_ping(&state, agent.id, &agent.name, snapshot).await?;
    Ok(Json(pending))
}

/// `PUT /api/actions/{id}/status` — terminal ack from the executing agent.
pub(crate) async fn update_action_status(
    State(state): State<AppState>,
    Path(action_id): Path<Uuid>,
    headers: HeaderMap,
    Json(ack): Json<ActionAck>,
) -> ApiResult<(StatusCode, Json<OkResponse>)> {
    let agent = auth::authenticate_agent(&state, &headers).await?;
    services::actions::apply_agent_ack(&state, agent.id, action_id, ack).await?;
    Ok((StatusCode::OK, Json(OkResponse { ok: true })))
}
