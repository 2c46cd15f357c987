//! Operator endpoints for direct action enqueue and inspection.

use super::*;

#[derive(Debug, Deserialize)]
pub(crate) struct CreateActionRequest {
    pub agent_id: Uuid,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ActionListParams {
    pub agent_id: Option<Uuid>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub action_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ActionListResponse {
    pub actions: Vec<ActionEnvelope>,
    pub total: usize,
}

pub(crate) async fn create_action(
    State(state): State<AppState>,
    Json(req): Json<CreateActionRequest>,
) -> ApiResult<(StatusCode, Json<ActionEnvelope>)> {
    let payload = if req.payload.is_null() {
        serde_json::json!({})
    } else {
        req.payload
    };

    let envelope =
        services::actions::enqueue(&state, req.agent_id, req.action_type, payload).await?;
    Ok((StatusCode::CREATED, Json(envelope)))
}

pub(crate) async fn list_actions(
    State(state): State<AppState>,
    Query(params): Query<ActionListParams>,
) -> ApiResult<Json<ActionListResponse>> {
    let actions = services::actions::list(
        &state,
        ActionFilter {
            agent_id: params.agent_id,
            status: params.status,
            action_type: params.action_type,
        },
    )
    .await?;

    let total = actions.len();
    Ok(Json(ActionListResponse { actions, total }))
}
