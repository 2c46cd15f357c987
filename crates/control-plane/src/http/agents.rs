//! Operator CRUD over agents.

use super::*;
use crate::persistence::agents as agent_store;
use rand::RngCore;

#[derive(Debug, Deserialize)]
pub(crate) struct CreateAgentRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateAgentRequest {
    pub name: Option<String>,
    pub is_active: Option<bool>,
}

/// Response for agent creation; the only place the token is ever returned.
#[derive(Debug, Serialize)]
pub(crate) struct CreatedAgentResponse {
    pub id: Uuid,
    pub name: String,
    pub token: String,
    pub is_active: bool,
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub(crate) async fn list_agents(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<agent_store::AgentRecord>>> {
    let agents = agent_store::list_agents(&state.db).await?;
    Ok(Json(agents))
}

pub(crate) async fn create_agent(
    State(state): State<AppState>,
    Json(req): Json<CreateAgentRequest>,
) -> ApiResult<(StatusCode, Json<CreatedAgentResponse>)> {
    if req.name.trim().is_empty() {
        return Err(AppError::bad_request("Name is required"));
    }

    let token = generate_token();
    let agent = agent_store::create_agent(
        &state.db,
        agent_store::NewAgent {
            id: Uuid::new_v4(),
            name: req.name.trim().to_string(),
            token: token.clone(),
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedAgentResponse {
            id: agent.id,
            name: agent.name,
            token,
            is_active: agent.is_active,
        }),
    ))
}

pub(crate) async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<agent_store::AgentRecord>> {
    let agent = agent_store::get_agent(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Agent not found"))?;
    Ok(Json(agent))
}

pub(crate) async fn update_agent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAgentRequest>,
) -> ApiResult<Json<agent_store::AgentRecord>> {
    let agent = agent_store::update_agent(&state.db, id, req.name, req.is_active)
        .await?
        .ok_or_else(|| AppError::not_found("Agent not found"))?;
    Ok(Json(agent))
}

pub(crate) async fn delete_agent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<OkResponse>)> {
    let deleted = agent_store::delete_agent(&state.db, id).await?;
    if deleted == 0 {
        return Err(AppError::not_found("Agent not found"));
    }
    Ok((StatusCode::OK, Json(OkResponse { ok: true })))
}
