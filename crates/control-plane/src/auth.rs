use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::{
    app_state::AppState,
    error::{ApiResult, AppError},
    persistence::{agents, AgentRecord},
};

/// Claims the external login service puts into operator JWTs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorClaims {
    /// Operator user id.
    pub sub: String,
    /// Username for audit logs.
    pub username: String,
    /// Role string; the Core only requires a valid token, roles are for the UI.
    #[serde(default)]
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

pub fn extract_bearer(headers: &HeaderMap) -> ApiResult<String> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::unauthorized("Authorization header required"))?;

    let value = value
        .to_str()
        .map_err(|_| AppError::unauthorized("Invalid authorization header format"))?;

    let prefix = "Bearer ";
    if !value.starts_with(prefix) {
        return Err(AppError::unauthorized("Invalid authorization header format"));
    }

    Ok(value[prefix.len()..].to_string())
}

/// Resolves the bearer token on an agent-realm request to an active agent.
pub async fn authenticate_agent(state: &AppState, headers: &HeaderMap) -> ApiResult<AgentRecord> {
    let token = extract_bearer(headers)?;

    agents::find_active_agent_by_token(&state.db, &token)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::unauthorized("Invalid agent token"))
}

pub fn verify_operator_token(secret: &str, token: &str) -> ApiResult<OperatorClaims> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let data = decode::<OperatorClaims>(token, &key, &Validation::default())
        .map_err(|_| AppError::unauthorized("Invalid operator token"))?;

    Ok(data.claims)
}

/// Middleware guarding the operator realm with JWT bearer auth.
pub async fn require_operator_auth(
    State(state): State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> ApiResult<axum::response::Response> {
    let token = extract_bearer(req.headers())?;
    let claims = verify_operator_token(&state.jwt_secret, &token)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
