use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    app_state::AppState,
    auth,
    error::{ApiResult, AppError},
    persistence::actions::ActionFilter,
    services,
};
use common::api::{ActionAck, ActionEnvelope, ActionType, PublicDomainFeed, TelemetrySnapshot};

pub mod actions;
pub mod agent;
pub mod agents;
pub mod domains;

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

pub(crate) async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "time": chrono::Utc::now(),
    }))
}
