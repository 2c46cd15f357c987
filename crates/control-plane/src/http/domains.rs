//! Operator domain/route endpoints plus the unauthenticated edge feed.

use super::*;
use crate::services::domains::{
    CreateDomainRequest, CreateDomainRouteRequest, DomainDetail, UpdateDomainRequest,
    UpdateDomainRouteRequest,
};
use crate::persistence::{DomainRecord, DomainRouteRecord};

#[derive(Debug, Serialize)]
pub(crate) struct DomainListResponse {
    pub domains: Vec<DomainDetail>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct RouteListResponse {
    pub routes: Vec<DomainRouteRecord>,
    pub total: usize,
}

pub(crate) async fn list_domains(
    State(state): State<AppState>,
) -> ApiResult<Json<DomainListResponse>> {
    let domains = services::domains::list_domain_details(&state).await?;
    let total = domains.len();
    Ok(Json(DomainListResponse { domains, total }))
}

pub(crate) async fn create_domain(
    State(state): State<AppState>,
    Json(req): Json<CreateDomainRequest>,
) -> ApiResult<(StatusCode, Json<DomainRecord>)> {
    let domain = services::domains::create_domain(&state, req).await?;
    Ok((StatusCode::CREATED, Json(domain)))
}

pub(crate) async fn get_domain(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DomainDetail>> {
    let detail = services::domains::get_domain_detail(&state, id).await?;
    Ok(Json(detail))
}

pub(crate) async fn update_domain(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateDomainRequest>,
) -> ApiResult<Json<DomainRecord>> {
    let domain = services::domains::update_domain(&state, id, req).await?;
    Ok(Json(domain))
}

pub(crate) async fn delete_domain(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<OkResponse>)> {
    services::domains::delete_domain(&state, id).await?;
    Ok((StatusCode::OK, Json(OkResponse { ok: true })))
}

pub(crate) async fn create_route(
    State(state): State<AppState>,
    Json(req): Json<CreateDomainRouteRequest>,
) -> ApiResult<(StatusCode, Json<DomainRouteRecord>)> {
    let route = services::domains::create_route(&state, req).await?;
    Ok((StatusCode::CREATED, Json(route)))
}

pub(crate) async fn list_routes(
    State(state): State<AppState>,
    Path(domain_id): Path<Uuid>,
) -> ApiResult<Json<RouteListResponse>> {
    let routes = services::domains::list_routes(&state, domain_id).await?;
    let total = routes.len();
    Ok(Json(RouteListResponse { routes, total }))
}

pub(crate) async fn update_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateDomainRouteRequest>,
) -> ApiResult<Json<DomainRouteRecord>> {
    let route = services::domains::update_route(&state, id, req).await?;
    Ok(Json(route))
}

pub(crate) async fn delete_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<OkResponse>)> {
    services::domains::delete_route(&state, id).await?;
    Ok((StatusCode::OK, Json(OkResponse { ok: true })))
}

/// `GET /api/domains/public` — unauthenticated by design; exposes no secrets.
pub(crate) async fn public_feed(
    State(state): State<AppState>,
) -> ApiResult<Json<PublicDomainFeed>> {
    let feed = services::domains::public_feed(&state).await?;
    Ok(Json(feed))
}
