use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;

use crate::{app_state::AppState, auth, http};

/// Telemetry snapshots carry container logs; cap them well below anything
/// that could starve the ingest path.
const PING_BODY_LIMIT_BYTES: usize = 4 * 1024 * 1024;

/// Assembles the full API surface.
///
/// Two auth realms share the router: agent endpoints authenticate the bearer
/// token against the agents table inside the handler (the token identifies
/// the caller), while operator endpoints sit behind the JWT middleware.
pub fn build_router(state: AppState) -> Router<AppState> {
    let operator_routes = Router::<AppState>::new()
        .route(
            "/api/agents",
            get(http::agents::list_agents).post(http::agents::create_agent),
        )
        .route(
            "/api/agents/{id}",
            get(http::agents::get_agent)
                .put(http::agents::update_agent)
                .delete(http::agents::delete_agent),
        )
        .route(
            "/api/actions",
            get(http::actions::list_actions).post(http::actions::create_action),
        )
        .route(
            "/api/domains",
            get(http::domains::list_domains).post(http::domains::create_domain),
        )
        .route(
            "/api/domains/{id}",
            get(http::domains::get_domain)
                .put(http::domains::update_domain)
                .delete(http::domains::delete_domain),
        )
        .route("/api/domains/routes", post(http::domains::create_route))
        .route("/api/domains/{domain_id}/routes", get(http::domains::list_routes))
        .route(
            "/api/domains/routes/{id}",
            put(http::domains::update_route).delete(http::domains::delete_route),
        )
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_operator_auth,
        ));

    Router::<AppState>::new()
        .route("/healthz", get(http::healthz))
        .route(
            "/api/agent/ping",
            post(http::agent::agent_ping)
                .layer(RequestBodyLimitLayer::new(PING_BODY_LIMIT_BYTES)),
        )
        .route(
            "/api/actions/{id}/status",
            put(http::agent::update_action_status),
        )
        .route("/api/domains/public", get(http::domains::public_feed))
        .merge(operator_routes)
}
