use common::api::{
    ActionType, NginxRoutePayload, PublicDomain, PublicDomainFeed, PublicRoute,
    UpdateNginxConfigPayload,
};
use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

use crate::{
    app_state::AppState,
    error::{ApiResult, AppError},
    persistence::{
        actions::{self, NewAction},
        agents, domains, pings, DomainRecord, DomainRouteRecord, NewDomain, NewDomainRoute,
        UpdatedDomain, UpdatedDomainRoute,
    },
    telemetry,
};

#[derive(Debug, Clone, serde::Deserialize)]
pub struct CreateDomainRequest {
    pub name: String,
    pub agent_id: Uuid,
    #[serde(default)]
    pub ssl_enabled: bool,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct UpdateDomainRequest {
    pub name: Option<String>,
    pub agent_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub ssl_enabled: Option<bool>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct CreateDomainRouteRequest {
    pub domain_id: Uuid,
    pub container_name: String,
    pub port: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct UpdateDomainRouteRequest {
    pub container_name: Option<String>,
    pub port: Option<String>,
    pub path: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DomainDetail {
    #[serde(flatten)]
    pub domain: DomainRecord,
    pub routes: Vec<DomainRouteRecord>,
}

/// Snapshots the agent's last reported public IP for a new or re-homed
/// domain. Creation fails loudly when the agent has never pinged; an empty
/// IP must never reach the edge feed.
async fn snapshot_agent_ip(state: &AppState, agent_id: Uuid) -> ApiResult<String> {
    if agents::get_agent(&state.db, agent_id).await?.is_none() {
        return Err(AppError::not_found("Agent not found"));
    }

    pings::latest_public_ip(&state.db, agent_id)
        .await?
        .ok_or_else(|| {
            AppError::bad_request("Agent has no recorded public IP; wait for its first ping")
        })
}

/// Builds and inserts the `update_nginx_config` outbox action from the
/// post-mutation state, inside the mutation's transaction.
async fn enqueue_nginx_update_tx(
    tx: &mut Transaction<'_, Sqlite>,
    domain_id: Uuid,
) -> crate::Result<()> {
    let Some(domain) = domains::get_domain_tx(tx, domain_id).await? else {
        // Domain deletions drop the routes too; nothing left to sync.
        return Ok(());
    };

    let routes = domains::active_routes_for_domain_tx(tx, domain_id)
        .await?
        .into_iter()
        .map(|r| NginxRoutePayload {
            path: r.path,
            container_name: r.container_name,
            port: r.port,
        })
        .collect();

    let payload = UpdateNginxConfigPayload {
        domain: domain.name,
        ssl_enabled: domain.ssl_enabled,
        routes,
    };

    let action = NewAction::new(
        domain.agent_id,
        ActionType::UpdateNginxConfig,
        serde_json::to_value(payload)?,
    );
    actions::insert_action_tx(tx, &action).await?;
    telemetry::record_action_enqueued(action.action_type.as_str());

    Ok(())
}

pub async fn create_domain(
    state: &AppState,
    req: CreateDomainRequest,
) -> ApiResult<DomainRecord> {
    if req.name.trim().is_empty() {
        return Err(AppError::bad_request("Name is required"));
    }

    let agent_ip = snapshot_agent_ip(state, req.agent_id).await?;
    let id = Uuid::new_v4();

    let mut tx = state.db.begin().await.map_err(anyhow::Error::from)?;
    domains::create_domain_tx(
        &mut tx,
        &NewDomain {
            id,
            name: req.name.trim().to_string(),
            agent_id: req.agent_id,
            agent_ip,
            ssl_enabled: req.ssl_enabled,
        },
    )
    .await
    .map_err(|err| map_unique_violation(err, "Domain with this name already exists"))?;
    enqueue_nginx_update_tx(&mut tx, id).await?;
    tx.commit().await.map_err(anyhow::Error::from)?;

    domains::get_domain(&state.db, id)
        .await?
        .ok_or_else(|| AppError::internal("domain vanished after insert"))
}

pub async fn get_domain_detail(state: &AppState, id: Uuid) -> ApiResult<DomainDetail> {
    let domain = domains::get_domain(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Domain not found"))?;
    let routes = domains::list_routes_for_domain(&state.db, id).await?;

    Ok(DomainDetail { domain, routes })
}

pub async fn list_domain_details(state: &AppState) -> ApiResult<Vec<DomainDetail>> {
    let mut details = Vec::new();
    for domain in domains::list_domains(&state.db).await? {
        let routes = domains::list_routes_for_domain(&state.db, domain.id).await?;
        details.push(DomainDetail { domain, routes });
    }
    Ok(details)
}

pub async fn update_domain(
    state: &AppState,
    id: Uuid,
    req: UpdateDomainRequest,
) -> ApiResult<DomainRecord> {
    // Re-homing a domain re-snapshots the new agent's IP, same rule as create.
    let agent_ip = match req.agent_id {
        Some(agent_id) => Some(snapshot_agent_ip(state, agent_id).await?),
        None => None,
    };
    let ssl_changed = req.ssl_enabled.is_some();

    let mut tx = state.db.begin().await.map_err(anyhow::Error::from)?;
    let updated = domains::update_domain_tx(
        &mut tx,
        id,
        &UpdatedDomain {
            name: req.name,
            agent_id: req.agent_id,
            agent_ip,
            is_active: req.is_active,
            ssl_enabled: req.ssl_enabled,
        },
    )
    .await
    .map_err(|err| map_unique_violation(err, "Domain with this name already exists"))?
    .ok_or_else(|| AppError::not_found("Domain not found"))?;

    if ssl_changed {
        enqueue_nginx_update_tx(&mut tx, id).await?;
    }
    tx.commit().await.map_err(anyhow::Error::from)?;

    Ok(updated)
}

pub async fn delete_domain(state: &AppState, id: Uuid) -> ApiResult<()> {
    let deleted = domains::delete_domain(&state.db, id).await?;
    if deleted == 0 {
        return Err(AppError::not_found("Domain not found"));
    }
    Ok(())
}

pub async fn create_route(
    state: &AppState,
    req: CreateDomainRouteRequest,
) -> ApiResult<DomainRouteRecord> {
    if req.container_name.trim().is_empty() || req.port.trim().is_empty() {
        return Err(AppError::bad_request("Container name and port are required"));
    }
    let path = if req.path.trim().is_empty() {
        "/".to_string()
    } else {
        req.path.trim().to_string()
    };

    if domains::get_domain(&state.db, req.domain_id).await?.is_none() {
        return Err(AppError::not_found("Domain not found"));
    }

    let id = Uuid::new_v4();
    let mut tx = state.db.begin().await.map_err(anyhow::Error::from)?;
    domains::create_route_tx(
        &mut tx,
        &NewDomainRoute {
            id,
            domain_id: req.domain_id,
            container_name: req.container_name.trim().to_string(),
            port: req.port.trim().to_string(),
            path,
        },
    )
    .await
    .map_err(|err| map_unique_violation(err, "Route with this path already exists"))?;
    enqueue_nginx_update_tx(&mut tx, req.domain_id).await?;
    tx.commit().await.map_err(anyhow::Error::from)?;

    domains::get_route(&state.db, id)
        .await?
        .ok_or_else(|| AppError::internal("route vanished after insert"))
}

pub async fn list_routes(state: &AppState, domain_id: Uuid) -> ApiResult<Vec<DomainRouteRecord>> {
    if domains::get_domain(&state.db, domain_id).await?.is_none() {
        return Err(AppError::not_found("Domain not found"));
    }
    Ok(domains::list_routes_for_domain(&state.db, domain_id).await?)
}

pub async fn update_route(
    state: &AppState,
    id: Uuid,
    req: UpdateDomainRouteRequest,
) -> ApiResult<DomainRouteRecord> {
    let mut tx = state.db.begin().await.map_err(anyhow::Error::from)?;
    let updated = domains::update_route_tx(
        &mut tx,
        id,
        &UpdatedDomainRoute {
            container_name: req.container_name,
            port: req.port,
            path: req.path,
            is_active: req.is_active,
        },
    )
    .await
    .map_err(|err| map_unique_violation(err, "Route with this path already exists"))?
    .ok_or_else(|| AppError::not_found("Route not found"))?;

    enqueue_nginx_update_tx(&mut tx, updated.domain_id).await?;
    tx.commit().await.map_err(anyhow::Error::from)?;

    Ok(updated)
}

pub async fn delete_route(state: &AppState, id: Uuid) -> ApiResult<()> {
    let route = domains::get_route(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Route not found"))?;

    let mut tx = state.db.begin().await.map_err(anyhow::Error::from)?;
    domains::delete_route_tx(&mut tx, id).await?;
    enqueue_nginx_update_tx(&mut tx, route.domain_id).await?;
    tx.commit().await.map_err(anyhow::Error::from)?;

    Ok(())
}

/// Routing feed the edge proxy polls. Unauthenticated, secrets-free.
pub async fn public_feed(state: &AppState) -> ApiResult<PublicDomainFeed> {
    let mut feed_domains = Vec::new();
    for domain in domains::list_active_domains(&state.db).await? {
        let routes = domains::list_routes_for_domain(&state.db, domain.id)
            .await?
            .into_iter()
            .map(|r| PublicRoute {
                path: r.path,
                container_name: r.container_name,
                port: r.port,
                is_active: r.is_active,
            })
            .collect();

        feed_domains.push(PublicDomain {
            id: domain.id,
            name: domain.name,
            agent_ip: domain.agent_ip,
            ssl_enabled: domain.ssl_enabled,
            routes,
        });
    }

    let total = feed_domains.len();
    Ok(PublicDomainFeed {
        domains: feed_domains,
        total,
    })
}

fn map_unique_violation(err: anyhow::Error, message: &str) -> AppError {
    let is_unique = err
        .downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .map(|db| db.is_unique_violation())
        .unwrap_or(false);

    if is_unique {
        AppError::bad_request(message)
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NotificationConfig, WatcherConfig};
    use crate::notify::LogNotifier;
    use crate::persistence::migrations;
    use crate::persistence::actions::ActionFilter;
    use common::api::TelemetrySnapshot;
    use std::sync::Arc;

    async fn test_state() -> AppState {
        let pool = migrations::init_pool("sqlite::memory:").await.expect("pool");
        migrations::run_migrations(&pool).await.expect("migrations");
        AppState {
            db: pool,
            jwt_secret: "test-secret".into(),
            notifier: Arc::new(LogNotifier),
            thresholds: NotificationConfig {
                cpu_threshold: 80.0,
                ram_threshold: 80.0,
            },
            watcher: WatcherConfig {
                sweep_interval_secs: 30,
                offline_after_secs: 60,
            },
        }
    }

    async fn agent_with_ping(state: &AppState, ip: &str) -> Uuid {
        let agent = agents::create_agent(
            &state.db,
            agents::NewAgent {
                id: Uuid::new_v4(),
                name: "host-1".into(),
                token: format!("tk-{ip}"),
            },
        )
        .await
        .unwrap();

        let mut snapshot = TelemetrySnapshot::default();
        snapshot.metrics.network.public_ip = ip.into();
        pings::record_snapshot(&state.db, agent.id, &snapshot)
            .await
            .unwrap();

        agent.id
    }

    async fn pending_nginx_actions(state: &AppState, agent_id: Uuid) -> Vec<serde_json::Value> {
        actions::list_actions(
            &state.db,
            ActionFilter {
                agent_id: Some(agent_id),
                status: Some("pending".into()),
                action_type: Some("update_nginx_config".into()),
            },
        )
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.payload.0)
        .collect()
    }

    #[tokio::test]
    async fn domain_create_snapshots_ip_and_enqueues_nginx_action() {
        let state = test_state().await;
        let agent_id = agent_with_ping(&state, "5.6.7.8").await;

        let domain = create_domain(
            &state,
            CreateDomainRequest {
                name: "x.example.com".into(),
                agent_id,
                ssl_enabled: false,
            },
        )
        .await
        .unwrap();
        assert_eq!(domain.agent_ip, "5.6.7.8");

        let route = create_route(
            &state,
            CreateDomainRouteRequest {
                domain_id: domain.id,
                container_name: "web".into(),
                port: "3000".into(),
                path: String::new(),
            },
        )
        .await
        .unwrap();
        assert_eq!(route.path, "/", "empty path defaults to /");

        let payloads = pending_nginx_actions(&state, agent_id).await;
        assert_eq!(payloads.len(), 2, "create domain + create route each enqueue");

        let last: UpdateNginxConfigPayload =
            serde_json::from_value(payloads.last().unwrap().clone()).unwrap();
        assert_eq!(last.domain, "x.example.com");
        assert_eq!(
            last.routes,
            vec![NginxRoutePayload {
                path: "/".into(),
                container_name: "web".into(),
                port: "3000".into(),
            }]
        );
    }

    #[tokio::test]
    async fn domain_create_fails_without_ping_history() {
        let state = test_state().await;
        let agent = agents::create_agent(
            &state.db,
            agents::NewAgent {
                id: Uuid::new_v4(),
                name: "silent".into(),
                token: "tk-silent".into(),
            },
        )
        .await
        .unwrap();

        let err = create_domain(
            &state,
            CreateDomainRequest {
                name: "y.example.com".into(),
                agent_id: agent.id,
                ssl_enabled: false,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);

        assert!(domains::list_domains(&state.db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn route_mutations_rebuild_payload_from_post_mutation_state() {
        let state = test_state().await;
        let agent_id = agent_with_ping(&state, "5.6.7.8").await;
        let domain = create_domain(
            &state,
            CreateDomainRequest {
                name: "x.example.com".into(),
                agent_id,
                ssl_enabled: false,
            },
        )
        .await
        .unwrap();

        let web = create_route(
            &state,
            CreateDomainRouteRequest {
                domain_id: domain.id,
                container_name: "web".into(),
                port: "3000".into(),
                path: "/".into(),
            },
        )
        .await
        .unwrap();
        create_route(
            &state,
            CreateDomainRouteRequest {
                domain_id: domain.id,
                container_name: "api".into(),
                port: "8000".into(),
                path: "/api".into(),
            },
        )
        .await
        .unwrap();

        // Deactivate the web route; the next payload must drop it.
        update_route(
            &state,
            web.id,
            UpdateDomainRouteRequest {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let payloads = pending_nginx_actions(&state, agent_id).await;
        let last: UpdateNginxConfigPayload =
            serde_json::from_value(payloads.last().unwrap().clone()).unwrap();
        assert_eq!(last.routes.len(), 1);
        assert_eq!(last.routes[0].container_name, "api");
    }

    #[tokio::test]
    async fn ssl_toggle_enqueues_but_plain_rename_does_not() {
        let state = test_state().await;
        let agent_id = agent_with_ping(&state, "5.6.7.8").await;
        let domain = create_domain(
            &state,
            CreateDomainRequest {
                name: "x.example.com".into(),
                agent_id,
                ssl_enabled: false,
            },
        )
        .await
        .unwrap();
        let baseline = pending_nginx_actions(&state, agent_id).await.len();

        update_domain(
            &state,
            domain.id,
            UpdateDomainRequest {
                name: Some("renamed.example.com".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(pending_nginx_actions(&state, agent_id).await.len(), baseline);

        update_domain(
            &state,
            domain.id,
            UpdateDomainRequest {
                ssl_enabled: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let payloads = pending_nginx_actions(&state, agent_id).await;
        assert_eq!(payloads.len(), baseline + 1);
        let last: UpdateNginxConfigPayload =
            serde_json::from_value(payloads.last().unwrap().clone()).unwrap();
        assert!(last.ssl_enabled);
        assert_eq!(last.domain, "renamed.example.com");
    }

    #[tokio::test]
    async fn public_feed_lists_active_domains_with_routes() {
        let state = test_state().await;
        let agent_id = agent_with_ping(&state, "5.6.7.8").await;
        let domain = create_domain(
            &state,
            CreateDomainRequest {
                name: "x.example.com".into(),
                agent_id,
                ssl_enabled: false,
            },
        )
        .await
        .unwrap();
        create_route(
            &state,
            CreateDomainRouteRequest {
                domain_id: domain.id,
                container_name: "web".into(),
                port: "3000".into(),
                path: "/".into(),
            },
        )
        .await
        .unwrap();

        let feed = public_feed(&state).await.unwrap();
        assert_eq!(feed.total, 1);
        assert_eq!(feed.domains[0].agent_ip, "5.6.7.8");
        assert_eq!(feed.domains[0].routes.len(), 1);

        update_domain(
            &state,
            domain.id,
            UpdateDomainRequest {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let feed = public_feed(&state).await.unwrap();
        assert_eq!(feed.total, 0, "inactive domains leave the feed");
    }

    #[tokio::test]
    async fn duplicate_domain_name_maps_to_bad_request() {
        let state = test_state().await;
        let agent_id = agent_with_ping(&state, "5.6.7.8").await;
        create_domain(
            &state,
            CreateDomainRequest {
                name: "x.example.com".into(),
                agent_id,
                ssl_enabled: false,
            },
        )
        .await
        .unwrap();

        let err = create_domain(
            &state,
            CreateDomainRequest {
                name: "X.EXAMPLE.COM".into(),
                agent_id,
                ssl_enabled: false,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    }
}
