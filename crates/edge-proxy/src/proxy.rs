use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::{error, warn};

use crate::{
    config::AppConfig,
    table::{strip_host_port, RouteTable},
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Headers that are connection-scoped and must not be forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

#[derive(Clone)]
pub struct ProxyState {
    pub cfg: AppConfig,
    pub table: RouteTable,
    pub client: reqwest::Client,
    /// Port the agent-side nginx listens on; 80 in production.
    pub agent_port: u16,
}

impl ProxyState {
    pub fn new(cfg: AppConfig, table: RouteTable) -> anyhow::Result<Self> {
        // No total timeout: proxied responses may stream for a long time.
        // Redirects pass through to the client untouched.
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            cfg,
            table,
            client,
            agent_port: 80,
        })
    }
}

pub fn build_router(state: ProxyState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .fallback(handle_request)
        .with_state(state)
}

async fn healthz() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "healthy",
        "time": chrono::Utc::now(),
    }))
}

/// Host-based dispatch for everything that is not the health endpoint.
pub async fn handle_request(State(state): State<ProxyState>, req: Request<Body>) -> Response {
    // Present when served through into_make_service_with_connect_info.
    let client_addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());
    let host = request_host(&req);
    let Some(host) = host else {
        return (StatusCode::BAD_REQUEST, "Host header required").into_response();
    };

    let path = req.uri().path().to_string();
    let target = if is_app_host(&host, &state.cfg.app_domain) {
        if path.starts_with("/api") {
            state.cfg.server_url.clone()
        } else {
            state.cfg.app_url.clone()
        }
    } else {
        match state.table.lookup(&host) {
            Some(agent_ip) => format!("http://{}:{}", agent_ip, state.agent_port),
            None => {
                metrics::counter!("edge_proxy_unknown_host_total").increment(1);
                return (StatusCode::NOT_FOUND, "Domain not found").into_response();
            }
        }
    };

    match forward(&state, req, &target, &host, client_addr).await {
        Ok(response) => response,
        Err(err) => {
            warn!(?err, host = %host, target = %target, "upstream request failed");
            metrics::counter!("edge_proxy_upstream_failures_total").increment(1);
            (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable").into_response()
        }
    }
}

async fn forward(
    state: &ProxyState,
    req: Request<Body>,
    target: &str,
    original_host: &str,
    client_addr: Option<String>,
) -> anyhow::Result<Response> {
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("{}{}", target.trim_end_matches('/'), path_and_query);

    let method = req.method().clone();
    let inbound_real_ip = req
        .headers()
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let mut headers = filter_headers(req.headers());
    headers.insert(header::HOST, HeaderValue::from_str(original_host)?);
    headers.insert("x-forwarded-host", HeaderValue::from_str(original_host)?);
    headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));
    let real_ip = inbound_real_ip
        .or(client_addr)
        .unwrap_or_else(|| "unknown".to_string());
    headers.insert("x-real-ip", HeaderValue::from_str(&real_ip)?);

    let body = reqwest::Body::wrap_stream(req.into_body().into_data_stream());

    let upstream = state
        .client
        .request(method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await?;

    let status = upstream.status();
    let mut response_headers = filter_headers(upstream.headers());
    append_security_headers(&mut response_headers);

    let mut builder = Response::builder().status(status);
    if let Some(headers_mut) = builder.headers_mut() {
        *headers_mut = response_headers;
    }

    let response = builder
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|err| {
            error!(?err, "failed to assemble proxied response");
            anyhow::anyhow!("response assembly failed: {err}")
        })?;

    Ok(response)
}

fn request_host(req: &Request<Body>) -> Option<String> {
    req.headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| req.uri().host())
        .map(|host| strip_host_port(host).to_ascii_lowercase())
        .filter(|host| !host.is_empty())
}

fn is_app_host(host: &str, app_domain: &str) -> bool {
    (!app_domain.is_empty() && host.eq_ignore_ascii_case(app_domain))
        || host == "localhost"
        || host == "127.0.0.1"
}

fn filter_headers(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::new();
    for (name, value) in headers {
        if is_hop_by_hop(name) || name == header::HOST || name == header::CONTENT_LENGTH {
            continue;
        }
        filtered.append(name.clone(), value.clone());
    }
    filtered
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

fn append_security_headers(headers: &mut HeaderMap) {
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "x-xss-protection",
        HeaderValue::from_static("1; mode=block"),
    );
}
