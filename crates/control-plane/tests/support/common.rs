#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request as HttpRequest, StatusCode},
    Router,
};
use chrono::Utc;
use control_plane::{
    app_state::AppState,
    config::{NotificationConfig, WatcherConfig},
    notify::LogNotifier,
    persistence::{agents, migrations},
    routes::build_router,
};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret";

pub async fn setup_state() -> AppState {
    let pool = migrations::init_pool("sqlite::memory:").await.expect("db init");
    migrations::run_migrations(&pool).await.expect("migrations");

    AppState {
        db: pool,
        jwt_secret: TEST_JWT_SECRET.into(),
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

pub fn app(state: AppState) -> Router {
    build_router(state.clone()).with_state(state)
}

pub async fn seed_agent(state: &AppState, name: &str, token: &str) -> Uuid {
    agents::create_agent(
        &state.db,
        agents::NewAgent {
            id: Uuid::new_v4(),
            name: name.into(),
            token: token.into(),
        },
    )
    .await
    .expect("seed agent")
    .id
}

pub fn operator_token() -> String {
    #[derive(serde::Serialize)]
    struct Claims {
        sub: String,
        username: String,
        role: String,
        exp: i64,
        iat: i64,
    }

    let now = Utc::now().timestamp();
    encode(
        &Header::default(),
        &Claims {
            sub: "u-1".into(),
            username: "admin".into(),
            role: "admin".into(),
            exp: now + 3600,
            iat: now,
        },
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("mint operator token")
}

pub fn json_request(method: &str, uri: &str, bearer: Option<&str>, body: serde_json::Value) -> HttpRequest<Body> {
    let mut builder = HttpRequest::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("build request")
}

pub fn empty_request(method: &str, uri: &str, bearer: Option<&str>) -> HttpRequest<Body> {
    let mut builder = HttpRequest::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("build request")
}

pub async fn send(app: &Router, request: HttpRequest<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.expect("dispatch");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, value)
}

pub fn minimal_ping_body(public_ip: &str) -> serde_json::Value {
    serde_json::json!({
        "metrics": {
            "cpu": [{"name": "cpu0", "usage": 0.25}],
            "memory": {"ram": {"total": 2048, "usage": 512}, "swap": {"total": 0, "usage": 0}},
            "disk": [],
            "network": {"public_ip": public_ip, "sent": 0, "received": 0}
        },
        "docker": {"containers": [], "images": []}
    })
}
