use serde::Deserialize;
use std::env;

pub const ENV_PREFIX: &str = "FLEET_CP";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub watcher: WatcherConfig,
    pub notifications: NotificationConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret the external login service signs operator JWTs with.
    pub jwt_secret: String,
    /// Bootstrap operator credentials, consumed by the external login
    /// collaborator; carried in config so one file provisions the stack.
    pub admin_username: String,
    pub admin_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatcherConfig {
    /// Seconds between offline sweeps.
    pub sweep_interval_secs: u64,
    /// Agents silent for longer than this are reported offline.
    pub offline_after_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Average CPU percent above which a notification fires.
    pub cpu_threshold: f64,
    /// RAM percent above which a notification fires.
    pub ram_threshold: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub host: String,
    pub port: u16,
}

// (ENV_NAME, config_key)
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("FLEET_CP_HOST", "server.host"),
    ("FLEET_CP_PORT", "server.port"),
    ("DATABASE_URL", "database.url"),
    ("FLEET_CP_DATABASE_URL", "database.url"),
    ("JWT_SECRET", "auth.jwt_secret"),
    ("FLEET_CP_JWT_SECRET", "auth.jwt_secret"),
    ("ADMIN_USERNAME", "auth.admin_username"),
    ("ADMIN_PASSWORD", "auth.admin_password"),
    ("FLEET_CP_SWEEP_INTERVAL_SECS", "watcher.sweep_interval_secs"),
    ("FLEET_CP_OFFLINE_AFTER_SECS", "watcher.offline_after_secs"),
    ("FLEET_CP_CPU_THRESHOLD", "notifications.cpu_threshold"),
    ("FLEET_CP_RAM_THRESHOLD", "notifications.ram_threshold"),
    ("FLEET_CP_METRICS_HOST", "metrics.host"),
    ("FLEET_CP_METRICS_PORT", "metrics.port"),
];

pub fn load() -> anyhow::Result<AppConfig> {
    let mut builder = config::Config::builder()
        .add_source(config::File::with_name("config").required(false))
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8000)?
        .set_default("database.url", "sqlite://data/fleet-core.sqlite")?
        .set_default("auth.jwt_secret", "")?
        .set_default("auth.admin_username", "admin")?
        .set_default("auth.admin_password", "")?
        .set_default("watcher.sweep_interval_secs", 30)?
        .set_default("watcher.offline_after_secs", 60)?
        .set_default("notifications.cpu_threshold", 80.0)?
        .set_default("notifications.ram_threshold", 80.0)?
        .set_default("metrics.host", "127.0.0.1")?
        .set_default("metrics.port", 9100)?;

    for (env_key, cfg_key) in ENV_OVERRIDES {
        if let Ok(value) = env::var(env_key) {
            builder = builder.set_override(*cfg_key, value)?;
        }
    }

    let cfg: AppConfig = builder.build()?.try_deserialize()?;

    if cfg.auth.jwt_secret.trim().is_empty() {
        anyhow::bail!("JWT_SECRET cannot be empty");
    }
    if cfg.watcher.sweep_interval_secs == 0 {
        anyhow::bail!("watcher.sweep_interval_secs must be > 0");
    }
    if cfg.watcher.offline_after_secs <= 0 {
        anyhow::bail!("watcher.offline_after_secs must be > 0");
    }

    Ok(cfg)
}
