use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Core API base URL, target of `/api/*` on the app domain and the
    /// domain-table sync.
    pub server_url: String,
    /// Operator UI base URL, target of everything else on the app domain.
    pub app_url: String,
    /// Hostname the operator UI is served under; empty disables the app
    /// split and every host goes through the domain table.
    #[serde(default)]
    pub app_domain: String,
    /// Listen address.
    pub listen_addr: String,
    /// Seconds between domain-table refreshes.
    pub sync_interval_secs: u64,
}

// (ENV_NAME, config_key)
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("SERVER_URL", "server_url"),
    ("APP_URL", "app_url"),
    ("APP_DOMAIN", "app_domain"),
    ("LISTEN_ADDR", "listen_addr"),
    ("SYNC_INTERVAL", "sync_interval_secs"),
];

pub fn load() -> anyhow::Result<AppConfig> {
    let mut builder = config::Config::builder()
        .add_source(config::File::with_name("edge").required(false))
        .set_default("server_url", "http://server:8000")?
        .set_default("app_url", "http://app:3000")?
        .set_default("app_domain", "")?
        .set_default("listen_addr", "0.0.0.0:80")?
        .set_default("sync_interval_secs", 30)?;

    for (env_key, cfg_key) in ENV_OVERRIDES {
        if let Ok(value) = env::var(env_key) {
            builder = builder.set_override(*cfg_key, value)?;
        }
    }

    let cfg: AppConfig = builder.build()?.try_deserialize()?;
    if cfg.sync_interval_secs == 0 {
        anyhow::bail!("SYNC_INTERVAL must be > 0");
    }
    Ok(cfg)
}
