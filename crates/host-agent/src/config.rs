use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Full ping endpoint URL, e.g. `http://core.example.com/api/agent/ping`.
    pub url: String,
    /// Bearer token identifying this agent to the core.
    pub token: String,
    /// Seconds between telemetry cycles.
    pub interval_secs: u64,
    /// Name of the sibling nginx container this agent restarts after config
    /// rewrites.
    pub nginx_container: String,
    /// Directory nginx site configs are written into.
    pub nginx_conf_dir: String,
    /// STUN server used for public IP discovery.
    pub stun_server: String,
    /// Primary interface whose traffic counters are reported.
    pub primary_interface: String,
    /// Optional Prometheus bind address, e.g. `127.0.0.1:9101`.
    #[serde(default)]
    pub metrics_addr: Option<String>,
}

// (ENV_NAME, config_key)
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("URL", "url"),
    ("TOKEN", "token"),
    ("INTERVAL", "interval_secs"),
    ("NGINX_CONTAINER", "nginx_container"),
    ("NGINX_CONF_DIR", "nginx_conf_dir"),
    ("STUN_SERVER", "stun_server"),
    ("PRIMARY_INTERFACE", "primary_interface"),
    ("METRICS_ADDR", "metrics_addr"),
];

pub fn load() -> anyhow::Result<AppConfig> {
    let mut builder = config::Config::builder()
        .add_source(config::File::with_name("agent").required(false))
        .set_default("url", "")?
        .set_default("token", "")?
        .set_default("interval_secs", 5)?
        .set_default("nginx_container", "agent-nginx-1")?
        .set_default("nginx_conf_dir", "/etc/nginx/conf.d")?
        .set_default("stun_server", "stun.l.google.com:19302")?
        .set_default("primary_interface", "eth0")?
        .set_default("metrics_addr", Option::<String>::None)?;

    for (env_key, cfg_key) in ENV_OVERRIDES {
        if let Ok(value) = env::var(env_key) {
            builder = builder.set_override(*cfg_key, value)?;
        }
    }

    let cfg: AppConfig = builder.build()?.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
}

impl AppConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.url.trim().is_empty() {
            anyhow::bail!("URL environment variable is required");
        }
        if self.token.trim().is_empty() {
            anyhow::bail!("TOKEN environment variable is required");
        }
        if self.interval_secs == 0 {
            anyhow::bail!("INTERVAL must be > 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> AppConfig {
        AppConfig {
            url: "http://core/api/agent/ping".into(),
            token: "tk".into(),
            interval_secs: 5,
            nginx_container: "agent-nginx-1".into(),
            nginx_conf_dir: "/etc/nginx/conf.d".into(),
            stun_server: "stun.l.google.com:19302".into(),
            primary_interface: "eth0".into(),
            metrics_addr: None,
        }
    }

    #[test]
    fn validation_requires_url_and_token() {
        assert!(base().validate().is_ok());

        let mut cfg = base();
        cfg.url = " ".into();
        assert!(cfg.validate().is_err());

        let mut cfg = base();
        cfg.token = String::new();
        assert!(cfg.validate().is_err());

        let mut cfg = base();
        cfg.interval_secs = 0;
        assert!(cfg.validate().is_err());
    }
}
