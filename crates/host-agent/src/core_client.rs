use std::time::Duration;

use common::api::{ActionAck, ActionEnvelope, TelemetrySnapshot};
use tracing::warn;
use uuid::Uuid;

use crate::config::AppConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the core: one POST per telemetry cycle, one PUT per
/// executed action.
#[derive(Clone)]
pub struct CoreClient {
    client: reqwest::Client,
    ping_url: String,
    actions_base: String,
    token: String,
}

impl CoreClient {
    pub fn new(cfg: &AppConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let ping_url = cfg.url.trim_end_matches('/').to_string();
        Ok(Self {
            client,
            actions_base: actions_base(&ping_url),
            ping_url,
            token: cfg.token.clone(),
        })
    }

    /// Submits one snapshot and returns the pending action queue.
    pub async fn ping(&self, snapshot: &TelemetrySnapshot) -> anyhow::Result<Vec<ActionEnvelope>> {
        let res = self
            .client
            .post(&self.ping_url)
            .bearer_auth(&self.token)
            .json(snapshot)
            .send()
            .await
            .map_err(|err| {
                warn!(?err, "ping request failed");
                err
            })?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("ping failed: status {status}, body: {body}");
        }

        let actions = res.json::<Vec<ActionEnvelope>>().await?;
        Ok(actions)
    }

    /// Reports one action result. Not retried on failure: the action stays
    /// pending on the core and will be re-delivered next ping.
    pub async fn report(&self, action_id: Uuid, ack: &ActionAck) -> anyhow::Result<()> {
        let url = format!("{}/{}/status", self.actions_base, action_id);
        let res = self
            .client
            .put(url)
            .bearer_auth(&self.token)
            .json(ack)
            .send()
            .await
            .map_err(|err| {
                warn!(?err, %action_id, "ack request failed");
                err
            })?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("ack failed: status {status}, body: {body}");
        }

        Ok(())
    }
}

/// Derives the actions endpoint base from the ping URL by trimming the
/// `/agent/ping` suffix.
fn actions_base(ping_url: &str) -> String {
    let base = ping_url
        .strip_suffix("/agent/ping")
        .unwrap_or(ping_url)
        .trim_end_matches('/');
    format!("{base}/actions")
}
