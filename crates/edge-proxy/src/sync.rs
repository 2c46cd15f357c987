use std::collections::HashMap;
use std::time::Duration;

use common::api::PublicDomainFeed;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::table::RouteTable;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Periodically pulls the core's public domain feed into the route table.
/// Fetch failures keep the previous table; a transient core outage must not
/// blank out routing.
pub async fn sync_loop(
    server_url: String,
    table: RouteTable,
    interval_secs: u64,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));

    info!(server_url = %server_url, "domain sync loop starting");

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = interval.tick() => {
                match fetch_domain_table(&client, &server_url).await {
                    Ok(next) => {
                        let count = next.len();
                        table.replace(next);
                        metrics::gauge!("edge_proxy_domains").set(count as f64);
                        info!(domains = count, "domain table synced");
                    }
                    Err(err) => {
                        metrics::counter!("edge_proxy_sync_failures_total").increment(1);
                        warn!(?err, "domain sync failed, keeping previous table");
                    }
                }
            }
        }
    }

    Ok(())
}

pub async fn fetch_domain_table(
    client: &reqwest::Client,
    server_url: &str,
) -> anyhow::Result<HashMap<String, String>> {
    let url = format!("{}/api/domains/public", server_url.trim_end_matches('/'));
    let res = client.get(url).send().await?;

    let status = res.status();
    if !status.is_success() {
        anyhow::bail!("domain feed returned status {status}");
    }

    let feed = res.json::<PublicDomainFeed>().await?;
    Ok(feed
        .domains
        .into_iter()
        .map(|domain| (domain.name, domain.agent_ip))
        .collect())
}
