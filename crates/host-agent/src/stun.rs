use std::net::{ToSocketAddrs, UdpSocket};

use anyhow::Context;
use stunclient::StunClient;
use tracing::warn;

const FALLBACK_IP: &str = "127.0.0.1";

/// Discovers this host's public IP via a STUN binding request. Best-effort:
/// any failure falls back to the loopback address so a snapshot is always
/// produced.
pub async fn discover_public_ip(server: &str) -> String {
    let server = server.to_string();
    let result = tokio::task::spawn_blocking(move || query_external_ip(&server)).await;

    match result {
        Ok(Ok(ip)) => ip,
        Ok(Err(err)) => {
            warn!(?err, "STUN public IP discovery failed");
            FALLBACK_IP.to_string()
        }
        Err(err) => {
            warn!(?err, "STUN probe task failed");
            FALLBACK_IP.to_string()
        }
    }
}

fn query_external_ip(server: &str) -> anyhow::Result<String> {
    let server_addr = server
        .to_socket_addrs()
        .context("resolve STUN server")?
        .find(|addr| addr.is_ipv4())
        .context("no IPv4 address for STUN server")?;

    let socket = UdpSocket::bind("0.0.0.0:0").context("bind UDP socket")?;
    let client = StunClient::new(server_addr);
    let external = client
        .query_external_address(&socket)
        .context("STUN binding request")?;

    Ok(external.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unresolvable_server_falls_back_to_loopback() {
        let ip = discover_public_ip("does-not-exist.invalid:19302").await;
        assert_eq!(ip, FALLBACK_IP);
    }
}
