#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host_agent::init_tracing();
    tracing::info!("host-agent starting");
    host_agent::run().await
}
