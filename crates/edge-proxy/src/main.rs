#[tokio::main]
async fn main() -> anyhow::Result<()> {
    edge_proxy::init_tracing();
    tracing::info!("edge proxy starting");
    edge_proxy::run().await
}
