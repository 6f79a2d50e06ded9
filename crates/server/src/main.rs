#[tokio::main]
async fn main() -> anyhow::Result<()> {
    yapgpt_server::run().await
}
