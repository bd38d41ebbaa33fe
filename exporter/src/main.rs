#[tokio::main]
async fn main() -> anyhow::Result<()> {
    portwatch::run().await
}
