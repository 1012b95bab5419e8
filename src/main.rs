#[tokio::main]
async fn main() -> anyhow::Result<()> {
    videometrics_lib::run().await
}
