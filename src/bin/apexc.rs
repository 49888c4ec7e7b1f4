#[async_std::main]
async fn main() -> anyhow::Result<()> {
    apex::cli::main().await
}
