use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    nao_chat::cli::run_cli().await
}
