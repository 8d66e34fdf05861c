use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    topic_helper_cli::main_entry().await
}
