use anyhow::Result;
use grace::lsp::server::serve;

#[tokio::main]
async fn main() -> Result<()> {
    serve().await
}
