#[tokio::main]
async fn main() -> eyre::Result<()> {
    taplo_lsp::run().await
}
