use anyhow::Result;
use buildgrid::cli::{build_cli, setup::init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let matches = build_cli().get_matches();
    buildgrid::cli::handlers::dispatch(&matches).await
}
