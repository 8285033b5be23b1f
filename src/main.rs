use clap::Parser;
use tracing_subscriber::EnvFilter;

use smartops_core::cli::Args;
use smartops_core::{web, ServerConfig};

// One event context drives the ticker, every socket and every HTTP request.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("smartops_core=info")),
        )
        .init();

    let args = Args::parse();
    let config = ServerConfig::from_args(&args)?;

    web::serve(config).await?;
    Ok(())
}
