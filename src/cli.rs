use clap::Parser;
use std::path::PathBuf;

/// Command-line flags. Anything left unset falls back to the config file,
/// then to the built-in defaults.
#[derive(Parser, Debug, Default)]
#[command(name = "smartops-core")]
#[command(version)]
#[command(about = "SmartOps backend: live metrics push channel, chat assistant and contact API")]
pub struct Args {
    /// TOML configuration file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Interface to listen on [default: 0.0.0.0]
    #[arg(long)]
    pub host: Option<String>,

    /// Port for both HTTP and the WebSocket push channel [default: 8081]
    #[arg(long, short)]
    pub port: Option<u16>,

    /// Milliseconds between metrics broadcasts [default: 2000]
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Name reported by the health endpoint [default: "Arbor Technologies SmartOps"]
    #[arg(long)]
    pub service_name: Option<String>,
}
