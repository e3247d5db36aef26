//! Chatwire server binary.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default port
//! chatwire-server --bind 0.0.0.0:9000
//!
//! # Do not echo messages back to their sender
//! chatwire-server --no-echo
//! ```

use chatwire_server::{RelayConfig, Server, ServerRuntimeConfig};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Chatwire relay server
#[derive(Parser, Debug)]
#[command(name = "chatwire-server")]
#[command(about = "Chatwire chat relay server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, env = "CHATWIRE_BIND", default_value = "0.0.0.0:9000")]
    bind: String,

    /// Do not deliver messages back to the connection that sent them
    #[arg(long)]
    no_echo: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Chatwire server starting");
    tracing::info!("Binding to {}", args.bind);

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        relay: RelayConfig { echo: !args.no_echo },
    };

    let server = Server::bind(config).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
