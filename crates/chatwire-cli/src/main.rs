//! Chatwire terminal client.
//!
//! # Usage
//!
//! ```bash
//! # Connect to a local relay
//! chatwire --server ws://127.0.0.1:9000
//!
//! # Show every echo, even of messages sent from this terminal
//! chatwire --no-dedup
//! ```
//!
//! Logs go to stderr so they do not interleave with the transcript.

use std::time::Duration;

use chatwire_app::Runtime;
use chatwire_cli::TerminalDriver;
use chatwire_client::{SessionConfig, SystemEnv, transport::TransportConfig};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Chatwire terminal client
#[derive(Parser, Debug)]
#[command(name = "chatwire")]
#[command(about = "Terminal client for the chatwire chat protocol")]
#[command(version)]
struct Args {
    /// WebSocket endpoint of the relay
    #[arg(short, long, env = "CHATWIRE_SERVER")]
    server: String,

    /// Milliseconds to wait for the server to answer a login or signup
    #[arg(long, default_value_t = 5_000)]
    handshake_timeout_ms: u64,

    /// Milliseconds during which an echo is matched against sent messages
    #[arg(long, default_value_t = 10_000)]
    dedup_window_ms: u64,

    /// Display server echoes of our own messages as separate entries
    #[arg(long)]
    no_dedup: bool,

    /// Milliseconds to wait for the WebSocket handshake
    #[arg(long, default_value_t = 10_000)]
    connect_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let session = SessionConfig {
        handshake_timeout: Duration::from_millis(args.handshake_timeout_ms),
        dedup_window: Duration::from_millis(args.dedup_window_ms),
        dedup_echoes: !args.no_dedup,
    };
    let transport = TransportConfig {
        connect_timeout: Duration::from_millis(args.connect_timeout_ms),
        ..TransportConfig::default()
    };

    tracing::info!(server = %args.server, "chatwire client starting");

    let driver = TerminalDriver::new(transport);
    let mut runtime = Runtime::new(driver, SystemEnv::new(), session, args.server);
    runtime.run().await?;

    Ok(())
}
