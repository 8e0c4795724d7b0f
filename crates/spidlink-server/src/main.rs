//! Spidlink server binary.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults
//! spidlink-server --bind 0.0.0.0:50051
//!
//! # Reject lock requests for the state the lock is already in
//! spidlink-server --strict-lock-transitions
//! ```

use clap::Parser;
use spidlink_core::SameStatePolicy;
use spidlink_server::{Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Spidlink association server
#[derive(Parser, Debug)]
#[command(name = "spidlink-server")]
#[command(about = "User/Spid association server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:50051")]
    bind: String,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Maximum request/response payload in bytes
    #[arg(long, default_value = "65536")]
    max_frame_size: usize,

    /// Reject lock requests for the current state instead of accepting them
    #[arg(long)]
    strict_lock_transitions: bool,

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

    tracing::info!("Spidlink server starting");
    tracing::info!("Binding to {}", args.bind);

    let lock_policy = if args.strict_lock_transitions {
        SameStatePolicy::Reject
    } else {
        SameStatePolicy::Accept
    };

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        max_connections: args.max_connections,
        max_frame_size: args.max_frame_size,
        lock_policy,
    };

    let server = Server::bind(config).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
