//! Example to run the SURGE server standalone
//!
//! Run with: cargo run -p surge-server --example run_server
//!
//! Dev authentication is on: connect with `ws://localhost:8002/ws?token=alice:1500`.

use surge_server::{run_server, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = ServerConfig::default();
    config.session.state_tick_ms = Some(1000);

    println!("Starting SURGE server on port {}", config.port);
    println!("Rules: http://localhost:{}/api/pieces", config.port);

    run_server(config).await
}
