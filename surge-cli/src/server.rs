//! Server command - start the game server
//!
//! ## Architecture
//!
//! - Level 1: run() - orchestration
//! - Level 2: configure_server(), start_server()
//! - Level 3: configuration loading and validation

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;

use surge_server::{run_server, ServerConfig};

// ============================================================================
// COMMAND ARGUMENTS
// ============================================================================

#[derive(Args)]
pub struct ServerArgs {
    /// JSON server configuration (rules, matchmaking, rooms, auth)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Port number to listen on (overrides the config file)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory of static client files served as a fallback
    #[arg(long)]
    pub static_dir: Option<PathBuf>,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run server command
///
/// 1. Configure server
/// 2. Start server (blocking)
pub fn run(args: ServerArgs) -> Result<()> {
    let config = configure_server(&args)?;

    tracing::info!(
        port = config.port,
        layout = ?config.rules.layout,
        king_safety = config.rules.king_safety,
        "starting SURGE server"
    );

    start_server(config)
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

/// Configure server from the optional config file and flag overrides
fn configure_server(args: &ServerArgs) -> Result<ServerConfig> {
    let mut config = load_config(args.config.as_deref())?;

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(dir) = &args.static_dir {
        validate_static_dir(dir)?;
        config.static_dir = Some(dir.to_string_lossy().to_string());
    }

    config.validate()?;
    Ok(config)
}

/// Start the server (blocking)
fn start_server(config: ServerConfig) -> Result<()> {
    tokio::runtime::Runtime::new()?.block_on(run_server(config))
}

// ============================================================================
// LEVEL 3 - STEPS
// ============================================================================

fn load_config(path: Option<&Path>) -> Result<ServerConfig> {
    match path {
        Some(path) => ServerConfig::load(path),
        None => Ok(ServerConfig::default()),
    }
}

/// A missing static directory only warns; a file in its place is an error
fn validate_static_dir(path: &Path) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => anyhow::bail!("--static-dir {} is not a directory", path.display()),
        Err(_) => {
            tracing::warn!(dir = %path.display(), "static directory missing; only the API will be served");
            Ok(())
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
