//! Server configuration
//!
//! Every section has defaults, so a config file only needs the fields it
//! changes.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use anyhow::Context;
use surge_core::{Board, RuleSet};

/// Rating window used to pair queued players
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingConfig {
    /// Accepted rating gap for a fresh entry
    pub initial_window: u32,
    /// Window growth per second waited
    pub widen_per_sec: u32,
    pub max_window: u32,
}

impl Default for MatchmakingConfig {
    fn default() -> Self {
        Self {
            initial_window: 100,
            widen_per_sec: 25,
            max_window: 1000,
        }
    }
}

impl MatchmakingConfig {
    /// Window after waiting `waited_ms`; monotonic and capped
    pub fn window(&self, waited_ms: u64) -> f64 {
        let widened = self.initial_window as f64 + self.widen_per_sec as f64 * waited_ms as f64 / 1000.0;
        widened.min(self.max_window.max(self.initial_window) as f64)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    pub code_length: usize,
    /// Generation attempts before giving up on a free code
    pub max_attempts: u32,
    /// Unjoined rooms are cancelled after this long
    pub ttl_ms: u64,
    /// Fixed seed for the code generator (tests)
    pub seed: Option<u64>,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            code_length: 6,
            max_attempts: 64,
            ttl_ms: 600_000,
            seed: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long a disconnected player may be absent before forfeiting
    pub reconnect_grace_ms: u64,
    pub elo_k: f64,
    /// Periodic full-snapshot broadcast for active games
    pub state_tick_ms: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_grace_ms: 30_000,
            elo_k: 32.0,
            state_tick_ms: None,
        }
    }
}

/// Token table entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenEntry {
    pub user_id: String,
    pub rating: i32,
}

/// How connections are authenticated
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum AuthMode {
    /// Trust `user` or `user:rating` tokens; local development only
    #[default]
    Dev,
    /// Fixed token table
    Tokens { tokens: FxHashMap<String, TokenEntry> },
}

/// Server configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Serve files from here for unmatched paths
    pub static_dir: Option<String>,
    /// Interval of the matchmaking/room/disconnect sweep
    pub housekeeping_ms: u64,
    pub rules: RuleSet,
    pub matchmaking: MatchmakingConfig,
    pub rooms: RoomConfig,
    pub session: SessionConfig,
    pub auth: AuthMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8002,
            static_dir: None,
            housekeeping_ms: 1000,
            rules: RuleSet::default(),
            matchmaking: MatchmakingConfig::default(),
            rooms: RoomConfig::default(),
            session: SessionConfig::default(),
            auth: AuthMode::default(),
        }
    }
}

impl ServerConfig {
    /// Load from a JSON file and validate the embedded rule set
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ServerConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.rules.validate()?;
        // a custom layout must build a board with one king per side
        Board::from_placements(&self.rules.layout.placements())
            .context("rules.layout is not a playable board")?;
        if self.rooms.code_length == 0 {
            anyhow::bail!("rooms.code_length must be positive");
        }
        if self.housekeeping_ms == 0 {
            anyhow::bail!("housekeeping_ms must be positive");
        }
        Ok(())
    }
}
