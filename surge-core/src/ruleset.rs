//! RuleSet - tunable rules of a game
//!
//! Movement shapes are static per kind (see `pieces`). Everything a host may
//! want to rebalance lives here: the energy economy, per-kind costs and
//! cooldowns, whether check semantics apply, and the starting layout.

use crate::board::Layout;
use crate::error::ConfigError;
use crate::pieces::{PieceKind, ALL_KINDS, PIECE_TYPES};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Per-kind tunables
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PieceRule {
    pub kind: PieceKind,
    pub energy_cost: f64,
    pub cooldown_ms: u64,
    /// Whether this kind's attacks count as check when king safety is on
    pub checks_king: bool,
}

/// Rule table indexed by `PieceKind`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleTable([PieceRule; 11]);

impl Default for RuleTable {
    fn default() -> Self {
        Self(ALL_KINDS.map(|kind| {
            let pt = &PIECE_TYPES[kind.index()];
            PieceRule {
                kind,
                energy_cost: pt.energy_cost,
                cooldown_ms: pt.cooldown_ms,
                checks_king: true,
            }
        }))
    }
}

impl RuleTable {
    pub fn get(&self, kind: PieceKind) -> &PieceRule {
        &self.0[kind.index()]
    }

    pub fn get_mut(&mut self, kind: PieceKind) -> &mut PieceRule {
        &mut self.0[kind.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &PieceRule> {
        self.0.iter()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (index, rule) in self.0.iter().enumerate() {
            if rule.kind != ALL_KINDS[index] {
                return Err(ConfigError::TableOrder {
                    index,
                    expected: ALL_KINDS[index],
                    found: rule.kind,
                });
            }
            if !(rule.energy_cost >= 0.0) {
                return Err(ConfigError::OutOfRange {
                    field: "energy_cost",
                    requirement: "non-negative",
                });
            }
        }
        Ok(())
    }
}

/// Rules for one game
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    pub max_energy: f64,
    pub initial_energy: f64,
    /// Energy per second
    pub regen_rate: f64,
    /// Reject moves that leave the own king attacked; detect checkmate
    pub king_safety: bool,
    /// How long an ice bishop landing freezes adjacent enemies
    pub freeze_ms: u64,
    pub promotion: PieceKind,
    pub layout: Layout,
    pub pieces: RuleTable,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            max_energy: 10.0,
            initial_energy: 4.0,
            regen_rate: 0.5,
            king_safety: false,
            freeze_ms: 2000,
            promotion: PieceKind::Queen,
            layout: Layout::Surge,
            pieces: RuleTable::default(),
        }
    }
}

impl RuleSet {
    pub fn energy_cost(&self, kind: PieceKind) -> f64 {
        self.pieces.get(kind).energy_cost
    }

    pub fn cooldown_ms(&self, kind: PieceKind) -> u64 {
        self.pieces.get(kind).cooldown_ms
    }

    pub fn checks_king(&self, kind: PieceKind) -> bool {
        self.pieces.get(kind).checks_king
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_energy > 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "max_energy",
                requirement: "positive",
            });
        }
        if !(self.regen_rate > 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "regen_rate",
                requirement: "positive",
            });
        }
        if !(self.initial_energy >= 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "initial_energy",
                requirement: "non-negative",
            });
        }
        if self.promotion.is_king() || self.promotion == PieceKind::Pawn {
            return Err(ConfigError::OutOfRange {
                field: "promotion",
                requirement: "neither king nor pawn",
            });
        }
        self.pieces.validate()
    }

    /// Load from a JSON file; missing fields fall back to defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let rules: RuleSet = serde_json::from_str(&content)?;
        rules.validate()?;
        Ok(rules)
    }
}
