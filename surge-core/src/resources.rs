//! Per-player energy and per-piece cooldowns
//!
//! Nothing here ticks. Energy is recomputed lazily from elapsed wall-clock
//! time whenever it is read, and a cooldown is active iff its end timestamp
//! lies in the future. Callers must `recompute` before checking legality and
//! before taking a snapshot so stored and displayed energy never diverge.

use crate::clock::Timestamp;
use crate::error::MoveRejection;
use crate::pieces::PieceId;
use crate::ruleset::RuleSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResources {
    energy: f64,
    energy_regen_rate: f64,
    max_energy: f64,
    last_energy_update: Timestamp,
    cooldowns: BTreeMap<PieceId, Timestamp>,
}

impl PlayerResources {
    pub fn new(rules: &RuleSet, now: Timestamp) -> Self {
        Self {
            energy: rules.initial_energy.min(rules.max_energy),
            energy_regen_rate: rules.regen_rate,
            max_energy: rules.max_energy,
            last_energy_update: now,
            cooldowns: BTreeMap::new(),
        }
    }

    pub fn energy(&self) -> f64 {
        self.energy
    }

    pub fn max_energy(&self) -> f64 {
        self.max_energy
    }

    pub fn regen_rate(&self) -> f64 {
        self.energy_regen_rate
    }

    pub fn last_energy_update(&self) -> Timestamp {
        self.last_energy_update
    }

    /// Projected energy at `now` without mutating
    pub fn energy_at(&self, now: Timestamp) -> f64 {
        let gained = self.energy_regen_rate * now.secs_since(self.last_energy_update);
        (self.energy + gained).min(self.max_energy)
    }

    /// Fold elapsed regeneration into the stored value.
    ///
    /// Idempotent for a fixed `now`; a `now` earlier than the last update is
    /// ignored so the stored timestamp never moves backwards.
    pub fn recompute(&mut self, now: Timestamp) {
        if now <= self.last_energy_update {
            return;
        }
        self.energy = self.energy_at(now);
        self.last_energy_update = now;
    }

    pub fn can_afford(&self, cost: f64) -> bool {
        self.energy >= cost
    }

    /// Spend energy; a cost above the balance is refused, never clamped
    pub fn debit(&mut self, cost: f64) -> Result<(), MoveRejection> {
        if !self.can_afford(cost) {
            return Err(MoveRejection::InsufficientEnergy);
        }
        self.energy = (self.energy - cost).max(0.0);
        Ok(())
    }

    pub fn cooldown_end(&self, id: PieceId) -> Option<Timestamp> {
        self.cooldowns.get(&id).copied()
    }

    pub fn is_on_cooldown(&self, id: PieceId, now: Timestamp) -> bool {
        self.cooldowns.get(&id).is_some_and(|&end| end > now)
    }

    pub fn start_cooldown(&mut self, id: PieceId, until: Timestamp) {
        self.cooldowns.insert(id, until);
    }

    /// Push a cooldown end out to at least `until`
    pub fn extend_cooldown(&mut self, id: PieceId, until: Timestamp) {
        let end = self.cooldowns.entry(id).or_insert(until);
        if *end < until {
            *end = until;
        }
    }

    pub fn clear_cooldown(&mut self, id: PieceId) {
        self.cooldowns.remove(&id);
    }

    /// Drop expired entries; absence is equivalent to expiry
    pub fn prune_cooldowns(&mut self, now: Timestamp) {
        self.cooldowns.retain(|_, end| *end > now);
    }

    pub fn cooldowns(&self) -> &BTreeMap<PieceId, Timestamp> {
        &self.cooldowns
    }
}
