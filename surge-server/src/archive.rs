//! Persistence collaborator for finished games
//!
//! Sessions hand records to a channel; a background task drains it, so
//! storage never runs inside a game's critical section.

use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex, PoisonError};
use surge_core::{GameRecord, PlayerId};
use tokio::sync::mpsc;

pub type ArchiveSender = mpsc::UnboundedSender<GameRecord>;
pub type ArchiveReceiver = mpsc::UnboundedReceiver<GameRecord>;

pub trait GameArchive: Send + Sync {
    fn store(&self, record: GameRecord) -> anyhow::Result<()>;
}

/// Logs each record; the default when no store is configured
pub struct LogArchive;

impl GameArchive for LogArchive {
    fn store(&self, record: GameRecord) -> anyhow::Result<()> {
        tracing::info!(
            game = %record.game_id,
            white = %record.white_player_id,
            black = %record.black_player_id,
            winner = ?record.winner,
            reason = ?record.end_reason,
            moves = record.moves.len(),
            "game archived"
        );
        Ok(())
    }
}

/// Keeps records and running ratings in memory
#[derive(Default)]
pub struct MemoryArchive {
    records: Mutex<Vec<GameRecord>>,
    ratings: Mutex<FxHashMap<PlayerId, i32>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<GameRecord> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn rating(&self, player: &PlayerId) -> Option<i32> {
        self.ratings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(player)
            .copied()
    }
}

impl GameArchive for MemoryArchive {
    fn store(&self, record: GameRecord) -> anyhow::Result<()> {
        {
            let mut ratings = self.ratings.lock().unwrap_or_else(PoisonError::into_inner);
            ratings.insert(
                record.white_player_id.clone(),
                record.white_rating + record.rating_change.white,
            );
            ratings.insert(
                record.black_player_id.clone(),
                record.black_rating + record.rating_change.black,
            );
        }
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }
}

/// Drain the channel until every sender is gone
pub async fn run_archiver(mut rx: ArchiveReceiver, archive: Arc<dyn GameArchive>) {
    while let Some(record) = rx.recv().await {
        let game = record.game_id;
        if let Err(e) = archive.store(record) {
            tracing::error!(%game, "failed to archive game: {e:#}");
        }
    }
    tracing::debug!("archiver stopped");
}
