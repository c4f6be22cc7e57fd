//! ELO rating deltas for finished games
//!
//! The engine only produces the delta; storing ratings is the host's job.

use crate::pieces::Color;
use serde::{Deserialize, Serialize};

/// Rating change for both players
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingChange {
    pub white: i32,
    pub black: i32,
}

/// Expected score of a player rated `rating` against `opponent`
pub fn expected_score(rating: i32, opponent: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent as f64 - rating as f64) / 400.0))
}

/// Deltas for a result; `winner == None` is a draw
pub fn rating_change(white: i32, black: i32, winner: Option<Color>, k: f64) -> RatingChange {
    let white_score = match winner {
        Some(Color::White) => 1.0,
        Some(Color::Black) => 0.0,
        None => 0.5,
    };
    let expected = expected_score(white, black);
    let delta = (k * (white_score - expected)).round() as i32;
    RatingChange {
        white: delta,
        black: -delta,
    }
}
