//! Piece types endpoint
//!
//! Returns every piece type with the costs and cooldowns in effect on this
//! server, keyed by kind.

use crate::state::ServerState;
use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

pub async fn get_pieces(State(state): State<Arc<ServerState>>) -> Json<BTreeMap<String, Value>> {
    let rules = &state.config.rules;
    let mut pieces = BTreeMap::new();

    for rule in rules.pieces.iter() {
        let pt = rule.kind.piece_type();
        let moves: Vec<Value> = pt
            .moves
            .iter()
            .map(|m| {
                json!({
                    "style": m.style,
                    "range": m.range,
                    "vectors": m.vectors,
                })
            })
            .collect();

        let key = serde_json::to_value(rule.kind)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| pt.name.to_string());

        pieces.insert(
            key,
            json!({
                "name": pt.name,
                "symbol": pt.symbol.to_string(),
                "moves": moves,
                "special": pt.special,
                "isKing": pt.is_king,
                "energyCost": rule.energy_cost,
                "cooldownMs": rule.cooldown_ms,
                "checksKing": rule.checks_king,
            }),
        );
    }

    Json(pieces)
}
