use thiserror::Error;

use crate::board::{Coord, Side};

/// Failures raised by the rules engine and the action codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RulesError {
    #[error("illegal move: piece {piece} to {to}")]
    IllegalMove { piece: u8, to: Coord },

    #[error("action {action} cannot be decoded for {side:?}: {reason}")]
    DecodeRange { action: usize, side: Side, reason: &'static str },

    #[error("move of piece {piece} to {to} has no action slot")]
    NotEncodable { piece: u8, to: Coord },

    #[error("invalid layout: {0}")]
    InvalidLayout(String),
}

/// Failures raised while running a search.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("evaluator contract violation: {0}")]
    EvaluatorContract(String),

    #[error("evaluator failed")]
    Evaluator(#[source] anyhow::Error),

    #[error(transparent)]
    Rules(#[from] RulesError),
}

/// Failures while loading, saving or reapplying a replay.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("replay io: {0}")]
    Io(#[from] std::io::Error),

    #[error("replay json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("replay step {step}: {source}")]
    Rules { step: usize, source: RulesError },
}
