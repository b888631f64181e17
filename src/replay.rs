//! Replay files: the start player plus every `(piece, [row, col])` step.
//! Captures are implied by the grid, so replaying just reapplies the moves.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::board::{Board, Coord, Move, RulesConfig, Side};
use crate::error::ReplayError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replay {
    /// Stored as 0 for red, 1 for black; any other value fails to load.
    #[serde(default = "red", with = "side_index")]
    pub start_player: Side,
    #[serde(default)]
    pub rules: RulesConfig,
    pub steps: Vec<(u8, [u8; 2])>,
}

impl Replay {
    pub fn new(start_player: Side, rules: RulesConfig) -> Self {
        Self { start_player, rules, steps: Vec::new() }
    }

    pub fn from_board(board: &Board) -> Self {
        let mut r = Self::new(board.start_player(), *board.config());
        r.steps = board.moves_played().iter().map(|m| (m.piece, [m.to.row, m.to.col])).collect();
        r
    }

    pub fn push(&mut self, mv: Move) { self.steps.push((mv.piece, [mv.to.row, mv.to.col])); }

    pub fn start_side(&self) -> Side { self.start_player }

    pub fn moves(&self) -> Vec<Move> {
        self.steps.iter().map(|&(p, [r, c])| Move::new(p, Coord::new(r, c))).collect()
    }

    /// Board after every step.
    pub fn replay(&self) -> Result<Board, ReplayError> {
        let mut board = Board::with_config(self.start_side(), self.rules);
        for (step, mv) in self.moves().into_iter().enumerate() {
            board.apply(mv).map_err(|source| ReplayError::Rules { step, source })?;
        }
        Ok(board)
    }

    /// Start position followed by the position after each step.
    pub fn boards(&self) -> Result<Vec<Board>, ReplayError> {
        let mut board = Board::with_config(self.start_side(), self.rules);
        let mut out = Vec::with_capacity(self.steps.len() + 1);
        out.push(board.clone());
        for (step, mv) in self.moves().into_iter().enumerate() {
            board.apply(mv).map_err(|source| ReplayError::Rules { step, source })?;
            out.push(board.clone());
        }
        Ok(out)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ReplayError> {
        if let Some(dir) = path.as_ref().parent() {
            if !dir.as_os_str().is_empty() { fs::create_dir_all(dir)?; }
        }
        let w = BufWriter::new(File::create(path)?);
        serde_json::to_writer(w, self)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ReplayError> {
        let r = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(r)?)
    }
}

fn red() -> Side { Side::Red }

mod side_index {
    use super::*;
    use serde::de::Error;

    pub fn serialize<S: Serializer>(side: &Side, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(side.index() as u8)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Side, D::Error> {
        let idx = u8::deserialize(d)?;
        Side::from_index(idx as usize)
            .ok_or_else(|| D::Error::custom(format!("invalid start player {idx}, expected 0 or 1")))
    }
}
