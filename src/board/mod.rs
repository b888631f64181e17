//! Xiangqi rules engine: board state, availables cache and terminal rules.

pub mod movegen;
pub mod pieces;

use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use crate::error::RulesError;
pub use movegen::{generals_facing, Grid};
pub use pieces::{
    piece_for_role, piece_info, piece_symbol, Coord, Move, PieceInfo, PieceKind, Side, COLS,
    NUM_PIECES, ROWS,
};

const START_LAYOUT: Grid = [
    [32, 31, 30, 29, 28, 27, 26, 25, 24],
    [0, 0, 0, 0, 0, 0, 0, 0, 0],
    [0, 23, 0, 0, 0, 0, 0, 22, 0],
    [21, 0, 20, 0, 19, 0, 18, 0, 17],
    [0, 0, 0, 0, 0, 0, 0, 0, 0],
    [0, 0, 0, 0, 0, 0, 0, 0, 0],
    [1, 0, 2, 0, 3, 0, 4, 0, 5],
    [0, 6, 0, 0, 0, 0, 0, 7, 0],
    [0, 0, 0, 0, 0, 0, 0, 0, 0],
    [8, 9, 10, 11, 12, 13, 14, 15, 16],
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Consecutive capture-free plies after which the game is a tie.
    pub no_capture_limit: u32,
    /// Number of snapshots kept for evaluator context.
    pub history_len: usize,
    /// Also reject moves that leave the mover's general attacked.
    pub forbid_self_check: bool,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self { no_capture_limit: 40, history_len: 4, forbid_self_check: false }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Ongoing,
    Win(Side),
    Tie,
}

impl Outcome {
    pub fn is_terminal(self) -> bool { self != Outcome::Ongoing }

    /// +1 / -1 / 0 from `side`'s point of view. Ongoing scores as 0.
    pub fn value_for(self, side: Side) -> f32 {
        match self {
            Outcome::Win(w) if w == side => 1.0,
            Outcome::Win(_) => -1.0,
            _ => 0.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Board {
    grid: Grid,
    side_to_move: Side,
    start_player: Side,
    history: VecDeque<Option<Grid>>,
    no_capture_steps: u32,
    moves: Vec<Move>,
    availables: BTreeMap<u8, Vec<Coord>>,
    config: RulesConfig,
}

impl Board {
    /// Standard 32-piece layout with `start_player` to move.
    pub fn new(start_player: Side) -> Self {
        Self::with_config(start_player, RulesConfig::default())
    }

    pub fn with_config(start_player: Side, config: RulesConfig) -> Self {
        let mut b = Self {
            grid: START_LAYOUT,
            side_to_move: start_player,
            start_player,
            history: VecDeque::new(),
            no_capture_steps: 0,
            moves: Vec::new(),
            availables: BTreeMap::new(),
            config,
        };
        b.init(start_player);
        b
    }

    /// Reset to the starting layout, clearing history and counters.
    pub fn init(&mut self, start_player: Side) {
        self.grid = START_LAYOUT;
        self.side_to_move = start_player;
        self.start_player = start_player;
        self.history = std::iter::repeat(None).take(self.config.history_len).collect();
        self.no_capture_steps = 0;
        self.moves.clear();
        self.refresh_availables();
    }

    /// Custom position. Every id must be in range and unique, and both
    /// generals must be present.
    pub fn from_layout(grid: Grid, side_to_move: Side, config: RulesConfig) -> Result<Self, RulesError> {
        let mut seen = [false; NUM_PIECES as usize + 1];
        for row in grid.iter() {
            for &id in row.iter() {
                if id == 0 { continue; }
                if id > NUM_PIECES {
                    return Err(RulesError::InvalidLayout(format!("piece id {id} out of range")));
                }
                if seen[id as usize] {
                    return Err(RulesError::InvalidLayout(format!("piece id {id} appears twice")));
                }
                seen[id as usize] = true;
            }
        }
        for side in [Side::Red, Side::Black] {
            if !seen[side.general() as usize] {
                return Err(RulesError::InvalidLayout(format!("{side:?} general missing")));
            }
        }
        let mut b = Self {
            grid,
            side_to_move,
            start_player: side_to_move,
            history: std::iter::repeat(None).take(config.history_len).collect(),
            no_capture_steps: 0,
            moves: Vec::new(),
            availables: BTreeMap::new(),
            config,
        };
        b.refresh_availables();
        Ok(b)
    }

    fn refresh_availables(&mut self) {
        self.availables.clear();
        for r in 0..ROWS {
            for c in 0..COLS {
                let id = self.grid[r][c];
                if id == 0 { continue; }
                let from = Coord::new(r as u8, c as u8);
                let dests = movegen::legal_destinations(&self.grid, from, self.config.forbid_self_check);
                if !dests.is_empty() {
                    self.availables.insert(id, dests);
                }
            }
        }
    }

    pub fn grid(&self) -> &Grid { &self.grid }
    pub fn config(&self) -> &RulesConfig { &self.config }
    pub fn side_to_move(&self) -> Side { self.side_to_move }
    pub fn start_player(&self) -> Side { self.start_player }
    pub fn no_capture_steps(&self) -> u32 { self.no_capture_steps }
    pub fn moves_played(&self) -> &[Move] { &self.moves }

    /// Snapshot history, oldest first. Slots stay `None` until enough moves
    /// have been played.
    pub fn history(&self) -> impl Iterator<Item = Option<&Grid>> { self.history.iter().map(|s| s.as_ref()) }

    pub fn piece_at(&self, c: Coord) -> u8 {
        if !c.is_valid() { return 0; }
        self.grid[c.row as usize][c.col as usize]
    }

    pub fn find_piece(&self, id: u8) -> Option<Coord> { movegen::find_on_grid(&self.grid, id) }

    /// Cached destinations for `piece`; empty when captured or immobile.
    pub fn legal_destinations(&self, piece: u8) -> &[Coord] {
        self.availables.get(&piece).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn is_legal(&self, piece: u8, to: Coord) -> bool {
        self.legal_destinations(piece).contains(&to)
    }

    /// Availables restricted to pieces of `side`, in id order.
    pub fn availables_for(&self, side: Side) -> impl Iterator<Item = (u8, &[Coord])> {
        self.availables
            .iter()
            .filter(move |(id, _)| piece_info(**id).map(|i| i.owner) == Some(side))
            .map(|(id, v)| (*id, v.as_slice()))
    }

    pub fn legal_moves(&self, side: Side) -> Vec<Move> {
        self.availables_for(side)
            .flat_map(|(id, dests)| dests.iter().map(move |&to| Move::new(id, to)))
            .collect()
    }

    pub fn has_legal_move(&self, side: Side) -> bool { self.availables_for(side).next().is_some() }

    /// Apply a move of the side to move from the availables cache. Rejects
    /// anything else and leaves the board untouched in that case.
    pub fn apply_move(&mut self, piece: u8, to: Coord) -> Result<(), RulesError> {
        let owner = piece_info(piece).map(|i| i.owner);
        if owner != Some(self.side_to_move) || !self.is_legal(piece, to) {
            return Err(RulesError::IllegalMove { piece, to });
        }
        let Some(from) = self.find_piece(piece) else {
            return Err(RulesError::IllegalMove { piece, to });
        };
        let captured = self.piece_at(to);
        if captured == 0 {
            self.no_capture_steps += 1;
        } else {
            self.no_capture_steps = 0;
        }
        self.grid = movegen::grid_after(&self.grid, from, to);
        self.moves.push(Move::new(piece, to));
        if self.config.history_len > 0 {
            self.history.push_back(Some(self.grid));
            while self.history.len() > self.config.history_len {
                self.history.pop_front();
            }
        }
        self.side_to_move = self.side_to_move.opponent();
        self.refresh_availables();
        trace!("applied {} (captured {}), {} quiet plies", Move::new(piece, to), captured, self.no_capture_steps);
        Ok(())
    }

    pub fn apply(&mut self, mv: Move) -> Result<(), RulesError> { self.apply_move(mv.piece, mv.to) }

    /// Terminal status of the position.
    ///
    /// A side whose general has been captured loses; a side to move with no
    /// legal move loses; `no_capture_limit` quiet plies is a tie. The
    /// no-move rule holds in both self-check modes, so a stalemate under
    /// the default rules is a loss as well.
    pub fn outcome(&self) -> Outcome {
        let red = self.find_piece(Side::Red.general()).is_some();
        let black = self.find_piece(Side::Black.general()).is_some();
        match (red, black) {
            (false, false) => unreachable!("both generals missing from the board"),
            (false, true) => return Outcome::Win(Side::Black),
            (true, false) => return Outcome::Win(Side::Red),
            (true, true) => {}
        }
        if self.no_capture_steps >= self.config.no_capture_limit {
            return Outcome::Tie;
        }
        if !self.has_legal_move(self.side_to_move) {
            return Outcome::Win(self.side_to_move.opponent());
        }
        Outcome::Ongoing
    }

    /// `(finished, outcome)` pair.
    pub fn is_terminal(&self) -> (bool, Outcome) {
        let o = self.outcome();
        (o.is_terminal(), o)
    }

    /// Whether `side`'s general is attacked by any opposing piece.
    pub fn is_in_check(&self, side: Side) -> bool {
        match self.find_piece(side.general()) {
            Some(g) => movegen::is_attacked(&self.grid, g, side.opponent()),
            None => false,
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "   0 1 2 3 4 5 6 7 8")?;
        for (r, row) in self.grid.iter().enumerate() {
            write!(f, "{r:>2}")?;
            for &id in row.iter() {
                write!(f, " {}", piece_symbol(id))?;
            }
            writeln!(f)?;
            if r == 4 { writeln!(f, "   -----------------")?; }
        }
        write!(f, "{:?} to move, {} quiet plies", self.side_to_move, self.no_capture_steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_position_has_44_moves_per_side() {
        let b = Board::new(Side::Red);
        assert_eq!(b.legal_moves(Side::Red).len(), 44);
        assert_eq!(b.legal_moves(Side::Black).len(), 44);
        assert_eq!(b.outcome(), Outcome::Ongoing);
    }

    #[test]
    fn illegal_move_leaves_state_untouched() {
        let mut b = Board::new(Side::Red);
        let before = *b.grid();
        let err = b.apply_move(1, Coord::new(4, 0)).unwrap_err();
        assert_eq!(err, RulesError::IllegalMove { piece: 1, to: Coord::new(4, 0) });
        assert_eq!(*b.grid(), before);
        assert_eq!(b.side_to_move(), Side::Red);
        assert!(b.moves_played().is_empty());
    }

    #[test]
    fn capture_resets_quiet_counter() {
        let mut b = Board::new(Side::Red);
        b.apply_move(1, Coord::new(5, 0)).unwrap();
        assert_eq!(b.no_capture_steps(), 1);
        // red cannon 6 jumps the black cannon screen and takes the horse
        b.apply_move(17, Coord::new(4, 8)).unwrap();
        b.apply_move(6, Coord::new(0, 1)).unwrap();
        assert_eq!(b.no_capture_steps(), 0);
        assert_eq!(b.find_piece(31), None);
    }

    #[test]
    fn layout_rejects_missing_general() {
        let mut g = [[0u8; COLS]; ROWS];
        g[9][4] = 12;
        assert!(matches!(
            Board::from_layout(g, Side::Red, RulesConfig::default()),
            Err(RulesError::InvalidLayout(_))
        ));
    }
}
