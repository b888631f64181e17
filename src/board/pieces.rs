use serde::{Deserialize, Serialize};
use std::fmt;

pub const ROWS: usize = 10;
pub const COLS: usize = 9;
pub const NUM_PIECES: u8 = 32;
/// Piece ids per side. Black ids are the red ids shifted by this amount.
pub const PIECES_PER_SIDE: u8 = 16;

pub const RED_GENERAL: u8 = 12;
pub const BLACK_GENERAL: u8 = 28;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    Red,
    Black,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Red => Side::Black,
            Side::Black => Side::Red,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Side::Red => 0,
            Side::Black => 1,
        }
    }

    pub fn from_index(idx: usize) -> Option<Side> {
        match idx {
            0 => Some(Side::Red),
            1 => Some(Side::Black),
            _ => None,
        }
    }

    pub fn general(self) -> u8 {
        match self {
            Side::Red => RED_GENERAL,
            Side::Black => BLACK_GENERAL,
        }
    }

    /// Ids owned by this side, in role order.
    pub fn piece_ids(self) -> std::ops::RangeInclusive<u8> {
        let base = (self.index() as u8) * PIECES_PER_SIDE;
        (base + 1)..=(base + PIECES_PER_SIDE)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PieceKind {
    Soldier,
    Cannon,
    Chariot,
    Horse,
    Elephant,
    Advisor,
    General,
}

impl PieceKind {
    /// Numeric code used in evaluator planes (1..=7).
    pub fn code(self) -> u8 {
        match self {
            PieceKind::Soldier => 1,
            PieceKind::Cannon => 2,
            PieceKind::Chariot => 3,
            PieceKind::Horse => 4,
            PieceKind::Elephant => 5,
            PieceKind::Advisor => 6,
            PieceKind::General => 7,
        }
    }

    fn letter(self) -> char {
        match self {
            PieceKind::Soldier => 'p',
            PieceKind::Cannon => 'c',
            PieceKind::Chariot => 'r',
            PieceKind::Horse => 'h',
            PieceKind::Elephant => 'e',
            PieceKind::Advisor => 'a',
            PieceKind::General => 'k',
        }
    }
}

use PieceKind::*;

/// Role of each red id 1..=16; black ids reuse the same roles.
const ROLE_KINDS: [PieceKind; PIECES_PER_SIDE as usize] = [
    Soldier, Soldier, Soldier, Soldier, Soldier,
    Cannon, Cannon,
    Chariot, Horse, Elephant, Advisor, General, Advisor, Elephant, Horse, Chariot,
];

/// Fixed identity of a piece id for the lifetime of a game.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PieceInfo {
    pub kind: PieceKind,
    pub owner: Side,
    /// Position in the side's role order (0..16).
    pub role: usize,
}

const fn build_table() -> [PieceInfo; NUM_PIECES as usize] {
    let mut t = [PieceInfo { kind: Soldier, owner: Side::Red, role: 0 }; NUM_PIECES as usize];
    let mut i = 0;
    while i < NUM_PIECES as usize {
        let role = i % PIECES_PER_SIDE as usize;
        let owner = if i < PIECES_PER_SIDE as usize { Side::Red } else { Side::Black };
        t[i] = PieceInfo { kind: ROLE_KINDS[role], owner, role };
        i += 1;
    }
    t
}

static PIECE_TABLE: [PieceInfo; NUM_PIECES as usize] = build_table();

/// Identity lookup for a piece id. Returns `None` for 0 and ids above 32.
pub fn piece_info(id: u8) -> Option<PieceInfo> {
    if id == 0 || id > NUM_PIECES { return None; }
    Some(PIECE_TABLE[(id - 1) as usize])
}

/// Piece id for `role` (0..16) on `side`.
pub fn piece_for_role(role: usize, side: Side) -> u8 {
    role as u8 + 1 + (side.index() as u8) * PIECES_PER_SIDE
}

/// Board symbol: uppercase for red, lowercase for black.
pub fn piece_symbol(id: u8) -> char {
    match piece_info(id) {
        Some(info) => {
            let c = info.kind.letter();
            if info.owner == Side::Red { c.to_ascii_uppercase() } else { c }
        }
        None => '.',
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coord {
    pub row: u8,
    pub col: u8,
}

impl Coord {
    pub const fn new(row: u8, col: u8) -> Self { Self { row, col } }

    pub fn is_valid(self) -> bool {
        (self.row as usize) < ROWS && (self.col as usize) < COLS
    }

    /// Coordinate shifted by a delta, if it stays on the board.
    pub fn offset(self, dr: i32, dc: i32) -> Option<Coord> {
        let r = self.row as i32 + dr;
        let c = self.col as i32 + dc;
        if r < 0 || c < 0 || r >= ROWS as i32 || c >= COLS as i32 { return None; }
        Some(Coord::new(r as u8, c as u8))
    }

    pub fn index(self) -> usize { self.row as usize * COLS + self.col as usize }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Move {
    pub piece: u8,
    pub to: Coord,
}

impl Move {
    pub fn new(piece: u8, to: Coord) -> Self { Self { piece, to } }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}->{}", piece_symbol(self.piece), self.piece, self.to)
    }
}
