//! Fixed 192-slot action space and evaluator input planes.
//!
//! Each of the 16 piece roles owns a contiguous range of slots; every slot
//! is one fixed (row delta, col delta). Black pieces share the red ranges,
//! so an action is only meaningful together with the side that plays it.

use std::sync::OnceLock;

use crate::board::{piece_for_role, piece_info, Board, Coord, Move, Side, COLS, ROWS};
use crate::error::RulesError;

pub type Action = usize;

pub const ACTION_SPACE: usize = 192;

/// First slot of each role (red id - 1).
pub const ROLE_OFFSETS: [usize; 16] = [0, 4, 8, 12, 16, 20, 54, 88, 122, 130, 134, 138, 142, 146, 150, 158];

const STEP: [(i8, i8); 4] = [(0, -1), (-1, 0), (0, 1), (1, 0)];
const HORSE: [(i8, i8); 8] = [(-1, -2), (-2, -1), (-2, 1), (-1, 2), (1, 2), (2, 1), (2, -1), (1, -2)];
const ELEPHANT: [(i8, i8); 4] = [(-2, -2), (-2, 2), (2, 2), (2, -2)];
const ADVISOR: [(i8, i8); 4] = [(-1, -1), (-1, 1), (1, 1), (1, -1)];

fn push_slider(t: &mut Vec<(i8, i8)>) {
    for d in 1..=8 { t.push((0, -d)); }
    for d in 1..=9 { t.push((-d, 0)); }
    for d in 1..=8 { t.push((0, d)); }
    for d in 1..=9 { t.push((d, 0)); }
}

fn slot_deltas() -> &'static [(i8, i8)] {
    static TABLE: OnceLock<Vec<(i8, i8)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut t = Vec::with_capacity(ACTION_SPACE);
        for _ in 0..5 { t.extend_from_slice(&STEP); }
        push_slider(&mut t); // cannon
        push_slider(&mut t); // cannon
        push_slider(&mut t); // chariot
        t.extend_from_slice(&HORSE);
        t.extend_from_slice(&ELEPHANT);
        t.extend_from_slice(&ADVISOR);
        t.extend_from_slice(&STEP); // general
        t.extend_from_slice(&ADVISOR);
        t.extend_from_slice(&ELEPHANT);
        t.extend_from_slice(&HORSE);
        push_slider(&mut t); // chariot
        debug_assert_eq!(t.len(), ACTION_SPACE);
        t
    })
}

fn role_range(role: usize) -> std::ops::Range<usize> {
    let start = ROLE_OFFSETS[role];
    let end = ROLE_OFFSETS.get(role + 1).copied().unwrap_or(ACTION_SPACE);
    start..end
}

/// Role owning `action`.
fn role_of(action: Action) -> usize {
    ROLE_OFFSETS.partition_point(|&o| o <= action) - 1
}

/// Encode `piece -> to` relative to the piece's current square.
pub fn encode_move(board: &Board, piece: u8, to: Coord) -> Result<Action, RulesError> {
    let not_encodable = || RulesError::NotEncodable { piece, to };
    let info = piece_info(piece).ok_or_else(not_encodable)?;
    let from = board.find_piece(piece).ok_or_else(not_encodable)?;
    let delta = (to.row as i8 - from.row as i8, to.col as i8 - from.col as i8);
    let deltas = slot_deltas();
    role_range(info.role)
        .find(|&a| deltas[a] == delta)
        .ok_or_else(not_encodable)
}

/// Decode an action for `side` into a move that is legal on `board`.
pub fn decode_move(board: &Board, action: Action, side: Side) -> Result<Move, RulesError> {
    let err = |reason| RulesError::DecodeRange { action, side, reason };
    if action >= ACTION_SPACE {
        return Err(err("outside the action space"));
    }
    let piece = piece_for_role(role_of(action), side);
    let from = board.find_piece(piece).ok_or_else(|| err("piece not on the board"))?;
    let (dr, dc) = slot_deltas()[action];
    let to = from.offset(dr as i32, dc as i32).ok_or_else(|| err("destination off the board"))?;
    if !board.is_legal(piece, to) {
        return Err(err("not a legal move"));
    }
    Ok(Move::new(piece, to))
}

/// Every legal action for `side`, ascending.
pub fn legal_actions(board: &Board, side: Side) -> Vec<Action> {
    let mut out: Vec<Action> = board
        .legal_moves(side)
        .into_iter()
        .filter_map(|m| encode_move(board, m.piece, m.to).ok())
        .collect();
    out.sort_unstable();
    out
}

pub fn legal_action_mask(board: &Board, side: Side) -> [bool; ACTION_SPACE] {
    let mut mask = [false; ACTION_SPACE];
    for a in legal_actions(board, side) {
        mask[a] = true;
    }
    mask
}

/// Plane count for a given history length: own/opponent per snapshot plus
/// the start-player plane.
pub fn num_planes(history_len: usize) -> usize { history_len * 2 + 1 }

/// Evaluator input from `side`'s perspective, flattened as
/// `planes x ROWS x COLS`. Cells carry piece kind codes (1..=7).
pub fn encode_state(board: &Board, side: Side) -> Vec<f32> {
    let area = ROWS * COLS;
    let planes = num_planes(board.config().history_len);
    let mut out = vec![0.0f32; planes * area];
    for (i, snap) in board.history().enumerate() {
        let Some(grid) = snap else { continue };
        for (r, row) in grid.iter().enumerate() {
            for (c, &id) in row.iter().enumerate() {
                let Some(info) = piece_info(id) else { continue };
                let plane = if info.owner == side { 2 * i } else { 2 * i + 1 };
                out[plane * area + r * COLS + c] = info.kind.code() as f32;
            }
        }
    }
    if side == board.start_player() {
        let last = (planes - 1) * area;
        out[last..last + area].fill(1.0);
    }
    out
}
