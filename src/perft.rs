use crate::board::{Board, Move};

// Clone-per-child perft. Finished games are leaves: nothing is expanded
// below a captured general or an exhausted quiet counter.
pub fn perft(board: &Board, depth: u32) -> u64 {
    if depth == 0 { return 1; }
    if board.outcome().is_terminal() { return 0; }
    let moves = board.legal_moves(board.side_to_move());
    if depth == 1 { return moves.len() as u64; }
    let mut nodes = 0u64;
    for mv in moves {
        let mut child = board.clone();
        if child.apply(mv).is_ok() {
            nodes += perft(&child, depth - 1);
        }
    }
    nodes
}

/// Per-root-move node counts.
pub fn perft_divide(board: &Board, depth: u32) -> Vec<(Move, u64)> {
    if depth == 0 || board.outcome().is_terminal() { return Vec::new(); }
    board
        .legal_moves(board.side_to_move())
        .into_iter()
        .filter_map(|mv| {
            let mut child = board.clone();
            child.apply(mv).ok()?;
            Some((mv, perft(&child, depth - 1)))
        })
        .collect()
}
