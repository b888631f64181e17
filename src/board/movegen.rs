//! Per-piece destination generation on a raw grid.
//!
//! Generators only know geometry and blocking. The ownership filter and the
//! flying-generals test live in [`legal_destinations`], which is what the
//! availables cache is rebuilt from.

use super::pieces::{piece_info, Coord, PieceKind, Side, COLS, ROWS};

pub type Grid = [[u8; COLS]; ROWS];

const ORTHOGONAL: [(i32, i32); 4] = [(0, -1), (-1, 0), (0, 1), (1, 0)];
const DIAGONAL: [(i32, i32); 4] = [(-1, -1), (-1, 1), (1, 1), (1, -1)];
// (jump delta, leg delta)
const HORSE_JUMPS: [((i32, i32), (i32, i32)); 8] = [
    ((-1, -2), (0, -1)),
    ((-2, -1), (-1, 0)),
    ((-2, 1), (-1, 0)),
    ((-1, 2), (0, 1)),
    ((1, 2), (0, 1)),
    ((2, 1), (1, 0)),
    ((2, -1), (1, 0)),
    ((1, -2), (0, -1)),
];

#[inline]
fn at(grid: &Grid, c: Coord) -> u8 { grid[c.row as usize][c.col as usize] }

fn owner_of(id: u8) -> Option<Side> { piece_info(id).map(|i| i.owner) }

fn in_palace(c: Coord, side: Side) -> bool {
    let rows = match side { Side::Red => 7..=9, Side::Black => 0..=2 };
    rows.contains(&c.row) && (3..=5).contains(&c.col)
}

fn on_own_half(c: Coord, side: Side) -> bool {
    match side { Side::Red => c.row >= 5, Side::Black => c.row <= 4 }
}

fn has_crossed_river(c: Coord, side: Side) -> bool {
    match side { Side::Red => c.row < 5, Side::Black => c.row > 4 }
}

fn forward(side: Side) -> i32 {
    match side { Side::Red => -1, Side::Black => 1 }
}

fn soldier(grid_from: Coord, side: Side, out: &mut Vec<Coord>) {
    if let Some(c) = grid_from.offset(forward(side), 0) { out.push(c); }
    if has_crossed_river(grid_from, side) {
        if let Some(c) = grid_from.offset(0, -1) { out.push(c); }
        if let Some(c) = grid_from.offset(0, 1) { out.push(c); }
    }
}

fn chariot(grid: &Grid, from: Coord, side: Side, out: &mut Vec<Coord>) {
    for &(dr, dc) in &ORTHOGONAL {
        let mut cur = from;
        while let Some(next) = cur.offset(dr, dc) {
            let occupant = at(grid, next);
            if occupant == 0 {
                out.push(next);
            } else {
                if owner_of(occupant) != Some(side) { out.push(next); }
                break;
            }
            cur = next;
        }
    }
}

fn cannon(grid: &Grid, from: Coord, side: Side, out: &mut Vec<Coord>) {
    for &(dr, dc) in &ORTHOGONAL {
        let mut cur = from;
        let mut screened = false;
        while let Some(next) = cur.offset(dr, dc) {
            let occupant = at(grid, next);
            if !screened {
                if occupant == 0 { out.push(next); } else { screened = true; }
            } else if occupant != 0 {
                if owner_of(occupant) != Some(side) { out.push(next); }
                break;
            }
            cur = next;
        }
    }
}

fn horse(grid: &Grid, from: Coord, out: &mut Vec<Coord>) {
    for &((dr, dc), (lr, lc)) in &HORSE_JUMPS {
        let Some(dest) = from.offset(dr, dc) else { continue };
        let Some(leg) = from.offset(lr, lc) else { continue };
        if at(grid, leg) == 0 { out.push(dest); }
    }
}

fn elephant(grid: &Grid, from: Coord, side: Side, out: &mut Vec<Coord>) {
    for &(dr, dc) in &DIAGONAL {
        let Some(dest) = from.offset(2 * dr, 2 * dc) else { continue };
        if !on_own_half(dest, side) { continue; }
        let Some(eye) = from.offset(dr, dc) else { continue };
        if at(grid, eye) == 0 { out.push(dest); }
    }
}

fn advisor(from: Coord, side: Side, out: &mut Vec<Coord>) {
    for &(dr, dc) in &DIAGONAL {
        if let Some(dest) = from.offset(dr, dc) {
            if in_palace(dest, side) { out.push(dest); }
        }
    }
}

fn general(from: Coord, side: Side, out: &mut Vec<Coord>) {
    for &(dr, dc) in &ORTHOGONAL {
        if let Some(dest) = from.offset(dr, dc) {
            if in_palace(dest, side) { out.push(dest); }
        }
    }
}

/// Raw candidate cells for the piece at `from`, before the ownership and
/// flying-generals filter. Sliding pieces already stop at blockers.
pub fn raw_destinations(grid: &Grid, from: Coord) -> Vec<Coord> {
    let mut out = Vec::with_capacity(17);
    let Some(info) = piece_info(at(grid, from)) else { return out };
    match info.kind {
        PieceKind::Soldier => soldier(from, info.owner, &mut out),
        PieceKind::Cannon => cannon(grid, from, info.owner, &mut out),
        PieceKind::Chariot => chariot(grid, from, info.owner, &mut out),
        PieceKind::Horse => horse(grid, from, &mut out),
        PieceKind::Elephant => elephant(grid, from, info.owner, &mut out),
        PieceKind::Advisor => advisor(from, info.owner, &mut out),
        PieceKind::General => general(from, info.owner, &mut out),
    }
    out
}

pub fn find_on_grid(grid: &Grid, id: u8) -> Option<Coord> {
    for (r, row) in grid.iter().enumerate() {
        for (c, &cell) in row.iter().enumerate() {
            if cell == id { return Some(Coord::new(r as u8, c as u8)); }
        }
    }
    None
}

/// True when both generals share a file with nothing between them.
pub fn generals_facing(grid: &Grid) -> bool {
    let (Some(red), Some(black)) = (
        find_on_grid(grid, Side::Red.general()),
        find_on_grid(grid, Side::Black.general()),
    ) else {
        return false;
    };
    if red.col != black.col { return false; }
    let (lo, hi) = if red.row < black.row { (red.row, black.row) } else { (black.row, red.row) };
    ((lo + 1)..hi).all(|r| grid[r as usize][red.col as usize] == 0)
}

/// Whether any piece of `by` can reach `target` on `grid`.
pub fn is_attacked(grid: &Grid, target: Coord, by: Side) -> bool {
    for (r, row) in grid.iter().enumerate() {
        for (c, &cell) in row.iter().enumerate() {
            if owner_of(cell) != Some(by) { continue; }
            let from = Coord::new(r as u8, c as u8);
            if raw_destinations(grid, from).contains(&target) { return true; }
        }
    }
    false
}

/// Grid after moving `id` from `from` to `to`, capturing whatever was there.
pub fn grid_after(grid: &Grid, from: Coord, to: Coord) -> Grid {
    let mut next = *grid;
    let id = next[from.row as usize][from.col as usize];
    next[from.row as usize][from.col as usize] = 0;
    next[to.row as usize][to.col as usize] = id;
    next
}

/// Filtered destinations for the piece at `from`.
///
/// A destination must differ from the origin, be empty or hold an enemy,
/// and must not leave the generals facing. With `forbid_self_check` the
/// mover's general must also not be attacked afterwards.
pub fn legal_destinations(grid: &Grid, from: Coord, forbid_self_check: bool) -> Vec<Coord> {
    let Some(info) = piece_info(at(grid, from)) else { return Vec::new() };
    let mut out: Vec<Coord> = Vec::new();
    for to in raw_destinations(grid, from) {
        if to == from || out.contains(&to) { continue; }
        let occupant = at(grid, to);
        if occupant != 0 && owner_of(occupant) == Some(info.owner) { continue; }
        let next = grid_after(grid, from, to);
        if generals_facing(&next) { continue; }
        if forbid_self_check {
            if let Some(g) = find_on_grid(&next, info.owner.general()) {
                if is_attacked(&next, g, info.owner.opponent()) { continue; }
            }
        }
        out.push(to);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> Grid { [[0u8; COLS]; ROWS] }

    #[test]
    fn chariot_stops_at_first_piece() {
        let mut g = empty();
        g[5][4] = 8; // red chariot
        g[5][6] = 24; // black chariot
        g[5][2] = 1; // red soldier
        let d = legal_destinations(&g, Coord::new(5, 4), false);
        assert!(d.contains(&Coord::new(5, 5)));
        assert!(d.contains(&Coord::new(5, 6)));
        assert!(!d.contains(&Coord::new(5, 7)));
        assert!(d.contains(&Coord::new(5, 3)));
        assert!(!d.contains(&Coord::new(5, 2)));
        assert!(d.contains(&Coord::new(0, 4)));
        assert!(d.contains(&Coord::new(9, 4)));
    }

    #[test]
    fn cannon_needs_exactly_one_screen() {
        let mut g = empty();
        g[5][0] = 6; // red cannon
        g[5][1] = 17; // adjacent black soldier: cannot be taken directly
        g[5][3] = 18; // first piece past the screen: capturable
        g[5][5] = 19; // behind two screens: not capturable
        let d = legal_destinations(&g, Coord::new(5, 0), false);
        assert!(!d.contains(&Coord::new(5, 1)));
        assert!(!d.contains(&Coord::new(5, 2)));
        assert!(d.contains(&Coord::new(5, 3)));
        assert!(!d.contains(&Coord::new(5, 5)));
    }

    #[test]
    fn horse_is_hobbled_by_adjacent_piece() {
        let mut g = empty();
        g[5][4] = 9;
        g[4][4] = 1; // blocks both upward jumps
        let d = legal_destinations(&g, Coord::new(5, 4), false);
        assert!(!d.contains(&Coord::new(3, 3)));
        assert!(!d.contains(&Coord::new(3, 5)));
        assert!(d.contains(&Coord::new(7, 3)));
        assert!(d.contains(&Coord::new(4, 2)));
        assert_eq!(d.len(), 6);
    }

    #[test]
    fn elephant_cannot_cross_river() {
        let mut g = empty();
        g[5][2] = 10;
        let d = legal_destinations(&g, Coord::new(5, 2), false);
        assert_eq!(d.len(), 2);
        assert!(d.iter().all(|c| c.row == 7));
    }

    #[test]
    fn advisor_and_general_stay_in_palace() {
        let mut g = empty();
        g[9][3] = 11;
        g[8][4] = 12;
        g[0][3] = 28;
        let adv = legal_destinations(&g, Coord::new(9, 3), false);
        // (8,4) is occupied by own general
        assert!(adv.is_empty());
        let gen = legal_destinations(&g, Coord::new(8, 4), false);
        assert!(gen.iter().all(|c| in_palace(*c, Side::Red)));
        assert_eq!(gen.len(), 3);
    }

    #[test]
    fn self_check_filter_rejects_exposing_moves() {
        let mut g = empty();
        g[9][4] = 12; // red general
        g[8][4] = 8; // red chariot shields it
        g[0][3] = 28; // black general off-file
        g[2][4] = 24; // black chariot on the file
        let loose = legal_destinations(&g, Coord::new(8, 4), false);
        assert!(loose.contains(&Coord::new(8, 0)));
        let strict = legal_destinations(&g, Coord::new(8, 4), true);
        assert!(!strict.contains(&Coord::new(8, 0)));
        assert!(strict.contains(&Coord::new(2, 4)));
    }
}
