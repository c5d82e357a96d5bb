//! Coordinate and grid primitives.
//!
//! Cells are addressed by a linear id `row * BOARD_SIZE + col`. Walking off
//! the board yields `None` (or [`Cell::OffBoard`] when reading a cell), so no
//! padding is stored.

use std::fmt;

use crate::constants::{BOARD_SIZE, GRID_NUM};

/// Contents of a board cell.
///
/// The discriminants are the 2-bit codes used in line-window keys.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Cell {
    Empty = 0,
    Black = 1,
    White = 2,
    /// Sentinel for out-of-range coordinates. Never stored.
    OffBoard = 3,
}

impl Cell {
    /// 2-bit code of this cell.
    #[inline]
    pub const fn code(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn from_code(code: usize) -> Cell {
        match code & 3 {
            0 => Cell::Empty,
            1 => Cell::Black,
            2 => Cell::White,
            _ => Cell::OffBoard,
        }
    }

    /// The side owning a stone in this cell, if any.
    #[inline]
    pub const fn side(self) -> Option<Side> {
        match self {
            Cell::Black => Some(Side::Black),
            Cell::White => Some(Side::White),
            _ => None,
        }
    }
}

/// A player.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Black,
    White,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Black, Side::White];

    #[inline]
    pub const fn opponent(self) -> Side {
        match self {
            Side::Black => Side::White,
            Side::White => Side::Black,
        }
    }

    /// Index into per-side arrays.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Side::Black => 0,
            Side::White => 1,
        }
    }

    #[inline]
    pub const fn stone(self) -> Cell {
        match self {
            Side::Black => Cell::Black,
            Side::White => Cell::White,
        }
    }

    /// Side to move on a 1-based turn: black moves on odd turns.
    #[inline]
    pub const fn from_turn(turn: usize) -> Side {
        if turn % 2 == 1 { Side::Black } else { Side::White }
    }
}

impl From<Side> for Cell {
    fn from(side: Side) -> Cell {
        side.stone()
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Black => write!(f, "black"),
            Side::White => write!(f, "white"),
        }
    }
}

/// A direction as (row delta, col delta).
pub type Direction = (isize, isize);

/// The four line axes: horizontal, vertical, diagonal, anti-diagonal.
pub const AXES: [Direction; 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

/// All eight directions. `DIRECTIONS[i]` and `DIRECTIONS[i + 4]` are opposite,
/// and both lie on axis `i`.
pub const DIRECTIONS: [Direction; 8] = [
    (0, 1),
    (1, 0),
    (1, 1),
    (1, -1),
    (0, -1),
    (-1, 0),
    (-1, -1),
    (-1, 1),
];

#[inline]
pub const fn to_id(row: usize, col: usize) -> usize {
    row * BOARD_SIZE + col
}

#[inline]
pub const fn to_coord(id: usize) -> (usize, usize) {
    (id / BOARD_SIZE, id % BOARD_SIZE)
}

#[inline]
pub const fn in_bounds(row: isize, col: isize) -> bool {
    row >= 0 && row < BOARD_SIZE as isize && col >= 0 && col < BOARD_SIZE as isize
}

#[inline]
pub const fn is_valid_id(id: usize) -> bool {
    id < GRID_NUM
}

/// The cell `k` steps from `id` along `dir`, or `None` when it leaves the board.
#[inline]
pub fn step(id: usize, dir: Direction, k: isize) -> Option<usize> {
    let (row, col) = to_coord(id);
    let r = row as isize + dir.0 * k;
    let c = col as isize + dir.1 * k;
    in_bounds(r, c).then(|| to_id(r as usize, c as usize))
}

/// Chebyshev distance between two cells.
#[inline]
pub fn distance(a: usize, b: usize) -> usize {
    let (ra, ca) = to_coord(a);
    let (rb, cb) = to_coord(b);
    ra.abs_diff(rb).max(ca.abs_diff(cb))
}
