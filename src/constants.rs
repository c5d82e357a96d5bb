//! Constants for board geometry, pattern scores, and search parameters.
//!
//! The board is a flat array of `GRID_NUM` cells addressed by
//! `id = row * BOARD_SIZE + col`. Unlike a padded layout, off-board
//! neighbours are detected with explicit bounds checks (see [`crate::grid`]).

use std::time::Duration;

// =============================================================================
// Board Geometry
// =============================================================================

/// Board size (NxN).
pub const BOARD_SIZE: usize = 15;

/// Total number of cells.
pub const GRID_NUM: usize = BOARD_SIZE * BOARD_SIZE;

/// Stones in a row needed to win.
pub const WIN_COUNT: usize = 5;

/// Cell id of the board center (row 7, col 7).
pub const CENTER: usize = (BOARD_SIZE / 2) * BOARD_SIZE + BOARD_SIZE / 2;

/// Cells on each side of the evaluated cell in a line window.
pub const HALF_WINDOW: usize = 4;

/// Cells in a line window (evaluated cell in the middle).
pub const WINDOW: usize = 2 * HALF_WINDOW + 1;

/// Number of distinct window keys: 2 bits per cell.
pub const KEY_COUNT: usize = 1 << (2 * WINDOW);

/// Chebyshev radius used to decide whether an empty cell is "lonely".
pub const NEIGHBOUR_RADIUS: usize = 2;

// =============================================================================
// Line Pattern Scores
// =============================================================================
//
// Each pattern occupies its own decimal digit so that the sum over the four
// axes of a cell can be decoded back into per-pattern counts.

/// Two stones with room to become a closed three.
pub const SLEEP_TWO: i32 = 1;

/// Two stones one move away from an open three.
pub const OPEN_TWO: i32 = 10;

/// Three stones one move away from a closed four.
pub const SLEEP_THREE: i32 = 100;

/// Three stones one move away from an open four.
pub const OPEN_THREE: i32 = 1_000;

/// Exactly one move away from five (closed or jump four).
pub const FOUR: i32 = 10_000;

/// Two adjacent completion points: cannot be blocked.
pub const OPEN_FOUR: i32 = 100_000;

/// Five in a row.
pub const FIVE: i32 = 1_000_000;

/// Six or more in a row for a side bound by the restricted-move rule.
pub const OVERLINE: i32 = 10_000_000;

// =============================================================================
// MCTS Parameters
// =============================================================================

/// Default wall-clock budget per search.
pub const TIME_BUDGET: Duration = Duration::from_secs(5);

/// UCB1 exploration constant.
pub const EXPLORATION: f32 = 1.0;

/// Visits a node needs per existing child before another child is expanded.
pub const EXPAND_VISITS: u32 = 2;

/// Maximum moves played in a single rollout before it counts as a draw.
pub const ROLLOUT_STEPS: usize = 60;

/// Reward assigned to a drawn or truncated rollout.
pub const DRAW_REWARD: f32 = 0.5;

/// Hard cap on the stability extension, as a multiple of the budget.
pub const OVERTIME_FACTOR: u32 = 2;

/// Children listed per level in the tree dump.
pub const DUMP_WIDTH: usize = 5;

/// Levels listed in the tree dump.
pub const DUMP_DEPTH: usize = 3;
