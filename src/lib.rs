//! Gobang-MCTS: a Gomoku engine for the 15x15 board.
//!
//! Positions are evaluated with a precomputed line-pattern table and
//! incrementally maintained threat scores. Moves are chosen by a
//! multi-threaded Monte Carlo Tree Search over the most urgent candidate
//! moves. Black is bound by the renju restricted-move rule unless the game
//! is created with [`patterns::Rules::FREE_STYLE`].
//!
//! ## Modules
//!
//! - [`constants`] - Board geometry, pattern scores and search defaults
//! - [`grid`] - Cells, sides, directions and coordinates
//! - [`patterns`] - Line-pattern table and threat decoding
//! - [`board`] - Incremental scores, move categories and candidate tiers
//! - [`position`] - Game state, move validation, undo and notation
//! - [`tree`] - Arena-allocated search tree
//! - [`playout`] - Random rollouts
//! - [`mcts`] - Time-bounded parallel tree search
//! - [`console`] - Text protocol for interactive play
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//! use gobang_mcts::mcts::{Mcts, SearchConfig};
//! use gobang_mcts::patterns::Rules;
//! use gobang_mcts::position::{GameState, format_move, parse_move};
//!
//! // Create a new game and open in the centre
//! let mut game = GameState::with_rules(Rules::RENJU);
//! game.apply_move(parse_move("H8").unwrap()).unwrap();
//!
//! // Search for white's reply
//! let config = SearchConfig::default()
//!     .with_time_budget(Duration::from_millis(100))
//!     .with_max_simulations(200);
//! let mut mcts = Mcts::new(config);
//! let reply = mcts.search(&game).unwrap();
//! println!("White plays {}", format_move(reply));
//! ```

pub mod board;
pub mod console;
pub mod constants;
pub mod grid;
pub mod mcts;
pub mod patterns;
pub mod playout;
pub mod position;
pub mod tree;
