//! Game state: board, turn, history and result.
//!
//! A [`GameState`] wraps a [`Board`] with everything needed to play a game:
//! - move validation and application
//! - win, forfeit (restricted move) and draw detection
//! - the candidate list for the side to move
//! - undo by replaying the move history
//!
//! Moves are written as a row letter `A`..`O` followed by a column
//! character `1`..`9`, `a`..`f`, e.g. `H8` for the centre.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::board::Board;
use crate::constants::{BOARD_SIZE, GRID_NUM};
use crate::grid::{Cell, Side, is_valid_id, to_coord, to_id};
use crate::patterns::{LinePatternTable, Rules, Threats};

/// Outcome of the game so far.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GameStatus {
    Normal,
    BlackWin,
    WhiteWin,
    Draw,
}

impl GameStatus {
    pub fn win_for(side: Side) -> GameStatus {
        match side {
            Side::Black => GameStatus::BlackWin,
            Side::White => GameStatus::WhiteWin,
        }
    }

    pub fn winner(self) -> Option<Side> {
        match self {
            GameStatus::BlackWin => Some(Side::Black),
            GameStatus::WhiteWin => Some(Side::White),
            GameStatus::Normal | GameStatus::Draw => None,
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameStatus::Normal => "Normal",
            GameStatus::BlackWin => "Black Win",
            GameStatus::WhiteWin => "White Win",
            GameStatus::Draw => "Draw",
        };
        f.write_str(name)
    }
}

/// Why a move was refused. The state is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidMove {
    #[error("cell {0} is off the board")]
    OutOfRange(usize),
    #[error("cell {} is occupied", format_move(*.0))]
    Occupied(usize),
    #[error("the game is already over")]
    GameOver,
}

/// A game in progress.
pub struct GameState {
    board: Board,
    /// 1-based turn of the next move.
    turn: usize,
    history: Vec<usize>,
    candidates: Vec<usize>,
    status: GameStatus,
}

impl Clone for GameState {
    fn clone(&self) -> Self {
        Self {
            board: self.board.clone(),
            turn: self.turn,
            history: self.history.clone(),
            candidates: self.candidates.clone(),
            status: self.status,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.board.clone_from(&source.board);
        self.turn = source.turn;
        self.history.clone_from(&source.history);
        self.candidates.clone_from(&source.candidates);
        self.status = source.status;
    }
}

impl GameState {
    pub fn new(table: Arc<LinePatternTable>) -> Self {
        let mut game = Self {
            board: Board::new(table),
            turn: 1,
            history: Vec::with_capacity(GRID_NUM),
            candidates: Vec::new(),
            status: GameStatus::Normal,
        };
        game.refresh_candidates();
        game
    }

    /// New game with a freshly built pattern table.
    pub fn with_rules(rules: Rules) -> Self {
        Self::new(Arc::new(LinePatternTable::new(rules)))
    }

    /// Back to the empty board, keeping the pattern table.
    pub fn reset(&mut self) {
        self.board.clear();
        self.turn = 1;
        self.history.clear();
        self.status = GameStatus::Normal;
        self.refresh_candidates();
    }

    #[inline]
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Side to move.
    #[inline]
    pub fn side(&self) -> Side {
        Side::from_turn(self.turn)
    }

    #[inline]
    pub fn turn(&self) -> usize {
        self.turn
    }

    #[inline]
    pub fn status(&self) -> GameStatus {
        self.status
    }

    #[inline]
    pub fn is_over(&self) -> bool {
        self.status != GameStatus::Normal
    }

    #[inline]
    pub fn winner(&self) -> Option<Side> {
        self.status.winner()
    }

    #[inline]
    pub fn is_draw(&self) -> bool {
        self.status == GameStatus::Draw
    }

    #[inline]
    pub fn history(&self) -> &[usize] {
        &self.history
    }

    #[inline]
    pub fn last_move(&self) -> Option<usize> {
        self.history.last().copied()
    }

    /// Moves worth considering for the side to move, already narrowed to
    /// the most urgent tier. Empty once the game is over.
    #[inline]
    pub fn candidates(&self) -> &[usize] {
        &self.candidates
    }

    /// Play `id` for the side to move.
    ///
    /// A restricted move by black is recorded and ends the game as a white
    /// win; it is not an error.
    pub fn apply_move(&mut self, id: usize) -> Result<(), InvalidMove> {
        if !is_valid_id(id) {
            return Err(InvalidMove::OutOfRange(id));
        }
        if self.is_over() {
            return Err(InvalidMove::GameOver);
        }
        if self.board.get(id) != Cell::Empty {
            return Err(InvalidMove::Occupied(id));
        }

        let side = self.side();
        let score = self.board.place(id, side);
        self.history.push(id);
        self.turn += 1;

        self.status = if Threats::from_score(score).five > 0 {
            GameStatus::win_for(side)
        } else if side == Side::Black && self.board.is_restricted_move(score) {
            log::debug!("black played restricted move {}", format_move(id));
            GameStatus::WhiteWin
        } else if self.turn > GRID_NUM {
            GameStatus::Draw
        } else {
            GameStatus::Normal
        };

        self.board.classify_all(self.side());
        self.refresh_candidates();
        Ok(())
    }

    /// Play a uniformly random empty cell. Returns the move, or `None` when
    /// the game is over.
    pub fn apply_random_move(&mut self, rng: &mut fastrand::Rng) -> Option<usize> {
        if self.is_over() {
            return None;
        }
        let empty = GRID_NUM - self.board.stones();
        let nth = rng.usize(..empty);
        let id = (0..GRID_NUM)
            .filter(|&id| self.board.get(id) == Cell::Empty)
            .nth(nth)?;
        self.apply_move(id).ok().map(|()| id)
    }

    /// Take back the last `steps` moves by replaying the rest of the history.
    pub fn undo(&mut self, steps: usize) {
        let keep = self.history.len().saturating_sub(steps);
        let mut moves = std::mem::take(&mut self.history);
        moves.truncate(keep);
        self.reset();
        for &id in &moves {
            if let Err(err) = self.apply_move(id) {
                log::warn!("replay stopped at {}: {err}", format_move(id));
                break;
            }
        }
    }

    fn refresh_candidates(&mut self) {
        if self.is_over() {
            self.candidates.clear();
        } else {
            self.board.fill_candidates(&mut self.candidates);
        }
    }
}

/// Parse a move such as `H8` or `Ab`. Returns `None` for anything else.
pub fn parse_move(s: &str) -> Option<usize> {
    let bytes = s.trim().as_bytes();
    let [row, col] = bytes else {
        return None;
    };

    let row = match row.to_ascii_uppercase() {
        r @ b'A'..=b'O' => (r - b'A') as usize,
        _ => return None,
    };
    let col = match col.to_ascii_lowercase() {
        c @ b'1'..=b'9' => (c - b'1') as usize,
        c @ b'a'..=b'f' => (c - b'a') as usize + 9,
        _ => return None,
    };
    Some(to_id(row, col))
}

/// Inverse of [`parse_move`].
pub fn format_move(id: usize) -> String {
    if !is_valid_id(id) {
        return format!("#{id}");
    }
    let (row, col) = to_coord(id);
    format!("{}{}", (b'A' + row as u8) as char, column_label(col))
}

fn column_label(col: usize) -> char {
    if col < 9 {
        (b'1' + col as u8) as char
    } else {
        (b'a' + (col - 9) as u8) as char
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} | turn {} | {} to move ===", self.status, self.turn, self.side())?;
        write!(f, " ")?;
        for col in 0..BOARD_SIZE {
            write!(f, " {}", column_label(col))?;
        }
        writeln!(f)?;

        let last = self.last_move();
        for row in 0..BOARD_SIZE {
            write!(f, "{}", (b'A' + row as u8) as char)?;
            for col in 0..BOARD_SIZE {
                let id = to_id(row, col);
                let c = match self.board.get(id) {
                    _ if Some(id) == last => 'X',
                    Cell::Black => '@',
                    Cell::White => 'O',
                    Cell::Empty | Cell::OffBoard => '+',
                };
                write!(f, " {c}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::CENTER;
    use std::sync::OnceLock;

    fn table() -> Arc<LinePatternTable> {
        static TABLE: OnceLock<Arc<LinePatternTable>> = OnceLock::new();
        Arc::clone(TABLE.get_or_init(|| Arc::new(LinePatternTable::new(Rules::RENJU))))
    }

    fn play(moves: &[&str]) -> GameState {
        let mut game = GameState::new(table());
        for mv in moves {
            let id = parse_move(mv).unwrap();
            game.apply_move(id).unwrap();
        }
        game
    }

    #[test]
    fn test_new_game() {
        let game = GameState::new(table());
        assert_eq!(game.turn(), 1);
        assert_eq!(game.side(), Side::Black);
        assert_eq!(game.status(), GameStatus::Normal);
        assert_eq!(game.candidates(), &[CENTER]);
        assert_eq!(game.last_move(), None);
    }

    #[test]
    fn test_parse_format_move_roundtrip() {
        assert_eq!(parse_move("H8"), Some(CENTER));
        assert_eq!(parse_move("a1"), Some(0));
        assert_eq!(parse_move("Of"), Some(GRID_NUM - 1));
        assert_eq!(parse_move("P1"), None);
        assert_eq!(parse_move("Ag"), None);
        assert_eq!(parse_move("A10"), None);
        for id in 0..GRID_NUM {
            assert_eq!(parse_move(&format_move(id)), Some(id));
        }
    }

    #[test]
    fn test_invalid_moves_leave_state_unchanged() {
        let mut game = play(&["H8"]);
        assert_eq!(game.apply_move(GRID_NUM), Err(InvalidMove::OutOfRange(GRID_NUM)));
        assert_eq!(game.apply_move(CENTER), Err(InvalidMove::Occupied(CENTER)));
        assert_eq!(game.turn(), 2);
        assert_eq!(game.history(), &[CENTER]);
    }

    #[test]
    fn test_five_wins_and_locks_game() {
        let game_moves = ["H4", "A1", "H5", "A3", "H6", "A5", "H7", "A7"];
        let mut game = play(&game_moves);
        assert_eq!(game.status(), GameStatus::Normal);
        game.apply_move(parse_move("H8").unwrap()).unwrap();
        assert_eq!(game.status(), GameStatus::BlackWin);
        assert_eq!(game.winner(), Some(Side::Black));
        assert!(!game.is_draw());
        assert!(game.board().is_win(CENTER));
        assert!(game.candidates().is_empty());
        assert_eq!(game.apply_move(0), Err(InvalidMove::GameOver));
    }

    #[test]
    fn test_white_overline_wins() {
        // White: H2 H3 H4 _ H6 H7, then H5 makes six.
        let mut game = play(&[
            "A1", "H2", "A3", "H3", "A5", "H4", "A7", "H6", "A9", "H7", "Ab",
        ]);
        assert_eq!(game.side(), Side::White);
        game.apply_move(parse_move("H5").unwrap()).unwrap();
        assert_eq!(game.status(), GameStatus::WhiteWin);
    }

    #[test]
    fn test_black_overline_forfeits_under_renju() {
        let mut game = play(&[
            "H2", "A1", "H3", "A3", "H4", "A5", "H6", "A7", "H7", "A9",
        ]);
        assert_eq!(game.side(), Side::Black);
        game.apply_move(parse_move("H5").unwrap()).unwrap();
        assert_eq!(game.status(), GameStatus::WhiteWin);
        assert_eq!(game.last_move(), parse_move("H5"));
    }

    #[test]
    fn test_black_overline_wins_free_style() {
        let mut game = GameState::with_rules(Rules::FREE_STYLE);
        for mv in ["H2", "A1", "H3", "A3", "H4", "A5", "H6", "A7", "H7", "A9"] {
            game.apply_move(parse_move(mv).unwrap()).unwrap();
        }
        game.apply_move(parse_move("H5").unwrap()).unwrap();
        assert_eq!(game.status(), GameStatus::BlackWin);
    }

    #[test]
    fn test_undo_restores_previous_state() {
        let mut game = play(&["H8", "H9", "G7"]);
        let before = play(&["H8"]);
        game.undo(2);
        assert_eq!(game.turn(), 2);
        assert_eq!(game.history(), before.history());
        assert_eq!(game.candidates(), before.candidates());
        game.undo(5);
        assert_eq!(game.turn(), 1);
        assert_eq!(game.candidates(), &[CENTER]);
    }

    #[test]
    fn test_apply_random_move() {
        let mut rng = fastrand::Rng::with_seed(7);
        let mut game = GameState::new(table());
        let id = game.apply_random_move(&mut rng).unwrap();
        assert_eq!(game.board().get(id), Cell::Black);
        assert_eq!(game.last_move(), Some(id));
    }

    #[test]
    fn test_display_marks_last_move() {
        let game = play(&["H8", "H9"]);
        let text = game.to_string();
        assert!(text.starts_with("=== Normal | turn 3 | black to move ==="));
        let row_h = text.lines().find(|l| l.starts_with('H')).unwrap();
        assert_eq!(row_h, "H + + + + + + + @ X + + + + + +");
    }
}
