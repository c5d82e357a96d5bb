//! Line pattern table for threat evaluation.
//!
//! A line window is 9 consecutive cells along one axis with the evaluated
//! cell in the middle (index 4). Each cell is encoded in 2 bits
//! (see [`Cell::code`]), so a window is an 18-bit key and the table has
//! 4^9 = 262144 entries.
//!
//! The table is built once by dynamic programming over the number of stones
//! the centre side has in the window: a window's shape is derived from the
//! shapes of the windows reachable by adding one more stone, so
//! "four" means one move from five, "open three" means one move from an open
//! four, and so on. All shapes only consider fives that pass through the
//! centre cell, which always lie inside the window.
//!
//! Scores use one decimal digit per shape (see [`crate::constants`]), so the
//! sum over the four axes of a cell decodes back into counts with
//! [`Threats::from_score`].

use crate::constants::{
    FIVE, FOUR, HALF_WINDOW, KEY_COUNT, OPEN_FOUR, OPEN_THREE, OPEN_TWO, OVERLINE, SLEEP_THREE,
    SLEEP_TWO, WIN_COUNT, WINDOW,
};
use crate::grid::{Cell, Side};

/// Rule set for a game.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Rules {
    /// Forbid overline, double-four and double-three for black.
    pub renju: bool,
}

impl Rules {
    pub const RENJU: Rules = Rules { renju: true };
    pub const FREE_STYLE: Rules = Rules { renju: false };

    /// Whether `side` is bound by the restricted-move rule.
    #[inline]
    pub fn restricts(self, side: Side) -> bool {
        self.renju && side == Side::Black
    }
}

impl Default for Rules {
    fn default() -> Self {
        Rules::RENJU
    }
}

/// Shape of a line around the centre stone, weakest first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Shape {
    /// Not a realizable window, or the centre is not a stone.
    Invalid,
    None,
    SleepTwo,
    OpenTwo,
    SleepThree,
    OpenThree,
    Four,
    /// Two separate completion points on one line, e.g. `X.XXX.X`.
    DoubleFour,
    OpenFour,
    Five,
    Overline,
}

impl Shape {
    fn score(self) -> i32 {
        match self {
            Shape::Invalid | Shape::None => 0,
            Shape::SleepTwo => SLEEP_TWO,
            Shape::OpenTwo => OPEN_TWO,
            Shape::SleepThree => SLEEP_THREE,
            Shape::OpenThree => OPEN_THREE,
            Shape::Four => FOUR,
            Shape::DoubleFour => 2 * FOUR,
            Shape::OpenFour => OPEN_FOUR,
            Shape::Five => FIVE,
            Shape::Overline => OVERLINE,
        }
    }
}

/// Lookup from window key to score.
///
/// Immutable after construction; share it with `Arc`.
pub struct LinePatternTable {
    scores: Box<[i32]>,
    rules: Rules,
}

impl LinePatternTable {
    /// Build the table for the given rules.
    pub fn new(rules: Rules) -> Self {
        let scores = build_shapes(rules).iter().map(|s| s.score()).collect();
        Self { scores, rules }
    }

    /// Score of a window key.
    #[inline]
    pub fn lookup(&self, key: usize) -> i32 {
        self.scores[key]
    }

    #[inline]
    pub fn rules(&self) -> Rules {
        self.rules
    }
}

impl std::fmt::Debug for LinePatternTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinePatternTable")
            .field("rules", &self.rules)
            .field("entries", &self.scores.len())
            .finish()
    }
}

/// Decoded per-pattern counts of a cell score.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Threats {
    pub overline: u8,
    pub five: u8,
    pub open_four: u8,
    pub four: u8,
    pub open_three: u8,
    pub sleep_three: u8,
    pub open_two: u8,
    pub sleep_two: u8,
}

impl Threats {
    /// Decode a (non-negative) cell score. Occupied-cell sentinels decode to
    /// no threats at all.
    pub fn from_score(score: i32) -> Self {
        if score <= 0 {
            return Threats::default();
        }
        let digit = |unit: i32| ((score / unit) % 10) as u8;
        Threats {
            overline: (score / OVERLINE) as u8,
            five: digit(FIVE),
            open_four: digit(OPEN_FOUR),
            four: digit(FOUR),
            open_three: digit(OPEN_THREE),
            sleep_three: digit(SLEEP_THREE),
            open_two: digit(OPEN_TWO),
            sleep_two: digit(SLEEP_TWO),
        }
    }

    /// Lines on which this cell makes a four (open or not).
    #[inline]
    pub fn four_lines(&self) -> u8 {
        self.open_four + self.four
    }

    /// An open four or two fours: wins unless the opponent makes five first.
    #[inline]
    pub fn is_winning_four(&self) -> bool {
        self.open_four > 0 || self.four >= 2
    }

    #[inline]
    pub fn is_four_three(&self) -> bool {
        self.four > 0 && self.open_three > 0
    }

    /// Overline, double four or double open three without a five.
    ///
    /// This reads the composed score only, so rare shapes (a three whose
    /// completion point is itself forbidden) are not told apart.
    #[inline]
    pub fn is_restricted(&self) -> bool {
        self.five == 0 && (self.overline > 0 || self.four_lines() >= 2 || self.open_three >= 2)
    }
}

/// Cell stored at window index `i`.
#[inline]
pub fn cell_at(key: usize, i: usize) -> Cell {
    Cell::from_code(key >> (2 * i))
}

/// `key` with window index `i` replaced by `cell`.
#[inline]
pub fn with_cell(key: usize, i: usize, cell: Cell) -> usize {
    (key & !(3 << (2 * i))) | (cell.code() << (2 * i))
}

/// The window read in the opposite direction.
pub fn mirror(key: usize) -> usize {
    (0..WINDOW).fold(0, |acc, i| acc | (cell_at(key, i).code() << (2 * (WINDOW - 1 - i))))
}

/// Whether a key can occur on a real board: the centre holds a stone and
/// off-board cells only appear as a contiguous tail at either end.
fn is_realizable(key: usize) -> bool {
    if cell_at(key, HALF_WINDOW).side().is_none() {
        return false;
    }
    let half_ok = |indices: &mut dyn Iterator<Item = usize>| {
        let mut off = false;
        for i in indices {
            match (off, cell_at(key, i) == Cell::OffBoard) {
                (false, true) => off = true,
                (true, false) => return false,
                _ => {}
            }
        }
        true
    };
    half_ok(&mut (0..HALF_WINDOW).rev()) && half_ok(&mut (HALF_WINDOW + 1..WINDOW))
}

/// Stones of `stone` contiguous with the centre on the (left, right).
fn run_through_center(key: usize, stone: Cell) -> (usize, usize) {
    let left = (0..HALF_WINDOW)
        .rev()
        .take_while(|&i| cell_at(key, i) == stone)
        .count();
    let right = (HALF_WINDOW + 1..WINDOW)
        .take_while(|&i| cell_at(key, i) == stone)
        .count();
    (left, right)
}

/// Shapes for every key, filled from the fullest windows downwards.
fn build_shapes(rules: Rules) -> Vec<Shape> {
    let mut shapes = vec![Shape::Invalid; KEY_COUNT];

    for side in Side::BOTH {
        let stone = side.stone();
        let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); WINDOW + 1];
        for key in 0..KEY_COUNT {
            if cell_at(key, HALF_WINDOW) == stone && is_realizable(key) {
                let stones = (0..WINDOW).filter(|&i| cell_at(key, i) == stone).count();
                buckets[stones].push(key);
            }
        }

        let restricted = rules.restricts(side);
        for bucket in buckets.iter().rev() {
            for &key in bucket {
                shapes[key] = classify(key, stone, restricted, &shapes);
            }
        }
    }

    shapes
}

/// Classify one window. Every window with one more `stone` must already be
/// classified.
fn classify(key: usize, stone: Cell, restricted: bool, shapes: &[Shape]) -> Shape {
    let (left, right) = run_through_center(key, stone);
    let run = left + right + 1;
    if run > WIN_COUNT {
        return if restricted { Shape::Overline } else { Shape::Five };
    }
    if run == WIN_COUNT {
        return Shape::Five;
    }

    let mut five_points = [false; WINDOW];
    let mut fives = 0;
    let mut best = Shape::None;
    for i in (0..WINDOW).filter(|&i| cell_at(key, i) == Cell::Empty) {
        match shapes[with_cell(key, i, stone)] {
            Shape::Five => {
                five_points[i] = true;
                fives += 1;
            }
            Shape::Overline | Shape::Invalid => {}
            next => best = best.max(next),
        }
    }

    if fives >= 2 {
        // Both ends of a solid four complete it: `.XXXX.`
        let open = run == WIN_COUNT - 1
            && five_points[HALF_WINDOW - left - 1]
            && five_points[HALF_WINDOW + right + 1];
        return if open { Shape::OpenFour } else { Shape::DoubleFour };
    }
    if fives == 1 {
        return Shape::Four;
    }

    match best {
        Shape::OpenFour => Shape::OpenThree,
        Shape::Four | Shape::DoubleFour => Shape::SleepThree,
        Shape::OpenThree => Shape::OpenTwo,
        Shape::SleepThree => Shape::SleepTwo,
        _ => Shape::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    static RENJU: OnceLock<LinePatternTable> = OnceLock::new();
    static FREE: OnceLock<LinePatternTable> = OnceLock::new();

    fn renju() -> &'static LinePatternTable {
        RENJU.get_or_init(|| LinePatternTable::new(Rules::RENJU))
    }

    fn free() -> &'static LinePatternTable {
        FREE.get_or_init(|| LinePatternTable::new(Rules::FREE_STYLE))
    }

    /// Build a key from a 9-character window:
    /// `X` black, `O` white, `.` empty, `#` off board.
    fn key(src: &str) -> usize {
        assert_eq!(src.len(), WINDOW);
        src.bytes().enumerate().fold(0, |acc, (i, c)| {
            let cell = match c {
                b'X' => Cell::Black,
                b'O' => Cell::White,
                b'#' => Cell::OffBoard,
                _ => Cell::Empty,
            };
            acc | (cell.code() << (2 * i))
        })
    }

    #[test]
    fn test_five_and_overline() {
        assert_eq!(renju().lookup(key("..XXXXX..")), FIVE);
        assert_eq!(renju().lookup(key("..XXXXXX.")), OVERLINE);
        assert_eq!(free().lookup(key("..XXXXXX.")), FIVE);
        assert_eq!(renju().lookup(key("..OOOOOO.")), FIVE);
    }

    #[test]
    fn test_fours() {
        assert_eq!(renju().lookup(key(".XXXX....")), OPEN_FOUR);
        assert_eq!(renju().lookup(key("OXXXX....")), FOUR);
        assert_eq!(renju().lookup(key("..X.XXX..")), FOUR);
        assert_eq!(renju().lookup(key("X.XXX.X..")), 2 * FOUR);
        // Edge of the board closes the four.
        assert_eq!(renju().lookup(key("#XXXX....")), FOUR);
    }

    #[test]
    fn test_overline_completion_is_not_a_four_for_black() {
        // The left gap would make six; only the right gap makes exactly five.
        assert_eq!(renju().lookup(key("X.XXXX...")), FOUR);
        assert_eq!(free().lookup(key("X.XXXX...")), OPEN_FOUR);
    }

    #[test]
    fn test_threes_and_twos() {
        assert_eq!(renju().lookup(key("...XXX...")), OPEN_THREE);
        assert_eq!(renju().lookup(key("..X.XX...")), OPEN_THREE);
        assert_eq!(renju().lookup(key("..OXXX...")), SLEEP_THREE);
        assert_eq!(renju().lookup(key("...XX....")), OPEN_TWO);
        assert_eq!(renju().lookup(key("..OXX....")), SLEEP_TWO);
        assert_eq!(renju().lookup(key("...OXO...")), 0);
    }

    #[test]
    fn test_unrealizable_keys_score_zero() {
        assert_eq!(renju().lookup(key("#.##X....")), 0);
        assert_eq!(renju().lookup(key("....#X...")), 0);
        assert_eq!(renju().lookup(key("....X.#..")), 0);
        assert_eq!(renju().lookup(key("..XX.XX..")), 0);
        assert_eq!(renju().lookup(key("####XX...")), SLEEP_TWO);
    }

    #[test]
    fn test_mirror_symmetry() {
        for table in [renju(), free()] {
            for k in 0..KEY_COUNT {
                assert_eq!(table.lookup(k), table.lookup(mirror(k)), "key {k:#x}");
            }
        }
    }

    #[test]
    fn test_threats_decode() {
        let t = Threats::from_score(OPEN_THREE * 2 + FOUR + SLEEP_TWO);
        assert_eq!(t.open_three, 2);
        assert_eq!(t.four, 1);
        assert_eq!(t.sleep_two, 1);
        assert!(t.is_four_three());
        assert!(t.is_restricted());
        assert!(!Threats::from_score(FIVE + OPEN_THREE * 2).is_restricted());
        assert!(Threats::from_score(OVERLINE).is_restricted());
        assert_eq!(Threats::from_score(-1), Threats::default());
    }
}
