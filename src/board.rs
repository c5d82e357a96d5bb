//! Board state with incremental threat scores.
//!
//! For every empty cell the board keeps, per side, the sum over the four
//! axes of the line-pattern score the side would get by playing there.
//! Placing a stone only changes windows that contain it, so
//! [`Board::recompute_around`] walks at most 4 cells in each of the 8
//! directions and adds the difference between the window with and without
//! the new stone.
//!
//! After every placement [`Board::classify_all`] tags each empty cell with a
//! [`Category`] for the side to move and buckets it into a [`Tier`]. The most
//! urgent non-empty tier is the candidate set used by the search.

use std::sync::Arc;

use crate::constants::{BOARD_SIZE, CENTER, GRID_NUM, HALF_WINDOW, NEIGHBOUR_RADIUS, WINDOW};
use crate::grid::{AXES, Cell, DIRECTIONS, Side, step, to_coord, to_id};
use crate::patterns::{LinePatternTable, Rules, Threats, with_cell};

/// Tactical category of an empty cell, from the point of view of the side
/// to move. "Counter" categories describe what the opponent could do there.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Five,
    CounterFive,
    OpenFour,
    FourThree,
    CloseFour,
    CounterOpenFour,
    CounterFourThree,
    ThreeThree,
    CounterThreeThree,
    OpenThree,
    CounterOpenThree,
    TwoTwo,
    OpenTwo,
    Other,
    /// Forbidden for the side to move under the renju rule.
    Restricted,
}

impl Category {
    /// Classify a cell from the mover's and the opponent's decoded scores.
    pub fn classify(own: Threats, theirs: Threats, restricted: bool) -> Category {
        if restricted && own.is_restricted() {
            Category::Restricted
        } else if own.five > 0 {
            Category::Five
        } else if theirs.five > 0 {
            Category::CounterFive
        } else if own.is_winning_four() {
            Category::OpenFour
        } else if own.is_four_three() {
            Category::FourThree
        } else if own.four > 0 {
            Category::CloseFour
        } else if theirs.is_winning_four() {
            Category::CounterOpenFour
        } else if theirs.is_four_three() {
            Category::CounterFourThree
        } else if own.open_three >= 2 {
            Category::ThreeThree
        } else if theirs.open_three >= 2 {
            Category::CounterThreeThree
        } else if own.open_three > 0 {
            Category::OpenThree
        } else if theirs.open_three > 0 {
            Category::CounterOpenThree
        } else if own.open_two >= 2 {
            Category::TwoTwo
        } else if own.open_two > 0 {
            Category::OpenTwo
        } else {
            Category::Other
        }
    }

    /// Coarse tier, or `None` for cells that are never candidates.
    pub fn tier(self) -> Option<Tier> {
        match self {
            Category::Five | Category::CounterFive => Some(Tier::Highest),
            Category::OpenFour | Category::FourThree => Some(Tier::High),
            Category::CounterOpenFour | Category::CounterFourThree => Some(Tier::Middle),
            Category::CloseFour
            | Category::ThreeThree
            | Category::CounterThreeThree
            | Category::OpenThree
            | Category::CounterOpenThree
            | Category::TwoTwo
            | Category::OpenTwo => Some(Tier::Low),
            Category::Other => Some(Tier::Lowest),
            Category::Restricted => None,
        }
    }
}

/// Coarse priority buckets, most urgent first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Highest,
    High,
    Middle,
    Low,
    Lowest,
}

impl Tier {
    pub const ALL: [Tier; 5] = [Tier::Highest, Tier::High, Tier::Middle, Tier::Low, Tier::Lowest];
}

/// Stone grid plus per-side score maps and the derived classification.
pub struct Board {
    table: Arc<LinePatternTable>,
    cells: [Cell; GRID_NUM],
    /// `scores[side][id]`; occupied cells hold `-(stone code)`.
    scores: [[i32; GRID_NUM]; 2],
    /// Stones within `NEIGHBOUR_RADIUS` of each cell.
    neighbours: [u8; GRID_NUM],
    categories: [Option<Category>; GRID_NUM],
    tiers: [Vec<usize>; 5],
    key_grid: Option<usize>,
    mover: Side,
    stones: usize,
}

impl Clone for Board {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            cells: self.cells,
            scores: self.scores,
            neighbours: self.neighbours,
            categories: self.categories,
            tiers: self.tiers.clone(),
            key_grid: self.key_grid,
            mover: self.mover,
            stones: self.stones,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        if !Arc::ptr_eq(&self.table, &source.table) {
            self.table = Arc::clone(&source.table);
        }
        self.cells = source.cells;
        self.scores = source.scores;
        self.neighbours = source.neighbours;
        self.categories = source.categories;
        for (dst, src) in self.tiers.iter_mut().zip(&source.tiers) {
            dst.clone_from(src);
        }
        self.key_grid = source.key_grid;
        self.mover = source.mover;
        self.stones = source.stones;
    }
}

impl Board {
    pub fn new(table: Arc<LinePatternTable>) -> Self {
        let mut board = Self {
            table,
            cells: [Cell::Empty; GRID_NUM],
            scores: [[0; GRID_NUM]; 2],
            neighbours: [0; GRID_NUM],
            categories: [None; GRID_NUM],
            tiers: Default::default(),
            key_grid: None,
            mover: Side::Black,
            stones: 0,
        };
        board.clear();
        board
    }

    /// Empty the board and reclassify for black to move.
    pub fn clear(&mut self) {
        self.cells = [Cell::Empty; GRID_NUM];
        self.neighbours = [0; GRID_NUM];
        self.stones = 0;
        for side in Side::BOTH {
            for id in 0..GRID_NUM {
                self.scores[side.index()][id] = self.full_score(id, side);
            }
        }
        self.classify_all(Side::Black);
    }

    #[inline]
    pub fn table(&self) -> &Arc<LinePatternTable> {
        &self.table
    }

    #[inline]
    pub fn rules(&self) -> Rules {
        self.table.rules()
    }

    #[inline]
    pub fn get(&self, id: usize) -> Cell {
        self.cells[id]
    }

    #[inline]
    pub fn stones(&self) -> usize {
        self.stones
    }

    /// Stored score of `side` at `id`.
    #[inline]
    pub fn score(&self, side: Side, id: usize) -> i32 {
        self.scores[side.index()][id]
    }

    #[inline]
    pub fn threats(&self, side: Side, id: usize) -> Threats {
        Threats::from_score(self.score(side, id))
    }

    #[inline]
    pub fn category(&self, id: usize) -> Option<Category> {
        self.categories[id]
    }

    /// Forced move for the side to move: its own five, else the opponent's.
    #[inline]
    pub fn key_grid(&self) -> Option<usize> {
        self.key_grid
    }

    /// Side the current classification was computed for.
    #[inline]
    pub fn mover(&self) -> Side {
        self.mover
    }

    /// Window key of the 9 cells along `axis` centred on `id`, with the
    /// centre read as `center`.
    pub fn line_key(&self, id: usize, axis: usize, center: Cell) -> usize {
        let dir = AXES[axis];
        (0..WINDOW).fold(0, |key, i| {
            let offset = i as isize - HALF_WINDOW as isize;
            let cell = if offset == 0 {
                center
            } else {
                step(id, dir, offset).map_or(Cell::OffBoard, |q| self.cells[q])
            };
            key | (cell.code() << (2 * i))
        })
    }

    /// Score of `side` at `id` computed from scratch.
    pub fn full_score(&self, id: usize, side: Side) -> i32 {
        match self.cells[id] {
            Cell::Empty => (0..AXES.len())
                .map(|axis| self.table.lookup(self.line_key(id, axis, side.stone())))
                .sum(),
            stone => -(stone.code() as i32),
        }
    }

    /// Whether the stone at `id` is part of a winning five.
    pub fn is_win(&self, id: usize) -> bool {
        let stone = self.cells[id];
        stone.side().is_some()
            && (0..AXES.len()).any(|axis| {
                Threats::from_score(self.table.lookup(self.line_key(id, axis, stone))).five > 0
            })
    }

    /// Whether black's score at a cell marks a forbidden move.
    #[inline]
    pub fn is_restricted_move(&self, score: i32) -> bool {
        self.rules().renju && Threats::from_score(score).is_restricted()
    }

    /// Put a stone on an empty cell and update the scores around it.
    ///
    /// Returns the score `side` had at `id` before the placement.
    /// Does not reclassify; call [`Board::classify_all`] afterwards.
    pub fn place(&mut self, id: usize, side: Side) -> i32 {
        debug_assert_eq!(self.cells[id], Cell::Empty);
        let before = self.scores[side.index()][id];

        let stone = side.stone();
        self.cells[id] = stone;
        self.stones += 1;
        for s in Side::BOTH {
            self.scores[s.index()][id] = -(stone.code() as i32);
        }

        let (row, col) = to_coord(id);
        let r = NEIGHBOUR_RADIUS;
        for nr in row.saturating_sub(r)..=(row + r).min(BOARD_SIZE - 1) {
            for nc in col.saturating_sub(r)..=(col + r).min(BOARD_SIZE - 1) {
                self.neighbours[to_id(nr, nc)] += 1;
            }
        }

        self.recompute_around(id);
        before
    }

    /// Apply the score change caused by the stone now standing at `id` to
    /// every empty cell whose windows contain it.
    pub fn recompute_around(&mut self, id: usize) {
        for (d, &dir) in DIRECTIONS.iter().enumerate() {
            let axis = d % AXES.len();
            for k in 1..=HALF_WINDOW {
                let Some(q) = step(id, dir, k as isize) else {
                    break;
                };
                if self.cells[q] != Cell::Empty {
                    continue;
                }
                // Index of `id` inside the window centred on `q`.
                let slot = if d < AXES.len() { HALF_WINDOW - k } else { HALF_WINDOW + k };
                for side in Side::BOTH {
                    let with = self.line_key(q, axis, side.stone());
                    let without = with_cell(with, slot, Cell::Empty);
                    self.scores[side.index()][q] +=
                        self.table.lookup(with) - self.table.lookup(without);
                }
            }
        }
    }

    /// Recompute every empty cell's category and tier for `mover`.
    pub fn classify_all(&mut self, mover: Side) {
        self.mover = mover;
        self.key_grid = None;
        for tier in &mut self.tiers {
            tier.clear();
        }

        let rules = self.rules();
        let own_rule = rules.restricts(mover);
        let opponent = mover.opponent();
        let opponent_rule = rules.restricts(opponent);

        let mut five = None;
        let mut counter_five = None;
        let mut threats = Vec::new();

        for id in 0..GRID_NUM {
            if self.cells[id] != Cell::Empty {
                self.categories[id] = None;
                continue;
            }
            let own = self.threats(mover, id);
            let mut theirs = self.threats(opponent, id);
            if opponent_rule && theirs.is_restricted() {
                theirs = Threats::default();
            }

            let category = Category::classify(own, theirs, own_rule);
            self.categories[id] = Some(category);
            match category {
                Category::Five => {
                    five.get_or_insert(id);
                }
                Category::CounterFive => {
                    counter_five.get_or_insert(id);
                }
                _ => {}
            }
            if theirs.is_winning_four() || theirs.is_four_three() {
                threats.push(id);
            }

            match category.tier() {
                Some(Tier::Lowest) if self.neighbours[id] == 0 => {}
                Some(tier) => self.tiers[tier as usize].push(id),
                None => {}
            }
        }

        self.key_grid = five.or(counter_five);
        if !threats.is_empty() {
            self.extend_middle(&threats);
        }
    }

    /// When the opponent threatens an open four (or four-three), the answers
    /// are our own fours plus every cell that defuses one of the threats.
    fn extend_middle(&mut self, threats: &[usize]) {
        let mut marked = [false; GRID_NUM];
        for &id in &self.tiers[Tier::Middle as usize] {
            marked[id] = true;
        }

        let mut extra: Vec<usize> = self.tiers[Tier::Low as usize]
            .iter()
            .copied()
            .filter(|&id| self.categories[id] == Some(Category::CloseFour))
            .collect();
        for &threat in threats {
            extra.push(threat);
            self.find_other_grids(threat, &mut extra);
        }

        for id in extra {
            if !marked[id] && self.categories[id] != Some(Category::Restricted) {
                marked[id] = true;
                self.tiers[Tier::Middle as usize].push(id);
            }
        }
    }

    /// Empty cells on the lines through `threat` where a stone of the side
    /// to move would stop the opponent's threat at `threat`.
    fn find_other_grids(&self, threat: usize, out: &mut Vec<usize>) {
        let opponent = self.mover.opponent();
        let total = self.score(opponent, threat);

        for (axis, &dir) in AXES.iter().enumerate() {
            let key = self.line_key(threat, axis, opponent.stone());
            let axis_score = self.table.lookup(key);
            for offset in -(HALF_WINDOW as isize)..=HALF_WINDOW as isize {
                if offset == 0 {
                    continue;
                }
                let Some(r) = step(threat, dir, offset) else {
                    continue;
                };
                if self.cells[r] != Cell::Empty {
                    continue;
                }
                let slot = (HALF_WINDOW as isize + offset) as usize;
                let blocked = with_cell(key, slot, self.mover.stone());
                let after = Threats::from_score(total - axis_score + self.table.lookup(blocked));
                if !after.is_winning_four() && !after.is_four_three() {
                    out.push(r);
                }
            }
        }
    }

    /// Cells of one tier.
    #[inline]
    pub fn candidates_by_tier(&self, tier: Tier) -> &[usize] {
        &self.tiers[tier as usize]
    }

    /// Fill `out` with the moves worth considering: the forced cell if there
    /// is one, otherwise the most urgent non-empty tier.
    pub fn fill_candidates(&self, out: &mut Vec<usize>) {
        out.clear();
        if let Some(key) = self.key_grid {
            out.push(key);
            return;
        }
        if let Some(tier) = Tier::ALL
            .iter()
            .map(|&t| self.candidates_by_tier(t))
            .find(|cells| !cells.is_empty())
        {
            out.extend_from_slice(tier);
            return;
        }
        if self.stones == 0 {
            out.push(CENTER);
            return;
        }
        out.extend((0..GRID_NUM).filter(|&id| {
            self.categories[id].is_some_and(|c| c != Category::Restricted)
        }));
        if out.is_empty() {
            out.extend((0..GRID_NUM).filter(|&id| self.cells[id] == Cell::Empty));
        }
    }

    pub fn candidates(&self) -> Vec<usize> {
        let mut out = Vec::new();
        self.fill_candidates(&mut out);
        out
    }
}
