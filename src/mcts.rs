//! Monte Carlo Tree Search.
//!
//! This module implements a time-bounded, multi-threaded MCTS:
//! - UCB1 selection on the mover's win rate
//! - Progressive widening: a node gains a child every `expand_visits` visits
//! - Candidate moves ordered by threat score, so the best is expanded first
//! - Random rollouts over the board's candidate lists
//!
//! Worker threads share one tree behind a mutex. Selection and expansion
//! happen under the lock; rollouts run outside it on a per-thread copy of
//! the leaf position. A visit is counted during selection, so concurrent
//! workers spread over different paths, and the reward is added during
//! backpropagation.
//!
//! After a search the chosen child is kept as the next root. If the next
//! search starts from a position one or two moves further along that line,
//! the matching subtree is reused.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::constants::{
    DUMP_DEPTH, DUMP_WIDTH, EXPAND_VISITS, EXPLORATION, OVERTIME_FACTOR, ROLLOUT_STEPS,
    TIME_BUDGET,
};
use crate::grid::Side;
use crate::playout::rollout;
use crate::position::{GameState, format_move};
use crate::tree::{NodeId, NodePool};

/// Tree moves a reused root may lag behind the new position.
const MAX_REUSE_DEPTH: usize = 2;

/// Search parameters.
#[derive(Clone, Debug)]
pub struct SearchConfig {
    /// Wall-clock budget before the search may stop.
    pub time_budget: Duration,
    /// Worker threads.
    pub threads: usize,
    /// UCB1 exploration constant.
    pub exploration: f32,
    /// Visits per existing child before another child is expanded.
    pub expand_visits: u32,
    /// Move cap for a single rollout.
    pub rollout_steps: usize,
    /// Hard stop at `overtime_factor * time_budget`.
    pub overtime_factor: u32,
    /// Stop after this many simulations regardless of time.
    pub max_simulations: Option<u64>,
    /// Seed for the worker RNGs. Random when `None`.
    pub seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            time_budget: TIME_BUDGET,
            threads: thread::available_parallelism().map_or(1, |n| n.get()),
            exploration: EXPLORATION,
            expand_visits: EXPAND_VISITS,
            rollout_steps: ROLLOUT_STEPS,
            overtime_factor: OVERTIME_FACTOR,
            max_simulations: None,
            seed: None,
        }
    }
}

impl SearchConfig {
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn with_exploration(mut self, exploration: f32) -> Self {
        self.exploration = exploration;
        self
    }

    pub fn with_max_simulations(mut self, simulations: u64) -> Self {
        self.max_simulations = Some(simulations);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn hard_limit(&self) -> Duration {
        self.time_budget * self.overtime_factor.max(1)
    }
}

/// Summary of the last search.
#[derive(Clone, Debug, Default)]
pub struct SearchStats {
    pub best_move: Option<usize>,
    /// Win rate of the chosen move for the side that searched.
    pub win_rate: f32,
    pub simulations: u64,
    /// Root visits carried over from the previous search.
    pub reused_visits: u32,
    pub elapsed: Duration,
    pub live_nodes: usize,
}

/// Tree shared by the workers of one search.
struct SearchTree {
    pool: NodePool,
    root: NodeId,
    started: u64,
}

impl SearchTree {
    fn visit(&mut self, id: NodeId) {
        let node = &mut self.pool[id];
        node.visits += 1;
        node.refresh();
    }

    /// Walk from the root to a node to roll out from, expanding one child
    /// on the way when the widening rule allows it.
    fn select(&mut self, config: &SearchConfig) -> NodeId {
        self.started += 1;
        let mut id = self.root;
        loop {
            self.visit(id);
            let node = &self.pool[id];
            if node.is_terminal() {
                return id;
            }

            let widen = node.children.is_empty()
                || node.visits >= config.expand_visits * node.children.len() as u32;
            if widen && let Some(child) = self.expand(id) {
                self.visit(child);
                return child;
            }

            match self.best_child(id, config.exploration) {
                Some(child) => id = child,
                None => return id,
            }
        }
    }

    fn expand(&mut self, id: NodeId) -> Option<NodeId> {
        while let Some(mv) = self.pool[id].untried.pop() {
            if let Some(child) = self.pool.alloc_child(id, mv) {
                return Some(child);
            }
        }
        None
    }

    /// Child maximising `win_rate + c * sqrt(ln N) / sqrt(n)`.
    fn best_child(&self, id: NodeId, exploration: f32) -> Option<NodeId> {
        let node = &self.pool[id];
        let factor = exploration * node.explore_factor;
        let ucb = |child: NodeId| {
            let c = &self.pool[child];
            if c.visits == 0 {
                f32::INFINITY
            } else {
                c.win_rate + factor / (c.visits as f32).sqrt()
            }
        };
        node.children
            .iter()
            .copied()
            .max_by(|&a, &b| ucb(a).total_cmp(&ucb(b)))
    }

    /// Add `reward` (for `side`) to every node from `leaf` up to the root.
    fn backpropagate(&mut self, leaf: NodeId, side: Side, reward: f32) {
        let mut current = Some(leaf);
        while let Some(id) = current {
            let node = &mut self.pool[id];
            node.wins += match node.mover() {
                Some(mover) if mover != side => 1.0 - reward,
                _ => reward,
            };
            node.refresh();
            current = node.parent;
        }
    }

    fn most_visited(&self) -> Option<NodeId> {
        self.pool[self.root]
            .children
            .iter()
            .copied()
            .max_by_key(|&c| self.pool[c].visits)
    }

    fn best_rated(&self) -> Option<NodeId> {
        self.pool[self.root]
            .children
            .iter()
            .copied()
            .max_by(|&a, &b| self.pool[a].win_rate.total_cmp(&self.pool[b].win_rate))
    }

    /// The most visited child is also the best rated one.
    fn is_stable(&self) -> bool {
        matches!((self.most_visited(), self.best_rated()), (Some(a), Some(b)) if a == b)
    }

    fn should_stop(&self, config: &SearchConfig, elapsed: Duration) -> bool {
        if config.max_simulations.is_some_and(|cap| self.started >= cap) {
            return true;
        }
        elapsed >= config.time_budget && (elapsed >= config.hard_limit() || self.is_stable())
    }

    /// Indented listing of the most visited lines.
    fn dump(&self, side: Side) -> String {
        let mut out = String::new();
        self.dump_node(self.root, side, 0, &mut out);
        out
    }

    fn dump_node(&self, id: NodeId, side: Side, depth: usize, out: &mut String) {
        let node = &self.pool[id];
        let mv = node.mv.map_or_else(|| "root".to_string(), format_move);
        let _ = writeln!(
            out,
            "{:indent$}{mv} visits: {}, value: {:.1}, rate: {:.4}, children: {}",
            "",
            node.visits,
            node.value_for(side),
            node.win_rate,
            node.children.len(),
            indent = depth * 2
        );
        if depth >= DUMP_DEPTH {
            return;
        }
        let mut children = node.children.clone();
        children.sort_by_key(|&c| std::cmp::Reverse(self.pool[c].visits));
        for child in children.into_iter().take(DUMP_WIDTH) {
            self.dump_node(child, side, depth + 1, out);
        }
    }
}

/// Search engine. Keeps its node pool and the subtree of its last answer
/// between calls.
pub struct Mcts {
    config: SearchConfig,
    pool: NodePool,
    retained: Option<NodeId>,
    rng: fastrand::Rng,
    stats: SearchStats,
}

impl Mcts {
    pub fn new(config: SearchConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        Self {
            config,
            pool: NodePool::new(),
            retained: None,
            rng,
            stats: SearchStats::default(),
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn last_stats(&self) -> &SearchStats {
        &self.stats
    }

    /// Drop the retained subtree.
    pub fn reset(&mut self) {
        self.retained = None;
        self.pool.clear();
    }

    /// Like [`Mcts::search`] with a one-off time budget.
    pub fn search_within(&mut self, game: &GameState, budget: Duration) -> Option<usize> {
        let saved = std::mem::replace(&mut self.config.time_budget, budget);
        let mv = self.search(game);
        self.config.time_budget = saved;
        mv
    }

    /// Best move for the side to move in `game`, or `None` if the game is
    /// over.
    pub fn search(&mut self, game: &GameState) -> Option<usize> {
        let start = Instant::now();
        if game.is_over() {
            self.reset();
            return None;
        }
        if let [only] = game.candidates() {
            log::info!("forced move {}", format_move(*only));
            self.reset();
            self.stats = SearchStats {
                best_move: Some(*only),
                elapsed: start.elapsed(),
                ..SearchStats::default()
            };
            return Some(*only);
        }

        let side = game.side();
        let root = self.prepare_root(game);
        let reused_visits = self.pool[root].visits;
        let shared = Mutex::new(SearchTree {
            pool: std::mem::take(&mut self.pool),
            root,
            started: 0,
        });

        let seeds: Vec<u64> = (0..self.config.threads.max(1))
            .map(|_| self.rng.u64(..))
            .collect();
        let simulations = AtomicU64::new(0);
        let config = &self.config;
        thread::scope(|scope| {
            for &seed in &seeds {
                let shared = &shared;
                let simulations = &simulations;
                scope.spawn(move || run_worker(shared, config, game, start, seed, simulations));
            }
        });

        let tree = shared.into_inner();
        if log::log_enabled!(log::Level::Debug) {
            log::debug!("search tree:\n{}", tree.dump(side));
        }

        let chosen = tree.most_visited();
        let best_move = chosen.and_then(|c| tree.pool[c].mv);
        let win_rate = chosen.map_or(0.0, |c| tree.pool[c].win_rate);

        self.pool = tree.pool;
        match chosen {
            Some(child) => {
                self.pool.detach(child);
                self.pool.release(root);
                self.retained = Some(child);
            }
            None => {
                self.pool.release(root);
                self.retained = None;
            }
        }

        self.stats = SearchStats {
            best_move,
            win_rate,
            simulations: simulations.into_inner(),
            reused_visits,
            elapsed: start.elapsed(),
            live_nodes: self.pool.live(),
        };
        log::info!(
            "{side} plays {} after {} simulations in {:.2?} (win rate {:.3}, reused {} visits)",
            best_move.map_or_else(|| "-".to_string(), format_move),
            self.stats.simulations,
            self.stats.elapsed,
            win_rate,
            reused_visits,
        );

        // Fall back to the top candidate if nothing was expanded in time.
        best_move.or_else(|| game.candidates().first().copied())
    }

    /// Root for a search from `game`: the retained subtree when it leads to
    /// `game`, otherwise a fresh node.
    fn prepare_root(&mut self, game: &GameState) -> NodeId {
        if let Some(old) = self.retained.take() {
            if let Some(root) = self.reuse(old, game) {
                log::trace!("reusing subtree with {} visits", self.pool[root].visits);
                return root;
            }
            self.pool.release(old);
        }
        self.pool.alloc_root(game)
    }

    /// Walk from `old` along the moves `game` has played since, returning
    /// the matching node detached from the rest of the old tree.
    fn reuse(&mut self, old: NodeId, game: &GameState) -> Option<NodeId> {
        let old_game = &self.pool[old].game;
        if !std::sync::Arc::ptr_eq(old_game.board().table(), game.board().table()) {
            return None;
        }
        let known = old_game.history();
        let history = game.history();
        if history.len() < known.len()
            || history.len() - known.len() > MAX_REUSE_DEPTH
            || history[..known.len()] != *known
        {
            return None;
        }

        let mut node = old;
        for &mv in &history[known.len()..] {
            node = self.pool[node]
                .children
                .iter()
                .copied()
                .find(|&c| self.pool[c].mv == Some(mv))?;
        }
        if node != old {
            self.pool.detach(node);
            self.pool.release(old);
        }
        Some(node)
    }
}

fn run_worker(
    shared: &Mutex<SearchTree>,
    config: &SearchConfig,
    root_game: &GameState,
    start: Instant,
    seed: u64,
    simulations: &AtomicU64,
) {
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut scratch = root_game.clone();
    let side = root_game.side();

    loop {
        let leaf = {
            let mut tree = shared.lock();
            if tree.should_stop(config, start.elapsed()) {
                break;
            }
            let leaf = tree.select(config);
            scratch.clone_from(&tree.pool[leaf].game);
            leaf
        };

        let reward = rollout(&mut scratch, &mut rng, side, config.rollout_steps);
        shared.lock().backpropagate(leaf, side, reward);
        simulations.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::Rules;
    use crate::position::parse_move;

    fn setup(moves: &[&str]) -> GameState {
        let mut game = GameState::with_rules(Rules::RENJU);
        for mv in moves {
            game.apply_move(parse_move(mv).unwrap()).unwrap();
        }
        game
    }

    fn engine(simulations: u64) -> Mcts {
        Mcts::new(
            SearchConfig::default()
                .with_time_budget(Duration::from_secs(30))
                .with_threads(1)
                .with_max_simulations(simulations)
                .with_seed(42),
        )
    }

    /// Every expanded non-terminal node has at least as many visits as its
    /// children together.
    fn assert_visit_sums(pool: &NodePool, id: NodeId) {
        let node = &pool[id];
        let sum: u32 = node.children.iter().map(|&c| pool[c].visits).sum();
        assert!(sum <= node.visits, "children visited {sum} > {}", node.visits);
        for &child in &node.children {
            assert_eq!(pool[child].parent, Some(id));
            assert_visit_sums(pool, child);
        }
    }

    /// Run `n` simulations on a fresh tree in the calling thread.
    fn grow_tree(game: &GameState, n: usize) -> SearchTree {
        let mut pool = NodePool::new();
        let root = pool.alloc_root(game);
        let mut tree = SearchTree { pool, root, started: 0 };
        let config = SearchConfig::default();
        let mut rng = fastrand::Rng::with_seed(5);
        let mut scratch = game.clone();
        for _ in 0..n {
            let leaf = tree.select(&config);
            scratch.clone_from(&tree.pool[leaf].game);
            let reward = rollout(&mut scratch, &mut rng, game.side(), config.rollout_steps);
            tree.backpropagate(leaf, game.side(), reward);
        }
        tree
    }

    #[test]
    fn test_children_visits_account_for_parent() {
        let game = setup(&["H8", "I9", "G9"]);
        let tree = grow_tree(&game, 300);

        let root = &tree.pool[tree.root];
        assert_eq!(root.visits, 300);
        let sum: u32 = root.children.iter().map(|&c| tree.pool[c].visits).sum();
        assert_eq!(sum, root.visits);

        let mut stack = root.children.clone();
        while let Some(id) = stack.pop() {
            let node = &tree.pool[id];
            let sum: u32 = node.children.iter().map(|&c| tree.pool[c].visits).sum();
            if node.is_terminal() {
                assert_eq!(sum, 0);
            } else {
                assert_eq!(sum, node.visits - 1);
            }
            stack.extend_from_slice(&node.children);
        }
    }

    #[test]
    fn test_win_rates_stay_in_range() {
        let tree = grow_tree(&setup(&["H8", "H9"]), 200);
        let mut stack = vec![tree.root];
        while let Some(id) = stack.pop() {
            let node = &tree.pool[id];
            assert!((0.0..=1.0).contains(&node.win_rate));
            assert!(node.wins <= node.visits as f32);
            stack.extend_from_slice(&node.children);
        }
        assert!(!tree.dump(Side::Black).is_empty());
    }

    #[test]
    fn test_search_on_finished_game() {
        let game = setup(&["H4", "A1", "H5", "A3", "H6", "A5", "H7", "A7", "H8"]);
        assert_eq!(engine(10).search(&game), None);
    }

    #[test]
    fn test_search_takes_forced_block() {
        // Black closed four H5..H8 (H4 taken by white): white must play H9.
        let game = setup(&["H5", "H4", "H6", "A1", "H7", "A3", "H8"]);
        let mut mcts = engine(200);
        assert_eq!(mcts.search(&game), parse_move("H9"));
        assert_eq!(mcts.last_stats().simulations, 0);
    }

    #[test]
    fn test_search_completes_own_five() {
        let game = setup(&["H4", "A1", "H5", "A3", "H6", "A5", "H7", "A7"]);
        let mv = engine(50).search(&game).unwrap();
        assert!(mv == parse_move("H3").unwrap() || mv == parse_move("H8").unwrap());
    }

    #[test]
    fn test_search_blocks_open_three() {
        // Black open three on row H; white must take an end or lose.
        let game = setup(&["H6", "A1", "H7", "Af", "H8"]);
        let mut mcts = engine(3000);
        let mv = mcts.search(&game).unwrap();
        let blocks = ["H5", "H9", "H4", "Ha"].map(|s| parse_move(s).unwrap());
        assert!(blocks.contains(&mv), "unexpected reply {}", format_move(mv));
    }

    #[test]
    fn test_visit_sums_and_reuse() {
        let game = setup(&["H8", "H9"]);
        let mut mcts = engine(400);
        let reply = mcts.search(&game).unwrap();

        let retained = mcts.retained.unwrap();
        assert_eq!(mcts.pool[retained].mv, Some(reply));
        assert_eq!(mcts.pool[retained].parent, None);
        assert_visit_sums(&mcts.pool, retained);
        let kept_visits = mcts.pool[retained].visits;
        assert!(kept_visits > 0);

        // Continue along the retained line with one more move.
        let mut next = game.clone();
        next.apply_move(reply).unwrap();
        let opponent = next.candidates()[0];
        next.apply_move(opponent).unwrap();

        let expected = mcts.pool[retained]
            .children
            .iter()
            .find(|&&c| mcts.pool[c].mv == Some(opponent))
            .map(|&c| mcts.pool[c].visits)
            .unwrap_or(0);
        mcts.search(&next).unwrap();
        assert_eq!(mcts.last_stats().reused_visits, expected);
    }

    #[test]
    fn test_unrelated_position_discards_tree() {
        let mut mcts = engine(200);
        mcts.search(&setup(&["H8", "H9"])).unwrap();
        mcts.search(&setup(&["A1", "O1"])).unwrap();
        assert_eq!(mcts.last_stats().reused_visits, 0);
    }

    #[test]
    fn test_parallel_search_returns_candidate() {
        let game = setup(&["H8", "G9", "I9"]);
        let mut mcts = Mcts::new(
            SearchConfig::default()
                .with_time_budget(Duration::from_millis(200))
                .with_threads(4)
                .with_seed(9),
        );
        let mv = mcts.search(&game).unwrap();
        assert!(game.candidates().contains(&mv));
        assert!(mcts.last_stats().simulations > 0);

        let retained = mcts.retained.unwrap();
        assert_eq!(mcts.pool[retained].mv, Some(mv));
        assert_visit_sums(&mcts.pool, retained);
    }
}
