//! Arena-allocated search tree.
//!
//! Nodes live in a single `Vec` and refer to each other by [`NodeId`].
//! Released nodes go on a free list and are reused by later allocations,
//! so their game states and child vectors keep their capacity across
//! searches.

use std::ops::{Index, IndexMut};

use crate::grid::Side;
use crate::position::GameState;

/// Index of a node in a [`NodePool`].
pub type NodeId = usize;

/// A node in the search tree.
#[derive(Clone)]
pub struct TreeNode {
    /// Position after `mv`.
    pub game: GameState,
    /// Move that led here (`None` for a fresh root).
    pub mv: Option<usize>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Candidate moves not yet expanded, best last.
    pub untried: Vec<usize>,
    /// Visits, counted when a simulation passes through.
    pub visits: u32,
    /// Rewards from the point of view of the side that played `mv`.
    pub wins: f32,
    /// `wins / visits`, cached.
    pub win_rate: f32,
    /// `sqrt(ln(visits))`, cached.
    pub explore_factor: f32,
}

impl TreeNode {
    fn new(game: GameState, mv: Option<usize>, parent: Option<NodeId>) -> Self {
        let mut node = Self {
            game,
            mv,
            parent,
            children: Vec::new(),
            untried: Vec::new(),
            visits: 0,
            wins: 0.0,
            win_rate: 0.0,
            explore_factor: 0.0,
        };
        node.fill_untried();
        node
    }

    fn reset(&mut self, mv: Option<usize>, parent: Option<NodeId>) {
        self.mv = mv;
        self.parent = parent;
        self.children.clear();
        self.visits = 0;
        self.wins = 0.0;
        self.win_rate = 0.0;
        self.explore_factor = 0.0;
        self.fill_untried();
    }

    /// Untried moves ordered by combined attack and defence score, so that
    /// `pop` yields the most promising one.
    fn fill_untried(&mut self) {
        self.untried.clear();
        self.untried.extend_from_slice(self.game.candidates());
        let board = self.game.board();
        let side = self.game.side();
        self.untried.sort_by_cached_key(|&id| {
            board.score(side, id).max(0) + board.score(side.opponent(), id).max(0)
        });
    }

    /// Side that played the move into this node.
    #[inline]
    pub fn mover(&self) -> Option<Side> {
        self.mv.map(|_| self.game.side().opponent())
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.game.is_over()
    }

    /// Refresh the cached rate and exploration factor.
    #[inline]
    pub fn refresh(&mut self) {
        if self.visits > 0 {
            let visits = self.visits as f32;
            self.win_rate = self.wins / visits;
            self.explore_factor = visits.ln().sqrt();
        } else {
            self.win_rate = 0.0;
            self.explore_factor = 0.0;
        }
    }

    /// Accumulated reward from the point of view of `side`.
    pub fn value_for(&self, side: Side) -> f32 {
        match self.mover() {
            Some(mover) if mover != side => self.visits as f32 - self.wins,
            _ => self.wins,
        }
    }
}

/// Node storage with a free list.
#[derive(Default)]
pub struct NodePool {
    nodes: Vec<TreeNode>,
    free: Vec<NodeId>,
}

impl NodePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes currently in use.
    #[inline]
    pub fn live(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Nodes ever allocated, live or free.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Allocate a root node holding a copy of `game`.
    pub fn alloc_root(&mut self, game: &GameState) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                let node = &mut self.nodes[id];
                node.game.clone_from(game);
                node.reset(None, None);
                id
            }
            None => {
                self.nodes.push(TreeNode::new(game.clone(), None, None));
                self.nodes.len() - 1
            }
        }
    }

    /// Allocate a child of `parent` reached by playing `mv`, and link it.
    ///
    /// Returns `None` if the move is refused by the parent's position.
    pub fn alloc_child(&mut self, parent: NodeId, mv: usize) -> Option<NodeId> {
        let id = match self.free.pop() {
            Some(id) => {
                let (child, source) = self.pair_mut(id, parent);
                child.game.clone_from(&source.game);
                id
            }
            None => {
                let game = self.nodes[parent].game.clone();
                self.nodes.push(TreeNode::new(game, None, None));
                self.nodes.len() - 1
            }
        };

        if let Err(err) = self.nodes[id].game.apply_move(mv) {
            log::warn!("cannot expand move {mv}: {err}");
            self.free.push(id);
            return None;
        }
        self.nodes[id].reset(Some(mv), Some(parent));
        self.nodes[parent].children.push(id);
        Some(id)
    }

    /// Mutable access to two distinct nodes.
    fn pair_mut(&mut self, a: NodeId, b: NodeId) -> (&mut TreeNode, &mut TreeNode) {
        debug_assert_ne!(a, b);
        if a < b {
            let (lo, hi) = self.nodes.split_at_mut(b);
            (&mut lo[a], &mut hi[0])
        } else {
            let (lo, hi) = self.nodes.split_at_mut(a);
            (&mut hi[0], &mut lo[b])
        }
    }

    /// Unlink `id` from its parent, making it a root.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent.take() {
            self.nodes[parent].children.retain(|&c| c != id);
        }
    }

    /// Return `root` and all its descendants to the free list.
    pub fn release(&mut self, root: NodeId) {
        self.detach(root);
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = &mut self.nodes[id];
            stack.extend_from_slice(&node.children);
            node.children.clear();
            node.parent = None;
            self.free.push(id);
        }
    }

    /// Release every node.
    pub fn clear(&mut self) {
        self.free.clear();
        self.free.extend((0..self.nodes.len()).rev());
        for node in &mut self.nodes {
            node.children.clear();
            node.parent = None;
        }
    }
}

impl Index<NodeId> for NodePool {
    type Output = TreeNode;

    #[inline]
    fn index(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id]
    }
}

impl IndexMut<NodeId> for NodePool {
    #[inline]
    fn index_mut(&mut self, id: NodeId) -> &mut TreeNode {
        &mut self.nodes[id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::Rules;
    use crate::position::parse_move;

    fn game() -> GameState {
        let mut game = GameState::with_rules(Rules::RENJU);
        game.apply_move(parse_move("H8").unwrap()).unwrap();
        game
    }

    #[test]
    fn test_alloc_child_links_and_applies_move() {
        let mut pool = NodePool::new();
        let root = pool.alloc_root(&game());
        let mv = *pool[root].untried.last().unwrap();
        let child = pool.alloc_child(root, mv).unwrap();

        assert_eq!(pool[root].children, vec![child]);
        assert_eq!(pool[child].parent, Some(root));
        assert_eq!(pool[child].mv, Some(mv));
        assert_eq!(pool[child].game.last_move(), Some(mv));
        assert_eq!(pool[child].mover(), Some(Side::White));
        assert_eq!(pool[root].mover(), None);
    }

    #[test]
    fn test_refused_move_is_not_linked() {
        let mut pool = NodePool::new();
        let root = pool.alloc_root(&game());
        assert_eq!(pool.alloc_child(root, parse_move("H8").unwrap()), None);
        assert!(pool[root].children.is_empty());
        assert_eq!(pool.live(), 1);
    }

    #[test]
    fn test_release_recycles_subtree() {
        let mut pool = NodePool::new();
        let root = pool.alloc_root(&game());
        let moves: Vec<usize> = pool[root].untried.iter().rev().take(3).copied().collect();
        let mut children = Vec::new();
        for mv in moves {
            children.push(pool.alloc_child(root, mv).unwrap());
        }
        let grand_mv = pool[children[0]].untried[0];
        pool.alloc_child(children[0], grand_mv).unwrap();
        assert_eq!(pool.live(), 5);

        pool.release(children[0]);
        assert_eq!(pool.live(), 3);
        assert_eq!(pool[root].children.len(), 2);

        let capacity = pool.capacity();
        let mv = pool[root].untried[0];
        pool.alloc_child(root, mv).unwrap();
        assert_eq!(pool.capacity(), capacity);

        pool.release(root);
        assert_eq!(pool.live(), 0);
    }

    #[test]
    fn test_untried_is_ordered_best_last() {
        let mut game = GameState::with_rules(Rules::RENJU);
        for mv in ["H6", "A1", "H7", "A3", "H8"] {
            game.apply_move(parse_move(mv).unwrap()).unwrap();
        }
        let mut pool = NodePool::new();
        let root = pool.alloc_root(&game);
        let node = &pool[root];
        let best = *node.untried.last().unwrap();
        let board = node.game.board();
        assert!(node.untried.iter().all(|&id| {
            board.score(Side::Black, id) + board.score(Side::White, id)
                <= board.score(Side::Black, best) + board.score(Side::White, best)
        }));
    }
}
