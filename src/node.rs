//! Tree nodes for perfect-information and information-set search.
//!
//! Both trees are stored arena-style: a `Vec` of nodes addressed by index, children owned by
//! their parent only in the sense that they are unreachable once the parent is dropped, parent
//! links a non-owning back-reference. This generalizes the teacher's `Tree<N, L>`
//! (`examples/pacman82-monte-carlo-tree-search/src/tree.rs`) from a fixed per-node child count to
//! the arbitrary number of legal turns (perfect info) or legal moves (information-set) a node may
//! have.

use std::collections::{BTreeMap, HashSet};

use crate::interpreter::{Interpreter, InterpreterError};
use crate::primitives::Turn;
use crate::valuation::PlayoutValuation;

/// Sentinel parent index for a root node, mirroring the teacher's `usize::MAX` convention.
pub const NO_PARENT: usize = usize::MAX;

/// A node of a perfect-information search tree: the state it represents, its children keyed by
/// the joint [`Turn`] that reaches them, and the valuation accumulated by rollouts through it.
#[derive(Debug, Clone)]
pub struct PerfectInfoNode<I: Interpreter> {
    parent: usize,
    state: I::State,
    depth: u32,
    children: BTreeMap<Turn<I::Role, I::Move>, usize>,
    valuation: PlayoutValuation<I::Role>,
    expanded: bool,
}

impl<I: Interpreter> PerfectInfoNode<I> {
    fn root(state: I::State) -> Self {
        Self {
            parent: NO_PARENT,
            state,
            depth: 0,
            children: BTreeMap::new(),
            valuation: PlayoutValuation::empty(),
            expanded: false,
        }
    }

    pub fn state(&self) -> &I::State {
        &self.state
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn parent(&self) -> Option<usize> {
        (self.parent != NO_PARENT).then_some(self.parent)
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn valuation(&self) -> &PlayoutValuation<I::Role> {
        &self.valuation
    }

    pub fn children(&self) -> impl ExactSizeIterator<Item = (&Turn<I::Role, I::Move>, usize)> {
        self.children.iter().map(|(turn, &idx)| (turn, idx))
    }

    pub fn child(&self, turn: &Turn<I::Role, I::Move>) -> Option<usize> {
        self.children.get(turn).copied()
    }
}

/// An arena of [`PerfectInfoNode`]s. Index `0` is always the current root; [`Self::rebase`]
/// replaces the whole arena with the subtree rooted at one of the root's children, preserving
/// that subtree's accumulated statistics.
#[derive(Debug, Clone)]
pub struct PerfectInfoTree<I: Interpreter> {
    nodes: Vec<PerfectInfoNode<I>>,
}

impl<I: Interpreter> PerfectInfoTree<I> {
    pub fn new(root_state: I::State) -> Self {
        Self {
            nodes: vec![PerfectInfoNode::root(root_state)],
        }
    }

    pub fn node(&self, index: usize) -> &PerfectInfoNode<I> {
        &self.nodes[index]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> &PerfectInfoNode<I> {
        &self.nodes[0]
    }

    pub fn add_valuation(&mut self, index: usize, delta: &PlayoutValuation<I::Role>) {
        self.nodes[index].valuation = self.nodes[index].valuation.backpropagate(delta);
    }

    /// Enumerates every legal turn of `node.state` and registers a child per turn. No-op if
    /// already expanded or the state is terminal.
    pub fn expand(&mut self, index: usize, interpreter: &I) -> Result<(), InterpreterError> {
        if self.nodes[index].expanded || interpreter.is_terminal(&self.nodes[index].state) {
            return Ok(());
        }
        let state = self.nodes[index].state.clone();
        let depth = self.nodes[index].depth;
        let turns = interpreter.legal_turns(&state)?;
        let mut children = BTreeMap::new();
        for turn in turns {
            let child_state = interpreter.next_state(&state, &turn)?;
            let child_index = self.nodes.len();
            self.nodes.push(PerfectInfoNode {
                parent: index,
                state: child_state,
                depth: depth + 1,
                children: BTreeMap::new(),
                valuation: PlayoutValuation::empty(),
                expanded: false,
            });
            children.insert(turn, child_index);
        }
        self.nodes[index].children = children;
        self.nodes[index].expanded = true;
        Ok(())
    }

    /// Discards every node except the subtree rooted at `child_index`, which becomes the new
    /// root (index `0`). Used when the driver observes a state the tree already knows about.
    pub fn rebase(&mut self, child_index: usize) {
        let mut stack = vec![child_index];
        let mut order = Vec::new();
        while let Some(idx) = stack.pop() {
            order.push(idx);
            stack.extend(self.nodes[idx].children.values().copied());
        }
        // Assign every kept node's new index before rewriting any pointers: a node's children
        // generally appear later in `order` than the node itself, so `remap` must be complete
        // up front rather than filled in as we go.
        let mut remap = vec![usize::MAX; self.nodes.len()];
        for (new_index, &idx) in order.iter().enumerate() {
            remap[idx] = new_index;
        }
        let root_depth = self.nodes[child_index].depth;
        let mut kept = Vec::with_capacity(order.len());
        for &idx in &order {
            let mut node = self.nodes[idx].clone();
            node.parent = if idx == child_index {
                NO_PARENT
            } else {
                remap[node.parent]
            };
            node.depth -= root_depth;
            for child in node.children.values_mut() {
                *child = remap[*child];
            }
            kept.push(node);
        }
        self.nodes = kept;
    }

    /// Replaces the whole tree with a fresh, unexpanded root at `state`: used when no child of
    /// the current root matches an observed state (first move, or a cache miss).
    pub fn reset(&mut self, state: I::State) {
        self.nodes = vec![PerfectInfoNode::root(state)];
    }
}

/// A node of an information-set search tree: the owning role, the view that induces the set, the
/// set of concrete states consistent with that view, and children keyed by the owning role's
/// move.
#[derive(Debug, Clone)]
pub struct InformationSetNode<I: Interpreter> {
    parent: usize,
    role: I::Role,
    view: I::State,
    possible_states: HashSet<I::State>,
    depth: u32,
    children: BTreeMap<I::Move, usize>,
    valuation: PlayoutValuation<I::Role>,
    expanded: bool,
}

impl<I: Interpreter> InformationSetNode<I> {
    fn root(role: I::Role, view: I::State, possible_states: HashSet<I::State>) -> Self {
        Self {
            parent: NO_PARENT,
            role,
            view,
            possible_states,
            depth: 0,
            children: BTreeMap::new(),
            valuation: PlayoutValuation::empty(),
            expanded: false,
        }
    }

    pub fn view(&self) -> &I::State {
        &self.view
    }

    pub fn possible_states(&self) -> &HashSet<I::State> {
        &self.possible_states
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn valuation(&self) -> &PlayoutValuation<I::Role> {
        &self.valuation
    }

    pub fn children(&self) -> impl ExactSizeIterator<Item = (&I::Move, usize)> {
        self.children.iter().map(|(mv, &idx)| (mv, idx))
    }

    pub fn child(&self, mv: &I::Move) -> Option<usize> {
        self.children.get(mv).copied()
    }
}

/// An arena of [`InformationSetNode`]s, one tree per searching role, supporting the MO-ISMCTS
/// variant of the search.
#[derive(Debug, Clone)]
pub struct InformationSetTree<I: Interpreter> {
    nodes: Vec<InformationSetNode<I>>,
}

impl<I: Interpreter> InformationSetTree<I> {
    pub fn new(role: I::Role, view: I::State, possible_states: HashSet<I::State>) -> Self {
        Self {
            nodes: vec![InformationSetNode::root(role, view, possible_states)],
        }
    }

    pub fn node(&self, index: usize) -> &InformationSetNode<I> {
        &self.nodes[index]
    }

    pub fn root(&self) -> &InformationSetNode<I> {
        &self.nodes[0]
    }

    pub fn add_valuation(&mut self, index: usize, delta: &PlayoutValuation<I::Role>) {
        self.nodes[index].valuation = self.nodes[index].valuation.backpropagate(delta);
    }

    /// Merges `state` into a node's `possible_states`, recording that this concrete
    /// determinization was observed to reach this information set. Online/incremental
    /// counterpart of batch construction: under repeated sampling the set converges towards
    /// every state consistent with the node's view.
    pub fn observe_state(&mut self, index: usize, state: I::State) {
        self.nodes[index].possible_states.insert(state);
    }

    /// Ensures a child exists for `mv`, creating it (expanding the node, if necessary) the first
    /// time `mv` is encountered. Returns the child's index and its freshly-computed view on
    /// first creation.
    ///
    /// Unlike [`PerfectInfoTree::expand`], which enumerates every legal turn from the single
    /// state a perfect-info node owns, an information-set node only knows the owning role's own
    /// legal moves (assumed identical across every state the view is consistent with); the set
    /// of reachable successor states per move is built up lazily as determinizations are sampled.
    pub fn ensure_child(
        &mut self,
        index: usize,
        mv: I::Move,
        successor_state: I::State,
        interpreter: &I,
    ) -> Result<usize, InterpreterError> {
        self.nodes[index].expanded = true;
        if let Some(&child) = self.nodes[index].children.get(&mv) {
            let view = interpreter.sees(&successor_state, &self.nodes[index].role);
            // Every state folded into a child's possible_states must induce the same view.
            if view != self.nodes[child].view {
                return Err(InterpreterError::MoreThanOneModel);
            }
            self.nodes[child].possible_states.insert(successor_state);
            return Ok(child);
        }
        let role = self.nodes[index].role.clone();
        let view = interpreter.sees(&successor_state, &role);
        let depth = self.nodes[index].depth;
        let child_index = self.nodes.len();
        let mut possible_states = HashSet::new();
        possible_states.insert(successor_state);
        self.nodes.push(InformationSetNode {
            parent: index,
            role,
            view,
            possible_states,
            depth: depth + 1,
            children: BTreeMap::new(),
            valuation: PlayoutValuation::empty(),
            expanded: false,
        });
        self.nodes[index].children.insert(mv, child_index);
        Ok(child_index)
    }

    /// Replaces the whole tree with a fresh, unexpanded root, pruning `possible_states` to those
    /// consistent with a newly observed view.
    pub fn reset(&mut self, role: I::Role, view: I::State, possible_states: HashSet<I::State>) {
        self.nodes = vec![InformationSetNode::root(role, view, possible_states)];
    }
}
