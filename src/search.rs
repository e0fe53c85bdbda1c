//! Selection/expansion/backpropagation core: UCT descent over a [`PerfectInfoTree`], and the
//! MO-ISMCTS variant over an [`InformationSetTree`] fed by a determinized ground state.

use std::rc::Rc;

use rand::Rng;
use rand::seq::IteratorRandom as _;

use crate::evaluator::Evaluator;
use crate::interpreter::{Interpreter, InterpreterError};
use crate::node::{InformationSetTree, PerfectInfoTree};
use crate::primitives::Turn;

/// `C` in the UCT formula `w_c + C * sqrt(ln(N) / n_c)`.
pub const DEFAULT_EXPLORATION: f64 = std::f64::consts::SQRT_2;

/// A UCT search tree over perfect-information states, rooted at the state the agent's role is
/// currently deciding a move from.
///
/// Generalizes the teacher's `Search<G, P>` (`examples/pacman82-monte-carlo-tree-search/src/search.rs`):
/// where the teacher reconstructs a two-player board by replaying moves, this tree stores each
/// node's opaque `State` directly (states here are cheap-to-clone value types produced by the
/// interpreter, not boards the search can incrementally mutate in place).
pub struct PerfectInfoSearch<I: Interpreter> {
    interpreter: Rc<I>,
    my_role: I::Role,
    tree: PerfectInfoTree<I>,
    exploration: f64,
    /// Scratch buffer of visited node indices, root to leaf, reused across `step` calls to avoid
    /// repeated allocation (mirrors the teacher's `path` field).
    path: Vec<usize>,
}

impl<I: Interpreter> PerfectInfoSearch<I> {
    pub fn new(interpreter: Rc<I>, my_role: I::Role, root_state: I::State) -> Self {
        Self {
            interpreter,
            my_role,
            tree: PerfectInfoTree::new(root_state),
            exploration: DEFAULT_EXPLORATION,
            path: Vec::new(),
        }
    }

    pub fn with_exploration(mut self, exploration: f64) -> Self {
        self.exploration = exploration;
        self
    }

    pub fn root_state(&self) -> &I::State {
        self.tree.root().state()
    }

    pub fn root_visits(&self) -> u64 {
        self.tree.root().valuation().visits_for(&self.my_role)
    }

    /// One selection/expansion/rollout/backpropagation cycle.
    pub fn step(&mut self, evaluator: &mut impl Evaluator<I>, rng: &mut impl Rng) -> Result<(), InterpreterError> {
        self.path.clear();
        self.path.push(0);
        let mut current = 0;

        // Selection: descend while the current node is expanded and non-terminal.
        while !self.interpreter.is_terminal(self.tree.node(current).state()) && self.tree.node(current).is_expanded()
        {
            let Some(next) = self.select_child(current) else {
                break;
            };
            current = next;
            self.path.push(current);
        }

        // Expansion: if we stopped at a non-terminal, unexpanded node, expand it and descend
        // into one child chosen uniformly at random as the rollout source.
        if !self.interpreter.is_terminal(self.tree.node(current).state()) {
            self.tree.expand(current, &self.interpreter)?;
            let children: Vec<usize> = self.tree.node(current).children().map(|(_, idx)| idx).collect();
            if let Some(&chosen) = children.iter().choose(rng) {
                current = chosen;
                self.path.push(current);
            }
        }

        // Rollout.
        let state = self.tree.node(current).state().clone();
        log::trace!("rolling out from depth {}", self.tree.node(current).depth());
        let valuation = evaluator.evaluate(&*self.interpreter, &state, &self.my_role, rng)?;

        // Backpropagation: one monoidal addition per ancestor visited, in any order.
        for &idx in &self.path {
            self.tree.add_valuation(idx, &valuation);
        }
        Ok(())
    }

    /// UCT-selects a child of `parent`, giving unvisited children priority, breaking ties by the
    /// canonical `Turn` key for reproducibility under a fixed seed.
    ///
    /// The win-rate term is taken from the perspective of whichever role(s) are in control of
    /// `parent`'s state, not a fixed searching role: an opponent's node must score its children by
    /// how good they are for the opponent, or the descent degenerates into every role cooperating
    /// with the agent instead of competing against it. Visit counts are role-independent (every
    /// rollout updates every role's bucket once), so `self.my_role` is still fine as a stand-in
    /// there.
    fn select_child(&self, parent: usize) -> Option<usize> {
        let parent_node = self.tree.node(parent);
        let controlling = self.interpreter.roles_in_control(parent_node.state());
        let parent_visits = parent_node.valuation().visits_for(&self.my_role).max(1) as f64;
        let mut best: Option<(usize, f64)> = None;
        for (_turn, child_idx) in parent_node.children() {
            let child = self.tree.node(child_idx);
            let visits = child.valuation().visits_for(&self.my_role);
            if visits == 0 {
                return Some(child_idx);
            }
            let win_rate = perspective_win_rate(child.valuation(), &controlling, visits);
            let score = win_rate + self.exploration * (parent_visits.ln() / visits as f64).sqrt();
            match best {
                Some((_, best_score)) if best_score >= score => {}
                _ => best = Some((child_idx, score)),
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// The root's most-visited child: primary tiebreak visit count, secondary win-rate, final
    /// tiebreak the canonical `Turn` key.
    pub fn best_turn(&self) -> Option<Turn<I::Role, I::Move>> {
        let root = self.tree.root();
        let mut best: Option<(&Turn<I::Role, I::Move>, usize)> = None;
        for (turn, child_idx) in root.children() {
            let replace = match best {
                None => true,
                Some((best_turn, best_idx)) => {
                    let child = self.tree.node(child_idx);
                    let best_node = self.tree.node(best_idx);
                    let child_visits = child.valuation().visits_for(&self.my_role);
                    let best_visits = best_node.valuation().visits_for(&self.my_role);
                    match child_visits.cmp(&best_visits) {
                        std::cmp::Ordering::Greater => true,
                        std::cmp::Ordering::Less => false,
                        std::cmp::Ordering::Equal => {
                            let child_rate = win_rate(child, &self.my_role);
                            let best_rate = win_rate(best_node, &self.my_role);
                            match child_rate.partial_cmp(&best_rate).unwrap_or(std::cmp::Ordering::Equal) {
                                std::cmp::Ordering::Greater => true,
                                std::cmp::Ordering::Less => false,
                                std::cmp::Ordering::Equal => turn > best_turn,
                            }
                        }
                    }
                }
            };
            if replace {
                best = Some((turn, child_idx));
            }
        }
        best.map(|(turn, _)| turn.clone())
    }

    /// Advances the root to whichever child represents `new_state`, if one exists; otherwise
    /// rebuilds a fresh root there (cache miss case: first move, or a state the tree never
    /// explored).
    pub fn advance(&mut self, new_state: I::State) {
        let matching_child = self
            .tree
            .root()
            .children()
            .find(|(_, idx)| self.tree.node(*idx).state() == &new_state)
            .map(|(_, idx)| idx);
        match matching_child {
            Some(child) => self.tree.rebase(child),
            None => {
                log::debug!("perfect-info tree update missed cache, rebuilding root");
                self.tree.reset(new_state);
            }
        }
    }
}

/// Win-rate of a child's valuation, averaged over whichever role(s) are in control of the parent
/// selecting it. A single controlling role (the common case: alternating or single-agent games)
/// reduces to that role's own win-rate; multiple controlling roles (simultaneous-move games)
/// average uniformly across them, since the joint turn itself does not single out one.
fn perspective_win_rate<R: Ord + Clone + std::hash::Hash>(
    valuation: &crate::valuation::PlayoutValuation<R>,
    controlling: &std::collections::BTreeSet<R>,
    visits: u64,
) -> f64 {
    if controlling.is_empty() || visits == 0 {
        return 0.0;
    }
    let total: f64 = controlling
        .iter()
        .map(|role| {
            let wins = valuation.wins_for(role) as f64;
            let ties = valuation.ties_for(role) as f64;
            (wins + 0.5 * ties) / visits as f64
        })
        .sum();
    total / controlling.len() as f64
}

fn win_rate<I: Interpreter>(node: &crate::node::PerfectInfoNode<I>, role: &I::Role) -> f64 {
    let visits = node.valuation().visits_for(role);
    if visits == 0 {
        return 0.0;
    }
    let wins = node.valuation().wins_for(role) as f64;
    let ties = node.valuation().ties_for(role) as f64;
    (wins + 0.5 * ties) / visits as f64
}

fn info_set_win_rate<I: Interpreter>(node: &crate::node::InformationSetNode<I>, role: &I::Role) -> f64 {
    let visits = node.valuation().visits_for(role);
    if visits == 0 {
        return 0.0;
    }
    let wins = node.valuation().wins_for(role) as f64;
    let ties = node.valuation().ties_for(role) as f64;
    (wins + 0.5 * ties) / visits as f64
}

/// A single-observer information-set search tree: UCT selection over the owning role's own
/// moves, with every other role's contribution to each joint turn supplied by a concrete
/// determinized state resampled at the start of every `step`.
///
/// This is a deliberate simplification of full MO-ISMCTS (which keeps one tree *per role* and
/// lets every role select by UCT in its own tree simultaneously): a single agent only ever needs
/// its own role's move, so opponents' contributions here are sampled uniformly at random from
/// whatever the ground-truth determinization allows, exactly as [`crate::evaluator::LightPlayoutEvaluator`]
/// already does for perfect-info rollouts. Recorded as a resolved open question in `DESIGN.md`.
pub struct InformationSetSearch<I: Interpreter> {
    interpreter: Rc<I>,
    my_role: I::Role,
    tree: InformationSetTree<I>,
    exploration: f64,
    path: Vec<usize>,
}

impl<I: Interpreter> InformationSetSearch<I> {
    pub fn new(
        interpreter: Rc<I>,
        my_role: I::Role,
        view: I::State,
        possible_states: std::collections::HashSet<I::State>,
    ) -> Self {
        Self {
            interpreter,
            tree: InformationSetTree::new(my_role.clone(), view, possible_states),
            my_role,
            exploration: DEFAULT_EXPLORATION,
            path: Vec::new(),
        }
    }

    pub fn root_visits(&self) -> u64 {
        self.tree.root().valuation().visits_for(&self.my_role)
    }

    /// One MO-ISMCTS iteration, grounded on a fresh sample from `belief`: every step begins with
    /// its own draw rather than reusing the previous step's determinization.
    pub fn step(
        &mut self,
        ground_state: &I::State,
        evaluator: &mut impl Evaluator<I>,
        rng: &mut impl Rng,
    ) -> Result<(), InterpreterError> {
        self.path.clear();
        self.path.push(0);
        let mut current = 0;
        let mut state = ground_state.clone();
        self.tree.observe_state(0, state.clone());

        loop {
            if self.interpreter.is_terminal(&state) {
                break;
            }
            let controlling = self.interpreter.roles_in_control(&state);
            if !controlling.contains(&self.my_role) {
                // Not my turn to act: advance the ground state with random moves for whoever is
                // in control and keep descending the same tree node.
                let turn = self.random_turn(&state, rng)?;
                state = self.interpreter.next_state(&state, &turn)?;
                continue;
            }

            let legal_moves = self.interpreter.legal_moves(&state, &self.my_role)?;
            let mv = self.select_move(current, &legal_moves);
            let mut other_plays = self.other_roles_random_plays(&state, &controlling, rng)?;
            other_plays.push((self.my_role.clone(), mv.clone()));
            let turn = Turn::from_plays(other_plays);
            let next_state = self.interpreter.next_state(&state, &turn)?;
            let child = self.tree.ensure_child(current, mv, next_state.clone(), &self.interpreter)?;
            current = child;
            state = next_state;
            self.path.push(current);
        }

        let valuation = evaluator.evaluate(&*self.interpreter, &state, &self.my_role, rng)?;
        for &idx in &self.path {
            self.tree.add_valuation(idx, &valuation);
        }
        Ok(())
    }

    /// The root's most-visited move: primary tiebreak visit count, secondary win-rate, final
    /// tiebreak the move's own canonical order. `None` if the root was never expanded (zero
    /// completed search iterations).
    pub fn best_move(&self) -> Option<I::Move> {
        let root = self.tree.root();
        let mut best: Option<(&I::Move, usize)> = None;
        for (mv, child_idx) in root.children() {
            let replace = match best {
                None => true,
                Some((best_mv, best_idx)) => {
                    let child = self.tree.node(child_idx);
                    let best_node = self.tree.node(best_idx);
                    let child_visits = child.valuation().visits_for(&self.my_role);
                    let best_visits = best_node.valuation().visits_for(&self.my_role);
                    match child_visits.cmp(&best_visits) {
                        std::cmp::Ordering::Greater => true,
                        std::cmp::Ordering::Less => false,
                        std::cmp::Ordering::Equal => {
                            let child_rate = info_set_win_rate(child, &self.my_role);
                            let best_rate = info_set_win_rate(best_node, &self.my_role);
                            match child_rate.partial_cmp(&best_rate).unwrap_or(std::cmp::Ordering::Equal) {
                                std::cmp::Ordering::Greater => true,
                                std::cmp::Ordering::Less => false,
                                std::cmp::Ordering::Equal => mv > best_mv,
                            }
                        }
                    }
                }
            };
            if replace {
                best = Some((mv, child_idx));
            }
        }
        best.map(|(mv, _)| mv.clone())
    }

    fn select_move(&self, node_idx: usize, legal_moves: &std::collections::BTreeSet<I::Move>) -> I::Move {
        let node = self.tree.node(node_idx);
        let parent_visits = node.valuation().visits_for(&self.my_role).max(1) as f64;
        let mut best: Option<(I::Move, f64)> = None;
        for mv in legal_moves {
            let Some(child_idx) = node.child(mv) else {
                // Never-yet-tried move: unvisited priority.
                return mv.clone();
            };
            let child = self.tree.node(child_idx);
            let visits = child.valuation().visits_for(&self.my_role);
            if visits == 0 {
                return mv.clone();
            }
            let wins = child.valuation().wins_for(&self.my_role) as f64;
            let ties = child.valuation().ties_for(&self.my_role) as f64;
            let win_rate = (wins + 0.5 * ties) / visits as f64;
            let score = win_rate + self.exploration * (parent_visits.ln() / visits as f64).sqrt();
            match &best {
                Some((_, best_score)) if *best_score >= score => {}
                _ => best = Some((mv.clone(), score)),
            }
        }
        best.map(|(mv, _)| mv).expect("legal_moves is non-empty for a controlling role")
    }

    fn random_turn(&self, state: &I::State, rng: &mut impl Rng) -> Result<Turn<I::Role, I::Move>, InterpreterError> {
        let controlling = self.interpreter.roles_in_control(state);
        let plays = self.other_roles_random_plays(state, &controlling, rng)?;
        Ok(Turn::from_plays(plays))
    }

    fn other_roles_random_plays(
        &self,
        state: &I::State,
        controlling: &std::collections::BTreeSet<I::Role>,
        rng: &mut impl Rng,
    ) -> Result<Vec<(I::Role, I::Move)>, InterpreterError> {
        let mut plays = Vec::new();
        for role in controlling {
            if *role == self.my_role {
                continue;
            }
            let legal = self.interpreter.legal_moves(state, role)?;
            let mv = legal
                .into_iter()
                .choose(rng)
                .expect("legal_moves is non-empty for a controlling role");
            plays.push((role.clone(), mv));
        }
        Ok(plays)
    }

    /// Advances the root to the child reached by the role's committed move, pruning
    /// `possible_states` against a newly observed view; rebuilds a fresh root on a cache miss.
    pub fn advance(
        &mut self,
        committed_move: Option<&I::Move>,
        new_view: I::State,
        possible_states: std::collections::HashSet<I::State>,
    ) {
        let my_role = self.my_role.clone();
        if let Some(mv) = committed_move {
            if let Some(child) = self.tree.root().child(mv) {
                if self.tree.node(child).view() == &new_view {
                    // Re-home: there is no cheap arena-rebase for information-set trees since
                    // possible_states must be pruned, so we rebuild a root from the pruned set
                    // but seed its valuation from the matched child for continuity.
                    let valuation = self.tree.node(child).valuation().clone();
                    self.tree.reset(my_role, new_view, possible_states);
                    self.tree.add_valuation(0, &valuation);
                    return;
                }
            }
        }
        log::debug!("information-set tree update missed cache, rebuilding root");
        self.tree.reset(my_role, new_view, possible_states);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::InterpreterError as IErr;
    use crate::valuation::{Outcome, PlayoutValuation};
    use std::collections::{BTreeMap, BTreeSet};

    /// Two-ply toy game: role `"a"` moves first, then role `"b"` moves and the game ends. `"b"`
    /// scores by mismatching `"a"`'s move; `"a"` scores by `"b"` matching it.
    #[derive(Clone)]
    struct MismatchGame;

    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    enum St {
        Root,
        AfterA(u8),
        Term(u8, u8),
    }

    impl Interpreter for MismatchGame {
        type State = St;
        type Role = &'static str;
        type Move = u8;

        fn roles(&self) -> Vec<Self::Role> {
            vec!["a", "b"]
        }

        fn init_state(&self) -> Self::State {
            St::Root
        }

        fn legal_moves(&self, state: &Self::State, role: &Self::Role) -> Result<BTreeSet<u8>, IErr> {
            match (state, *role) {
                (St::Root, "a") => Ok(BTreeSet::from([0, 1])),
                (St::AfterA(_), "b") => Ok(BTreeSet::from([0, 1])),
                _ => Ok(BTreeSet::new()),
            }
        }

        fn roles_in_control(&self, state: &Self::State) -> BTreeSet<Self::Role> {
            match state {
                St::Root => BTreeSet::from(["a"]),
                St::AfterA(_) => BTreeSet::from(["b"]),
                St::Term(_, _) => BTreeSet::new(),
            }
        }

        fn next_state(&self, state: &Self::State, turn: &Turn<Self::Role, u8>) -> Result<Self::State, IErr> {
            match state {
                St::Root => Ok(St::AfterA(*turn.move_for(&"a").unwrap())),
                St::AfterA(a) => Ok(St::Term(*a, *turn.move_for(&"b").unwrap())),
                St::Term(_, _) => Err(IErr::NextUnsat),
            }
        }

        fn sees(&self, state: &Self::State, _role: &Self::Role) -> Self::State {
            state.clone()
        }

        fn is_terminal(&self, state: &Self::State) -> bool {
            matches!(state, St::Term(_, _))
        }

        fn goals(&self, state: &Self::State) -> Result<BTreeMap<Self::Role, i64>, IErr> {
            match state {
                St::Term(a, b) => {
                    let b_wins = a != b;
                    Ok(BTreeMap::from([
                        ("a", if b_wins { 0 } else { 100 }),
                        ("b", if b_wins { 100 } else { 0 }),
                    ]))
                }
                _ => Err(IErr::GoalUnsat),
            }
        }
    }

    /// At a node `"b"` controls, selection must weigh children by `"b"`'s own win-rate, not the
    /// searching role's: otherwise the descent picks the move that is good for the root's role
    /// even through a node the opponent actually controls.
    #[test]
    fn select_child_scores_by_the_controlling_role_not_the_searching_role() {
        let interpreter = Rc::new(MismatchGame);
        let mut search = PerfectInfoSearch::new(interpreter.clone(), "a", St::Root);
        search.tree.expand(0, &interpreter).unwrap();
        let (_, after_a0) = search
            .tree
            .root()
            .children()
            .find(|(turn, _)| *turn.move_for(&"a").unwrap() == 0)
            .unwrap();
        search.tree.expand(after_a0, &interpreter).unwrap();

        let b_node = search.tree.node(after_a0);
        let (_, term_match) = b_node.children().find(|(turn, _)| *turn.move_for(&"b").unwrap() == 0).unwrap();
        let (_, term_mismatch) = b_node.children().find(|(turn, _)| *turn.move_for(&"b").unwrap() == 1).unwrap();

        // term_match (b plays 0, matching a's 0): good for "a", bad for "b".
        search.tree.add_valuation(
            term_match,
            &PlayoutValuation::single("a", Outcome::Win).backpropagate(&PlayoutValuation::single("b", Outcome::Loss)),
        );
        // term_mismatch (b plays 1): bad for "a", good for "b".
        search.tree.add_valuation(
            term_mismatch,
            &PlayoutValuation::single("a", Outcome::Loss).backpropagate(&PlayoutValuation::single("b", Outcome::Win)),
        );

        let selected = search.select_child(after_a0).unwrap();
        assert_eq!(
            selected, term_mismatch,
            "selection at b's node must favor the child that is good for b, not for the searching role a"
        );
    }
}

