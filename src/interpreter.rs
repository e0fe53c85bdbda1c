//! The abstract game oracle the search core consults for everything it does not know on its own.
//!
//! An `Interpreter` is the boundary to the declarative rule language: the core never inspects a
//! state's contents, it only ever asks the interpreter about it. Implementations are expected to
//! be referentially transparent and safe to call concurrently on distinct states; nothing in
//! this crate enforces that, it is a precondition on implementers.

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::hash::Hash;

use thiserror::Error;

use crate::primitives::Turn;

/// Failure modes of an [`Interpreter`] query, all corresponding to a ruleset that does not define
/// the queried relation consistently.
///
/// Grounded in `original_source/src/pyggp/exceptions/interpreter_exceptions.py`'s
/// `Unsat{Init,Next,Sees,Legal,Goal}Error` / `MoreThanOneModelError` hierarchy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InterpreterError {
    #[error("ruleset admits no model for init/1")]
    InitUnsat,
    #[error("ruleset admits no model for next/1 given the supplied turn")]
    NextUnsat,
    #[error("ruleset admits no legal move for a controlling role")]
    LegalUnsat,
    #[error("ruleset admits no model for goal/2 on a terminal state")]
    GoalUnsat,
    #[error("ruleset admits no model for sees/2")]
    SeesUnsat,
    #[error("query that is assumed functional has more than one admissible model")]
    MoreThanOneModel,
}

/// The external oracle a search agent consults: legal moves, successor states, views,
/// terminality and goals.
///
/// `State` is immutable and opaque to the core; `Role` and `Move` need only be cheaply cloneable,
/// comparable, and hashable. All methods are pure functions of their arguments.
pub trait Interpreter {
    type State: Clone + Eq + Hash + Debug;
    type Role: Clone + Eq + Ord + Hash + Debug;
    type Move: Clone + Eq + Ord + Hash + Debug;

    /// The ordered, fixed set of roles participating in this ruleset.
    fn roles(&self) -> Vec<Self::Role>;

    /// The initial state of a fresh match.
    fn init_state(&self) -> Self::State;

    /// Non-empty set of moves for a role currently in control; empty if the role is not in
    /// control. Fails with [`InterpreterError::LegalUnsat`] if a controlling role has no legal
    /// move, which indicates a malformed ruleset.
    fn legal_moves(
        &self,
        state: &Self::State,
        role: &Self::Role,
    ) -> Result<BTreeSet<Self::Move>, InterpreterError>;

    /// The roles required to supply a play to form a turn in this state. Non-empty iff `state` is
    /// non-terminal.
    fn roles_in_control(&self, state: &Self::State) -> BTreeSet<Self::Role>;

    /// The Cartesian product of legal moves restricted to controlling roles, i.e. every joint
    /// turn playable from `state`.
    fn legal_turns(
        &self,
        state: &Self::State,
    ) -> Result<Vec<Turn<Self::Role, Self::Move>>, InterpreterError> {
        let mut controlling: Vec<Self::Role> = self.roles_in_control(state).into_iter().collect();
        controlling.sort();
        let mut per_role_moves = Vec::with_capacity(controlling.len());
        for role in &controlling {
            let moves: Vec<Self::Move> = self.legal_moves(state, role)?.into_iter().collect();
            if moves.is_empty() {
                return Err(InterpreterError::LegalUnsat);
            }
            per_role_moves.push(moves);
        }
        let mut turns = vec![Vec::new()];
        for (role, moves) in controlling.iter().zip(per_role_moves.iter()) {
            let mut next = Vec::with_capacity(turns.len() * moves.len());
            for partial in &turns {
                for move_ in moves {
                    let mut extended = partial.clone();
                    extended.push((role.clone(), move_.clone()));
                    next.push(extended);
                }
            }
            turns = next;
        }
        Ok(turns.into_iter().map(Turn::from_plays).collect())
    }

    /// The deterministic successor of `state` under `turn`. Fails with
    /// [`InterpreterError::NextUnsat`] if the ruleset is inconsistent for this transition.
    fn next_state(
        &self,
        state: &Self::State,
        turn: &Turn<Self::Role, Self::Move>,
    ) -> Result<Self::State, InterpreterError>;

    /// The partial state a role observes of `state`. Invariant: `sees(s, r)` is a subset of `s`
    /// for every reachable `s`.
    fn sees(&self, state: &Self::State, role: &Self::Role) -> Self::State;

    fn is_terminal(&self, state: &Self::State) -> bool;

    /// Goals for every role, only defined on terminal states. GGP convention is `[0, 100]` but
    /// the core tolerates any integer.
    fn goals(
        &self,
        state: &Self::State,
    ) -> Result<std::collections::BTreeMap<Self::Role, i64>, InterpreterError>;
}
