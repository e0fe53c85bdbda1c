//! Pure `(state, role, interpreter) -> Valuation` functions: goal-normalized utility and the
//! random-rollout light playout evaluator.

use rand::Rng;
use rand::seq::IteratorRandom as _;
use std::collections::BTreeMap;

use crate::interpreter::{Interpreter, InterpreterError};
use crate::primitives::Turn;
use crate::valuation::{Outcome, PlayoutValuation};

/// Something that can evaluate a state for a role, producing a [`PlayoutValuation`].
///
/// Kept as a plain trait rather than `FnMut` so that it composes: `LightPlayoutEvaluator` holds
/// another `Evaluator` by value and calls it on the terminal state it rolls out to.
pub trait Evaluator<I: Interpreter> {
    fn evaluate(
        &mut self,
        interpreter: &I,
        state: &I::State,
        role: &I::Role,
        rng: &mut impl Rng,
    ) -> Result<PlayoutValuation<I::Role>, InterpreterError>;
}

/// Goal-normalized utility:
///
/// `u(R) = (count{r: G(r) < G(R)} + 0.5 * count{r: G(r) = G(R), r != R}) / (|roles| - 1)`
///
/// Ranges over `[0, 1]`: `0` for a strict loser, `1` for a strict winner, `0.5` for a pure tie.
/// Only defined on terminal states.
pub struct GoalNormalizedUtility;

impl GoalNormalizedUtility {
    /// Utility of every role at a terminal state, plus the threshold-bucketed
    /// [`PlayoutValuation`] that the search core backpropagates.
    pub fn valuation<I: Interpreter>(
        interpreter: &I,
        state: &I::State,
    ) -> Result<PlayoutValuation<I::Role>, InterpreterError> {
        let goals = interpreter.goals(state)?;
        let utilities = Self::utilities(&goals);
        let mut valuation = PlayoutValuation::empty();
        for (role, u) in utilities {
            valuation = valuation.backpropagate(&PlayoutValuation::single(role, Outcome::from_utility(u)));
        }
        Ok(valuation)
    }

    /// The raw `[0, 1]` utility per role, without bucketing. Exposed separately since the bucket
    /// boundaries lose information that callers outside the search core (e.g. a final-move
    /// tiebreak) may still want.
    pub fn utilities<R: Ord + Clone>(goals: &BTreeMap<R, i64>) -> BTreeMap<R, f64> {
        let role_count = goals.len();
        let mut utilities = BTreeMap::new();
        if role_count <= 1 {
            for role in goals.keys() {
                utilities.insert(role.clone(), 0.5);
            }
            return utilities;
        }
        for (role, &goal) in goals {
            let mut lower = 0usize;
            let mut equal = 0usize;
            for (other_role, &other_goal) in goals {
                if other_role == role {
                    continue;
                }
                if other_goal < goal {
                    lower += 1;
                } else if other_goal == goal {
                    equal += 1;
                }
            }
            let u = (lower as f64 + 0.5 * equal as f64) / (role_count - 1) as f64;
            utilities.insert(role.clone(), u);
        }
        utilities
    }
}

/// Rolls out a non-terminal state by uniformly random legal moves until a terminal state is
/// reached, then delegates to an inner evaluator on that terminal state.
pub struct LightPlayoutEvaluator<E> {
    pub final_state_evaluator: E,
}

impl<E> LightPlayoutEvaluator<E> {
    pub fn new(final_state_evaluator: E) -> Self {
        Self { final_state_evaluator }
    }
}

impl<I: Interpreter, E: Evaluator<I>> Evaluator<I> for LightPlayoutEvaluator<E> {
    fn evaluate(
        &mut self,
        interpreter: &I,
        state: &I::State,
        role: &I::Role,
        rng: &mut impl Rng,
    ) -> Result<PlayoutValuation<I::Role>, InterpreterError> {
        let mut state = state.clone();
        while !interpreter.is_terminal(&state) {
            let controlling = interpreter.roles_in_control(&state);
            let mut plays = Vec::with_capacity(controlling.len());
            for controlling_role in controlling {
                let legal = interpreter.legal_moves(&state, &controlling_role)?;
                let move_ = legal
                    .into_iter()
                    .choose(rng)
                    .expect("legal_moves is non-empty for a controlling role");
                plays.push((controlling_role, move_));
            }
            let turn: Turn<I::Role, I::Move> = Turn::from_plays(plays);
            state = interpreter.next_state(&state, &turn)?;
        }
        self.final_state_evaluator.evaluate(interpreter, &state, role, rng)
    }
}

/// Terminal-state evaluator that reads goals directly via [`GoalNormalizedUtility`]. Most
/// `LightPlayoutEvaluator` instances wrap this one.
pub struct GoalEvaluator;

impl<I: Interpreter> Evaluator<I> for GoalEvaluator {
    fn evaluate(
        &mut self,
        interpreter: &I,
        state: &I::State,
        _role: &I::Role,
        _rng: &mut impl Rng,
    ) -> Result<PlayoutValuation<I::Role>, InterpreterError> {
        GoalNormalizedUtility::valuation(interpreter, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_winner_gets_utility_one() {
        let goals = BTreeMap::from([("a", 100), ("b", 0), ("c", 0)]);
        let utilities = GoalNormalizedUtility::utilities(&goals);
        assert_eq!(utilities[&"a"], 1.0);
        assert_eq!(utilities[&"b"], 0.0);
        assert_eq!(utilities[&"c"], 0.0);
    }

    #[test]
    fn pure_tie_gets_utility_half_and_sums_to_role_count_over_two() {
        let goals = BTreeMap::from([("a", 50), ("b", 50), ("c", 50)]);
        let utilities = GoalNormalizedUtility::utilities(&goals);
        let sum: f64 = utilities.values().sum();
        assert!((sum - 1.5).abs() < 1e-9);
        for u in utilities.values() {
            assert!((u - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn utility_is_symmetric_for_middle_ranks() {
        let goals = BTreeMap::from([("a", 100), ("b", 50), ("c", 0)]);
        let utilities = GoalNormalizedUtility::utilities(&goals);
        assert_eq!(utilities[&"a"], 1.0);
        assert_eq!(utilities[&"c"], 0.0);
        assert_eq!(utilities[&"b"], 0.5);
    }
}
