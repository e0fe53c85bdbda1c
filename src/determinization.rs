//! Sampling consistent concrete states from an observation history, for imperfect-information
//! agents to hand to a perfect-information-shaped search core.

use std::collections::HashSet;

use rand::Rng;
use rand::seq::{IndexedRandom as _, IteratorRandom as _};

use crate::error::EmptyBeliefError;
use crate::interpreter::{Interpreter, InterpreterError};
use crate::primitives::Turn;

/// The set of concrete states consistent with one role's entire observation history.
///
/// Grounded in `other_examples/8232dfc5_..._ismcts.rs`'s resampling of root states consistent
/// with an information state before each simulation; generalized here to GGP's turn-based
/// (possibly simultaneous-move) setting rather than a fixed two-player alternation.
pub struct BeliefSet<I: Interpreter> {
    role: I::Role,
    states: Vec<I::State>,
}

impl<I: Interpreter> BeliefSet<I> {
    /// A belief set seeded at the start of a match: every role's observation history is empty,
    /// so the only consistent state is the ruleset's initial state.
    pub fn initial(interpreter: &I, role: I::Role) -> Self {
        Self {
            role,
            states: vec![interpreter.init_state()],
        }
    }

    pub fn role(&self) -> &I::Role {
        &self.role
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn states(&self) -> &[I::State] {
        &self.states
    }

    /// Converts the retained states into a set, for seeding an [`crate::node::InformationSetTree`]
    /// root's `possible_states`.
    pub fn as_set(&self) -> HashSet<I::State> {
        self.states.iter().cloned().collect()
    }

    /// Uniformly samples one concrete state, a fresh draw for each search step.
    pub fn sample(&self, rng: &mut impl Rng) -> &I::State {
        self.states.choose(rng).expect("belief set is never empty between advances")
    }

    /// For every retained state, enumerates joint turns consistent with the role's own committed
    /// move (if it was in control), advances, and retains the successor iff it induces
    /// `new_view`. Fails with [`EmptyBeliefError`] if nothing survives.
    pub fn advance(
        &mut self,
        interpreter: &I,
        own_move: Option<&I::Move>,
        new_view: &I::State,
    ) -> Result<(), EmptyBeliefError> {
        let mut next = Vec::new();
        for state in &self.states {
            let Ok(turns) = interpreter.legal_turns(state) else {
                continue;
            };
            for turn in turns {
                if let Some(mv) = own_move {
                    if turn.move_for(&self.role) != Some(mv) {
                        continue;
                    }
                }
                let Ok(successor) = interpreter.next_state(state, &turn) else {
                    continue;
                };
                if &interpreter.sees(&successor, &self.role) == new_view && !next.contains(&successor) {
                    next.push(successor);
                }
            }
        }
        if next.is_empty() {
            return Err(EmptyBeliefError);
        }
        log::debug!(
            "belief set advanced: {} -> {} consistent states",
            self.states.len(),
            next.len()
        );
        self.states = next;
        Ok(())
    }

    /// Caps the belief set at `k` states by uniform-random subsampling, to keep memory finite in
    /// deep games. A no-op if already at or below `k`.
    pub fn bound(&mut self, k: usize, rng: &mut impl Rng) {
        if self.states.len() <= k {
            return;
        }
        self.states = self.states.drain(..).choose_multiple(rng, k);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as Map;
    use std::collections::BTreeSet;

    /// A one-bit hidden-information toy game: role `"guesser"` tries to find a coin hidden by
    /// role `"hider"`. State is `(hidden_bit, ply)`; the guesser only ever sees `ply`, never
    /// `hidden_bit`, until the game ends.
    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    struct State {
        hidden_bit: u8,
        ply: u8,
    }

    struct CoinGame;

    impl Interpreter for CoinGame {
        type State = State;
        type Role = &'static str;
        type Move = u8;

        fn roles(&self) -> Vec<Self::Role> {
            vec!["hider", "guesser"]
        }

        fn init_state(&self) -> Self::State {
            State { hidden_bit: 0, ply: 0 }
        }

        fn legal_moves(
            &self,
            state: &Self::State,
            role: &Self::Role,
        ) -> Result<BTreeSet<Self::Move>, InterpreterError> {
            match (*role, state.ply) {
                ("hider", 0) => Ok(BTreeSet::from([0, 1])),
                ("guesser", 1) => Ok(BTreeSet::from([0, 1])),
                _ => Ok(BTreeSet::new()),
            }
        }

        fn roles_in_control(&self, state: &Self::State) -> BTreeSet<Self::Role> {
            match state.ply {
                0 => BTreeSet::from(["hider"]),
                1 => BTreeSet::from(["guesser"]),
                _ => BTreeSet::new(),
            }
        }

        fn next_state(
            &self,
            state: &Self::State,
            turn: &Turn<Self::Role, Self::Move>,
        ) -> Result<Self::State, InterpreterError> {
            match state.ply {
                0 => Ok(State {
                    hidden_bit: *turn.move_for(&"hider").unwrap(),
                    ply: 1,
                }),
                1 => Ok(State {
                    hidden_bit: state.hidden_bit,
                    ply: 2,
                }),
                _ => Err(InterpreterError::NextUnsat),
            }
        }

        fn sees(&self, state: &Self::State, role: &Self::Role) -> Self::State {
            if *role == "hider" {
                state.clone()
            } else {
                State {
                    hidden_bit: 9,
                    ply: state.ply,
                }
            }
        }

        fn is_terminal(&self, state: &Self::State) -> bool {
            state.ply >= 2
        }

        fn goals(&self, _state: &Self::State) -> Result<Map<Self::Role, i64>, InterpreterError> {
            Ok(Map::new())
        }
    }

    #[test]
    fn initial_belief_is_the_init_state() {
        let belief = BeliefSet::initial(&CoinGame, "guesser");
        assert_eq!(belief.len(), 1);
    }

    #[test]
    fn belief_set_never_shrinks_below_consistency_with_own_view() {
        let interpreter = CoinGame;
        let mut belief = BeliefSet::initial(&interpreter, "guesser");
        let view_after_first_ply = interpreter.sees(
            &State { hidden_bit: 0, ply: 1 },
            &"guesser",
        );
        belief.advance(&interpreter, None, &view_after_first_ply).unwrap();
        // The guesser cannot distinguish hidden_bit from its own view; both remain possible.
        assert_eq!(belief.len(), 2);
        for state in belief.states() {
            assert_eq!(interpreter.sees(state, &"guesser"), view_after_first_ply);
        }
    }

    #[test]
    fn advancing_into_an_inconsistent_view_empties_the_belief() {
        let interpreter = CoinGame;
        let mut belief = BeliefSet::initial(&interpreter, "guesser");
        let impossible_view = State { hidden_bit: 9, ply: 5 };
        assert!(belief.advance(&interpreter, None, &impossible_view).is_err());
    }

    #[test]
    fn bound_caps_the_belief_set_size() {
        let interpreter = CoinGame;
        let mut belief = BeliefSet::initial(&interpreter, "guesser");
        let view = interpreter.sees(&State { hidden_bit: 0, ply: 1 }, &"guesser");
        belief.advance(&interpreter, None, &view).unwrap();
        assert_eq!(belief.len(), 2);
        let mut rng = rand::rngs::mock::StepRng::new(0, 1);
        belief.bound(1, &mut rng);
        assert_eq!(belief.len(), 1);
    }
}
