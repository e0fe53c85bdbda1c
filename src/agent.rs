//! Time-bounded search loop, move selection, and match lifecycle.

use std::collections::HashSet;
use std::rc::Rc;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IteratorRandom as _;

use crate::clock::{GameClock, GameClockConfig};
use crate::determinization::BeliefSet;
use crate::error::AgentError;
use crate::evaluator::{Evaluator, GoalEvaluator, LightPlayoutEvaluator};
use crate::interpreter::Interpreter;
use crate::search::{InformationSetSearch, PerfectInfoSearch};

/// Safety margin: stop calling `step()` once the *projected* duration of one more step (3x the
/// last one observed) would no longer fit in the remaining budget.
const PROJECTION_FACTOR: u32 = 3;

/// Match lifecycle an [`Agent`] implements.
///
/// Grounded in `original_source/src/pyggp/agents.py`'s `Agent` base class: `set_up`/`tear_down`
/// model the scoped acquisition of caches or solver handles Python expresses through a context
/// manager, with guaranteed release left to the implementer (typically via `Drop`) rather than
/// enforced by this trait.
pub trait Agent<I: Interpreter> {
    fn set_up(&mut self) {}

    fn tear_down(&mut self) {}

    fn prepare_match(
        &mut self,
        role: I::Role,
        interpreter: Rc<I>,
        start_clock: GameClockConfig,
        play_clock: GameClockConfig,
    );

    fn update(&mut self, ply: u32, view: I::State, time_budget_ns: u64) -> Result<(), AgentError>;

    fn calculate_move(&mut self, ply: u32, time_budget_ns: u64, view: I::State) -> Result<I::Move, AgentError>;

    fn conclude_match(&mut self, _final_view: I::State) {}

    fn abort_match(&mut self) {}
}

/// Picks a uniformly random legal move, ignoring the clock entirely.
///
/// The minimal reference [`Agent`], grounded directly in
/// `original_source/src/pyggp/agents.py`'s `ArbitraryAgent.calculate_move`. Also the fallback the
/// MCTS agents below delegate to when the clock affords zero search iterations: a clock with
/// `total_time = 0, delay = 0` must still yield some legal move rather than fail.
pub struct ArbitraryAgent<I: Interpreter> {
    interpreter: Option<Rc<I>>,
    role: Option<I::Role>,
    rng: StdRng,
}

impl<I: Interpreter> ArbitraryAgent<I> {
    pub fn new(seed: u64) -> Self {
        Self {
            interpreter: None,
            role: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Picks a uniformly random legal move for `role` at `state`, without touching any clock.
    pub fn arbitrary_move(
        interpreter: &I,
        state: &I::State,
        role: &I::Role,
        rng: &mut impl rand::Rng,
    ) -> Result<I::Move, AgentError> {
        let legal = interpreter.legal_moves(state, role)?;
        legal
            .into_iter()
            .choose(rng)
            .ok_or(AgentError::Interpreter(crate::interpreter::InterpreterError::LegalUnsat))
    }
}

impl<I: Interpreter> Agent<I> for ArbitraryAgent<I> {
    fn prepare_match(&mut self, role: I::Role, interpreter: Rc<I>, _start_clock: GameClockConfig, _play_clock: GameClockConfig) {
        self.role = Some(role);
        self.interpreter = Some(interpreter);
    }

    fn update(&mut self, _ply: u32, _view: I::State, _time_budget_ns: u64) -> Result<(), AgentError> {
        Ok(())
    }

    fn calculate_move(&mut self, _ply: u32, _time_budget_ns: u64, view: I::State) -> Result<I::Move, AgentError> {
        let interpreter = self.interpreter.as_ref().ok_or(AgentError::InterpreterUnset)?;
        let role = self.role.as_ref().ok_or(AgentError::RoleUnset)?;
        Self::arbitrary_move(interpreter, &view, role, &mut self.rng)
    }
}

/// Runs `step` against `clock` until it expires or the projected cost of one more step would
/// overrun the remaining budget, updating `last_step_duration` as it goes. Shared by
/// `prepare_match`'s optional pre-game pondering and `calculate_move`'s per-ply search.
fn search_until_clock_expired(clock: &mut GameClock, last_step_duration: &mut Duration, mut step: impl FnMut()) -> u64 {
    clock.arm();
    let mut iterations = 0u64;
    while !clock.is_expired() {
        let projection = *last_step_duration * PROJECTION_FACTOR;
        // `remaining`/`delay` may individually be `Duration::MAX` for an unbounded clock
        // component, so add with saturation rather than risk an overflow panic.
        if projection > clock.remaining().saturating_add(clock.delay()) {
            break;
        }
        let started = Instant::now();
        step();
        *last_step_duration = started.elapsed();
        iterations += 1;
    }
    clock.stop();
    iterations
}

/// UCT-search agent for perfect-information games.
pub struct MctsAgent<I: Interpreter> {
    interpreter: Option<Rc<I>>,
    role: Option<I::Role>,
    search: Option<PerfectInfoSearch<I>>,
    play_clock_config: GameClockConfig,
    play_clock: GameClock,
    last_step_duration: Duration,
    rng: StdRng,
    seed: u64,
}

impl<I: Interpreter> MctsAgent<I> {
    pub fn new(seed: u64) -> Self {
        Self {
            interpreter: None,
            role: None,
            search: None,
            play_clock_config: GameClockConfig::zero(),
            play_clock: GameClockConfig::zero().into_clock(),
            last_step_duration: Duration::ZERO,
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    fn evaluator(&self) -> LightPlayoutEvaluator<GoalEvaluator> {
        LightPlayoutEvaluator::new(GoalEvaluator)
    }

    /// Searches against `clock` until it trips or only one legal root move exists -- the simpler
    /// of its two short-circuits; full minimax solving of an n-role, possibly-simultaneous-move
    /// game tree is out of scope. Shared by `prepare_match`'s start-clock pondering and
    /// `calculate_move`'s play-clock search.
    fn search_budgeted(&mut self, clock: &mut GameClock) {
        let Some(interpreter) = self.interpreter.clone() else {
            return;
        };
        let mut evaluator = self.evaluator();
        let rng = &mut self.rng;
        let search = self.search.as_mut().expect("search is seeded in prepare_match/update");
        if single_legal_turn(&*interpreter, search.root_state()) {
            log::debug!("only one legal root move, skipping search");
            return;
        }
        let mut last_step_duration = self.last_step_duration;
        search_until_clock_expired(clock, &mut last_step_duration, || {
            if let Err(err) = search.step(&mut evaluator, rng) {
                log::warn!("search step failed: {err}");
            }
        });
        self.last_step_duration = last_step_duration;
    }
}

fn single_legal_turn<I: Interpreter>(interpreter: &I, state: &I::State) -> bool {
    interpreter.is_terminal(state)
        || interpreter
            .legal_turns(state)
            .map(|turns| turns.len() == 1)
            .unwrap_or(false)
}

impl<I: Interpreter> Agent<I> for MctsAgent<I> {
    fn prepare_match(&mut self, role: I::Role, interpreter: Rc<I>, start_clock: GameClockConfig, play_clock: GameClockConfig) {
        let root_state = interpreter.init_state();
        self.role = Some(role.clone());
        self.search = Some(PerfectInfoSearch::new(interpreter.clone(), role, root_state));
        self.interpreter = Some(interpreter);
        self.play_clock_config = play_clock;
        self.play_clock = play_clock.into_clock();
        self.last_step_duration = Duration::ZERO;
        // Re-seed so the agent is reproducible across matches, not just within one.
        self.rng = StdRng::seed_from_u64(self.seed);
        // Spend the start clock on pre-game pondering from the initial state.
        let mut start = start_clock.into_clock();
        if start.remaining() > Duration::ZERO {
            self.search_budgeted(&mut start);
        }
    }

    fn update(&mut self, _ply: u32, view: I::State, _time_budget_ns: u64) -> Result<(), AgentError> {
        let search = self.search.as_mut().ok_or(AgentError::RoleUnset)?;
        search.advance(view);
        Ok(())
    }

    fn calculate_move(&mut self, _ply: u32, time_budget_ns: u64, view: I::State) -> Result<I::Move, AgentError> {
        let interpreter = self.interpreter.clone().ok_or(AgentError::InterpreterUnset)?;
        let role = self.role.clone().ok_or(AgentError::RoleUnset)?;
        {
            let search = self.search.as_mut().ok_or(AgentError::RoleUnset)?;
            search.advance(view.clone());
        }
        let mut play_clock = GameClockConfig::new(
            Duration::from_nanos(time_budget_ns),
            self.play_clock_config.increment,
            self.play_clock_config.delay,
        )
        .into_clock();

        self.search_budgeted(&mut play_clock);
        self.play_clock = play_clock;

        let search = self.search.as_ref().expect("seeded above");
        match search.best_turn() {
            Some(turn) => turn
                .move_for(&role)
                .cloned()
                .ok_or(AgentError::ValuationMissing),
            None => {
                log::warn!("no root children after search, falling back to an arbitrary move");
                ArbitraryAgent::<I>::arbitrary_move(&interpreter, &view, &role, &mut self.rng)
            }
        }
    }

    fn conclude_match(&mut self, _final_view: I::State) {
        self.search = None;
    }

    fn abort_match(&mut self) {
        self.search = None;
    }
}

/// MO-ISMCTS-style agent for imperfect-information games: combines a [`BeliefSet`]
/// determinization engine with a single-observer [`InformationSetSearch`].
pub struct ImperfectInfoMctsAgent<I: Interpreter> {
    interpreter: Option<Rc<I>>,
    role: Option<I::Role>,
    belief: Option<BeliefSet<I>>,
    search: Option<InformationSetSearch<I>>,
    last_own_move: Option<I::Move>,
    play_clock_config: GameClockConfig,
    play_clock: GameClock,
    last_step_duration: Duration,
    belief_bound: usize,
    rng: StdRng,
}

impl<I: Interpreter> ImperfectInfoMctsAgent<I> {
    pub fn new(seed: u64, belief_bound: usize) -> Self {
        Self {
            interpreter: None,
            role: None,
            belief: None,
            search: None,
            last_own_move: None,
            play_clock_config: GameClockConfig::zero(),
            play_clock: GameClockConfig::zero().into_clock(),
            last_step_duration: Duration::ZERO,
            belief_bound,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn evaluator(&self) -> LightPlayoutEvaluator<GoalEvaluator> {
        LightPlayoutEvaluator::new(GoalEvaluator)
    }
}

impl<I: Interpreter> Agent<I> for ImperfectInfoMctsAgent<I> {
    fn prepare_match(&mut self, role: I::Role, interpreter: Rc<I>, _start_clock: GameClockConfig, play_clock: GameClockConfig) {
        let belief = BeliefSet::initial(&interpreter, role.clone());
        let view = interpreter.sees(&interpreter.init_state(), &role);
        let possible_states = belief.as_set();
        self.search = Some(InformationSetSearch::new(
            interpreter.clone(),
            role.clone(),
            view,
            possible_states,
        ));
        self.belief = Some(belief);
        self.role = Some(role);
        self.interpreter = Some(interpreter);
        self.play_clock_config = play_clock;
        self.play_clock = play_clock.into_clock();
        self.last_step_duration = Duration::ZERO;
        self.last_own_move = None;
    }

    fn update(&mut self, _ply: u32, view: I::State, _time_budget_ns: u64) -> Result<(), AgentError> {
        let interpreter = self.interpreter.as_ref().ok_or(AgentError::InterpreterUnset)?;
        let belief = self.belief.as_mut().ok_or(AgentError::RoleUnset)?;
        belief.advance(interpreter, self.last_own_move.as_ref(), &view)?;
        belief.bound(self.belief_bound, &mut self.rng);
        let possible_states = belief.as_set();
        let search = self.search.as_mut().ok_or(AgentError::RoleUnset)?;
        search.advance(self.last_own_move.as_ref(), view, possible_states);
        self.last_own_move = None;
        Ok(())
    }

    fn calculate_move(&mut self, _ply: u32, time_budget_ns: u64, view: I::State) -> Result<I::Move, AgentError> {
        let interpreter = self.interpreter.clone().ok_or(AgentError::InterpreterUnset)?;
        let role = self.role.clone().ok_or(AgentError::RoleUnset)?;
        self.play_clock = GameClockConfig::new(
            Duration::from_nanos(time_budget_ns),
            self.play_clock_config.increment,
            self.play_clock_config.delay,
        )
        .into_clock();

        let mut evaluator = self.evaluator();
        let belief = self.belief.as_ref().ok_or(AgentError::RoleUnset)?;
        if belief.is_empty() {
            return Err(AgentError::EmptyBelief(crate::error::EmptyBeliefError));
        }
        let search = self.search.as_mut().expect("seeded in prepare_match");
        let rng = &mut self.rng;
        let mut last_step_duration = self.last_step_duration;
        search_until_clock_expired(&mut self.play_clock, &mut last_step_duration, || {
            let ground_state = belief.sample(rng).clone();
            if let Err(err) = search.step(&ground_state, &mut evaluator, rng) {
                log::warn!("information-set search step failed: {err}");
            }
        });
        self.last_step_duration = last_step_duration;

        let chosen = match self.search.as_ref().and_then(|s| s.best_move()) {
            Some(mv) => mv,
            None => {
                log::warn!("no information-set search iterations completed, falling back to an arbitrary move");
                ArbitraryAgent::<I>::arbitrary_move(&interpreter, &view, &role, &mut self.rng)?
            }
        };
        self.last_own_move = Some(chosen.clone());
        Ok(chosen)
    }

    fn conclude_match(&mut self, _final_view: I::State) {
        self.search = None;
        self.belief = None;
    }

    fn abort_match(&mut self) {
        self.search = None;
        self.belief = None;
    }
}
