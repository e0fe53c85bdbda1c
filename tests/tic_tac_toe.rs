//! A GGP-style tic-tac-toe `Interpreter`, exercising the perfect-information search agent end to
//! end. Grounded in the teacher's own tic-tac-toe integration tests
//! (`examples/pacman82-monte-carlo-tree-search/tests/tic-tac-toe.rs`), reworked against the GGP
//! `Interpreter` contract instead of a two-player-fixed `TwoPlayerGame` trait.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::time::Duration;

use ggp_mcts_core::{Agent, GameClockConfig, Interpreter, InterpreterError, MctsAgent, Turn};

const SIZE: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Role {
    X,
    O,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Board {
    cells: [Option<Role>; SIZE],
}

impl Board {
    fn empty() -> Self {
        Self { cells: [None; SIZE] }
    }

    fn to_move(&self) -> Role {
        let x_count = self.cells.iter().filter(|c| **c == Some(Role::X)).count();
        let o_count = self.cells.iter().filter(|c| **c == Some(Role::O)).count();
        if x_count <= o_count {
            Role::X
        } else {
            Role::O
        }
    }

    fn winner(&self) -> Option<Role> {
        const LINES: [[usize; 3]; 8] = [
            [0, 1, 2],
            [3, 4, 5],
            [6, 7, 8],
            [0, 3, 6],
            [1, 4, 7],
            [2, 5, 8],
            [0, 4, 8],
            [2, 4, 6],
        ];
        for line in LINES {
            if let [Some(a), Some(b), Some(c)] = [self.cells[line[0]], self.cells[line[1]], self.cells[line[2]]] {
                if a == b && b == c {
                    return Some(a);
                }
            }
        }
        None
    }

    fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }
}

struct TicTacToe;

impl Interpreter for TicTacToe {
    type State = Board;
    type Role = Role;
    type Move = u8;

    fn roles(&self) -> Vec<Role> {
        vec![Role::X, Role::O]
    }

    fn init_state(&self) -> Board {
        Board::empty()
    }

    fn legal_moves(&self, state: &Board, role: &Role) -> Result<BTreeSet<u8>, InterpreterError> {
        if state.winner().is_some() || state.is_full() || state.to_move() != *role {
            return Ok(BTreeSet::new());
        }
        Ok(state
            .cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_none())
            .map(|(i, _)| i as u8)
            .collect())
    }

    fn roles_in_control(&self, state: &Board) -> BTreeSet<Role> {
        if state.winner().is_some() || state.is_full() {
            BTreeSet::new()
        } else {
            BTreeSet::from([state.to_move()])
        }
    }

    fn next_state(&self, state: &Board, turn: &Turn<Role, u8>) -> Result<Board, InterpreterError> {
        let role = state.to_move();
        let mv = *turn.move_for(&role).ok_or(InterpreterError::NextUnsat)?;
        let mut next = *state;
        if next.cells[mv as usize].is_some() {
            return Err(InterpreterError::NextUnsat);
        }
        next.cells[mv as usize] = Some(role);
        Ok(next)
    }

    fn sees(&self, state: &Board, _role: &Role) -> Board {
        // Perfect information: every role sees the whole board.
        *state
    }

    fn is_terminal(&self, state: &Board) -> bool {
        state.winner().is_some() || state.is_full()
    }

    fn goals(&self, state: &Board) -> Result<BTreeMap<Role, i64>, InterpreterError> {
        if !self.is_terminal(state) {
            return Err(InterpreterError::GoalUnsat);
        }
        let mut goals = BTreeMap::new();
        match state.winner() {
            Some(winner) => {
                for role in self.roles() {
                    goals.insert(role, if role == winner { 100 } else { 0 });
                }
            }
            None => {
                for role in self.roles() {
                    goals.insert(role, 50);
                }
            }
        }
        Ok(goals)
    }
}

fn corners_and_center() -> BTreeSet<u8> {
    BTreeSet::from([0, 2, 4, 6, 8])
}

fn init_logging() {
    let _ = env_logger::try_init();
}

#[test]
fn seeded_opening_move_is_reproducible_and_in_the_optimal_family() {
    init_logging();
    let interpreter = Rc::new(TicTacToe);
    let run = || {
        let mut agent = MctsAgent::<TicTacToe>::new(42);
        agent.prepare_match(
            Role::X,
            interpreter.clone(),
            GameClockConfig::zero(),
            GameClockConfig::new(Duration::ZERO, Duration::ZERO, Duration::ZERO),
        );
        agent
            .calculate_move(0, Duration::from_millis(200).as_nanos() as u64, interpreter.init_state())
            .unwrap()
    };
    let first = run();
    let second = run();
    assert_eq!(first, second, "same seed must produce the same opening move");
    assert!(
        corners_and_center().contains(&first),
        "opening move {first} should be a corner or the center"
    );
}

#[test]
fn finds_the_winning_move_one_ply_from_mate() {
    init_logging();
    let interpreter = Rc::new(TicTacToe);
    // X: 0, 4   O: 1, 3   board:
    // X O .
    // O X .
    // . . .
    // X to move; playing 8 completes the 0-4-8 diagonal.
    let mut board = Board::empty();
    board.cells[0] = Some(Role::X);
    board.cells[4] = Some(Role::X);
    board.cells[1] = Some(Role::O);
    board.cells[3] = Some(Role::O);

    let mut agent = MctsAgent::<TicTacToe>::new(7);
    agent.prepare_match(
        Role::X,
        interpreter.clone(),
        GameClockConfig::zero(),
        GameClockConfig::zero(),
    );
    let mv = agent.calculate_move(4, Duration::from_millis(20).as_nanos() as u64, board).unwrap();
    assert_eq!(mv, 8);
}

#[test]
fn zero_time_clock_still_returns_a_legal_move() {
    init_logging();
    let interpreter = Rc::new(TicTacToe);
    let mut agent = MctsAgent::<TicTacToe>::new(1);
    agent.prepare_match(Role::X, interpreter.clone(), GameClockConfig::zero(), GameClockConfig::zero());
    let state = interpreter.init_state();
    let mv = agent.calculate_move(0, 0, state).unwrap();
    assert!(interpreter.legal_moves(&state, &Role::X).unwrap().contains(&mv));
}

#[test]
fn playing_a_full_game_against_itself_terminates_and_reaches_a_terminal_state() {
    init_logging();
    let interpreter = Rc::new(TicTacToe);
    let mut agent_x = MctsAgent::<TicTacToe>::new(3);
    let mut agent_o = MctsAgent::<TicTacToe>::new(4);
    agent_x.prepare_match(
        Role::X,
        interpreter.clone(),
        GameClockConfig::zero(),
        GameClockConfig::new(Duration::from_millis(20), Duration::ZERO, Duration::ZERO),
    );
    agent_o.prepare_match(
        Role::O,
        interpreter.clone(),
        GameClockConfig::zero(),
        GameClockConfig::new(Duration::from_millis(20), Duration::ZERO, Duration::ZERO),
    );

    let mut state = interpreter.init_state();
    let mut ply = 0u32;
    while !interpreter.is_terminal(&state) {
        let role = state.to_move();
        let budget = Duration::from_millis(20).as_nanos() as u64;
        let mv = if role == Role::X {
            agent_x.calculate_move(ply, budget, state).unwrap()
        } else {
            agent_o.calculate_move(ply, budget, state).unwrap()
        };
        let turn = Turn::from_plays([(role, mv)]);
        state = interpreter.next_state(&state, &turn).unwrap();
        agent_x.update(ply, state, budget).unwrap();
        agent_o.update(ply, state, budget).unwrap();
        ply += 1;
    }

    assert!(interpreter.is_terminal(&state));
}
