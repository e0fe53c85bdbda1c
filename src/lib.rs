//! Core search engine of a General Game Playing system: Monte Carlo Tree Search agents that play
//! arbitrary games described through an opaque [`Interpreter`] contract, under both perfect and
//! imperfect information, budgeted by chess-style [`clock::GameClock`]s.
//!
//! This crate does not parse or ground the declarative rule language that describes a game, run
//! a match orchestrator, or speak any network protocol; it only consumes the abstract
//! [`Interpreter`] boundary a concrete rules engine implements.

pub mod agent;
pub mod clock;
pub mod determinization;
pub mod error;
pub mod evaluator;
pub mod interpreter;
pub mod node;
pub mod primitives;
pub mod search;
pub mod valuation;

pub use agent::{Agent, ArbitraryAgent, ImperfectInfoMctsAgent, MctsAgent};
pub use clock::{GameClock, GameClockConfig, GameClockConfigError};
pub use determinization::BeliefSet;
pub use error::{AgentError, EmptyBeliefError};
pub use evaluator::{Evaluator, GoalEvaluator, GoalNormalizedUtility, LightPlayoutEvaluator};
pub use interpreter::{Interpreter, InterpreterError};
pub use node::{InformationSetNode, InformationSetTree, PerfectInfoNode, PerfectInfoTree};
pub use primitives::{Play, Turn};
pub use search::{InformationSetSearch, PerfectInfoSearch};
pub use valuation::{Outcome, PlayoutValuation};
