//! Error kinds surfaced to the match orchestrator, and the policy by which each one is handled.

use thiserror::Error;

use crate::interpreter::InterpreterError;

/// The determinization engine's belief set emptied out: every retained state turned out
/// inconsistent with a new observation.
///
/// Grounded in `original_source/src/pyggp/exceptions/match_exceptions.py`'s treatment of a
/// belief state that can no longer explain the observation history as a ruleset/observation bug,
/// not a recoverable condition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("belief set emptied: no retained state matches the observed view")]
pub struct EmptyBeliefError;

/// Errors an [`crate::agent::Agent`] can raise across its lifecycle.
///
/// Grounded in `original_source/src/pyggp/exceptions/agent_exceptions.py`'s
/// `AgentError` hierarchy (`RoleUnsetAgentError`, `InterpreterUnsetAgentError`) and
/// `match_exceptions.py`'s `MatchTimeoutError`/`MatchIllegalMoveError` naming.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// `calculate_move`/`update` called before `prepare_match` assigned a role. Programming
    /// error: the match orchestrator is expected to call the lifecycle in order.
    #[error("agent used before prepare_match assigned a role")]
    RoleUnset,
    /// `calculate_move`/`update` called before `prepare_match` assigned an interpreter.
    #[error("agent used before prepare_match assigned an interpreter")]
    InterpreterUnset,
    /// A node's valuation was queried before it was ever visited by a rollout.
    #[error("queried the valuation of a node that was never visited")]
    ValuationMissing,
    /// The clock expired before a move could be produced at all (e.g. the very first
    /// `calculate_move` of a match with no time budget and no fallback available).
    #[error("clock expired before a move was produced")]
    Timeout,
    /// The agent or its opponent selected a move outside the legal set.
    #[error("move is not in the legal set")]
    IllegalMove,
    /// The determinization engine's belief set emptied.
    #[error("belief set emptied")]
    EmptyBelief(#[from] EmptyBeliefError),
    /// The ruleset is inconsistent for some query the agent depends on.
    #[error(transparent)]
    Interpreter(#[from] InterpreterError),
}
