//! Value-estimation interface.
//!
//! The resolver bounds its search depth by asking an external estimator for
//! the continuation value of depth-limited leaves. The estimator is a narrow
//! synchronous capability: anything from an in-process neural net to a remote
//! service can implement it, and the engine never learns which.

use crate::cfr::game::{BeliefPair, PublicState};

/// Per-player, per-hand counterfactual values returned by an estimator.
///
/// `values[p][h]` is the expected value for player `p` holding hand `h`,
/// under the belief distributions the query was made with.
#[derive(Debug, Clone, PartialEq)]
pub struct NetValues {
    /// Value vectors, one per player, each of length `num_hands`.
    pub values: [Vec<f64>; 2],
}

/// Failure of the value-estimation backend.
///
/// Recoverable from the pipeline's point of view: the resolve that hit it is
/// discarded and the worker starts a fresh trajectory.
#[derive(Debug, Clone)]
pub struct EvaluationError {
    /// Backend-provided description of what went wrong.
    pub reason: String,
}

impl EvaluationError {
    /// Wrap a backend failure message.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "value estimation failed: {}", self.reason)
    }
}

impl std::error::Error for EvaluationError {}

/// A value estimator queried at depth-limited leaves.
///
/// Implementations must be safe to call concurrently from multiple worker
/// threads against the same instance, and must be pure from the caller's
/// viewpoint: the same state and beliefs yield the same values for the
/// lifetime of one handle.
pub trait ValueNet: Send + Sync {
    /// Estimate per-player, per-hand values for `state` under `beliefs`.
    fn evaluate(
        &self,
        state: &PublicState,
        beliefs: &BeliefPair,
    ) -> Result<NetValues, EvaluationError>;
}

/// Value-neutral estimator: every continuation is worth zero.
///
/// Useful as the cold-start model before any training has happened, and as
/// a deterministic stand-in for tests.
#[derive(Debug, Clone, Default)]
pub struct UniformValueNet {
    num_hands: usize,
}

impl UniformValueNet {
    /// Create a zero-value estimator for games with `num_hands` hands.
    pub fn new(num_hands: usize) -> Self {
        Self { num_hands }
    }
}

impl ValueNet for UniformValueNet {
    fn evaluate(
        &self,
        _state: &PublicState,
        _beliefs: &BeliefPair,
    ) -> Result<NetValues, EvaluationError> {
        Ok(NetValues {
            values: [vec![0.0; self.num_hands], vec![0.0; self.num_hands]],
        })
    }
}
