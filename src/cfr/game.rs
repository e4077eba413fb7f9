//! Game model for the re-solving engine.
//!
//! Any two-player zero-sum game with public actions and hidden hands can be
//! solved by implementing the `Game` trait. The engine only ever sees public
//! states and belief distributions over hands; private information enters
//! through `terminal_value`, which scores a concrete joint deal.

use std::fmt::Debug;

/// A legal move, identified by a small integer.
///
/// Action ids index directly into strategy and regret rows, so a game must
/// number its actions densely from 0 to `num_actions() - 1`.
pub type Action = usize;

/// The information visible to both players at a point in the game.
///
/// Immutable once created and equality-comparable; used as the tree-node key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicState {
    /// The most recent action, `None` at the root.
    pub last_action: Option<Action>,
    /// The player to act next (0 or 1).
    pub player_id: usize,
    /// Per-player pot contributions so far.
    pub bets: [u32; 2],
    /// Number of actions taken since the root of the full game.
    pub round: u32,
}

impl PublicState {
    /// The player who is *not* acting.
    pub fn opponent(&self) -> usize {
        1 - self.player_id
    }
}

/// A probability distribution over one player's possible hidden hands.
///
/// Weights are non-negative and of length `num_hands`; they need not sum to
/// one (counterfactual reach weights are carried unnormalized), but
/// [`Beliefs::normalized`] produces a proper distribution when one is needed.
#[derive(Debug, Clone, PartialEq)]
pub struct Beliefs {
    weights: Vec<f64>,
}

impl Beliefs {
    /// Create beliefs from raw non-negative weights.
    pub fn new(weights: Vec<f64>) -> Self {
        debug_assert!(weights.iter().all(|&w| w >= 0.0), "negative belief weight");
        Self { weights }
    }

    /// Uniform distribution over `num_hands` hands.
    pub fn uniform(num_hands: usize) -> Self {
        Self {
            weights: vec![1.0 / num_hands as f64; num_hands],
        }
    }

    /// Number of hands this distribution ranges over.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// True when there are no hands (never the case for a valid game).
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Read access to the raw weights.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Total mass of the distribution.
    pub fn mass(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// A normalized copy. Falls back to uniform when all mass is gone,
    /// so downstream consumers always see a proper distribution.
    pub fn normalized(&self) -> Self {
        let total = self.mass();
        if total > 0.0 {
            Self {
                weights: self.weights.iter().map(|w| w / total).collect(),
            }
        } else {
            Self::uniform(self.weights.len())
        }
    }

    /// Scale the weight of a single hand in place.
    pub fn scale(&mut self, hand: usize, factor: f64) {
        self.weights[hand] *= factor;
    }
}

/// One belief distribution per player, attached to a public state while
/// resolving. Indexed by player id.
pub type BeliefPair = [Beliefs; 2];

/// Errors raised by `Game` implementations.
#[derive(Debug, Clone, PartialEq)]
pub enum GameError {
    /// An action outside `legal_actions(state)` was applied. This is a
    /// contract violation by the caller and treated as fatal.
    InvalidAction {
        /// The offending action id.
        action: Action,
        /// The state it was applied to.
        state: PublicState,
    },
}

impl std::fmt::Display for GameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameError::InvalidAction { action, state } => {
                write!(f, "action {} is not legal in state {:?}", action, state)
            }
        }
    }
}

impl std::error::Error for GameError {}

/// The game contract consumed by the tree builder, solver and resolver.
///
/// All methods are deterministic given their inputs; chance is expressed
/// entirely through the initial belief distributions over hands.
pub trait Game: Clone + Send + Sync + 'static {
    /// Total number of distinct actions in the game.
    fn num_actions(&self) -> usize;

    /// Number of possible hidden hands per player (the length of every
    /// belief vector).
    fn num_hands(&self) -> usize;

    /// The public state at the start of the game.
    fn initial_state(&self) -> PublicState;

    /// The belief distribution each player starts with (typically uniform).
    fn initial_beliefs(&self) -> Beliefs {
        Beliefs::uniform(self.num_hands())
    }

    /// Whether the game is over at this state.
    fn is_terminal(&self, state: &PublicState) -> bool;

    /// Legal actions at a non-terminal state, in ascending action-id order.
    ///
    /// The ordering is load-bearing: tree children and strategy rows are
    /// indexed positionally by it.
    fn legal_actions(&self, state: &PublicState) -> Vec<Action>;

    /// Apply an action, producing the successor public state.
    ///
    /// Fails with [`GameError::InvalidAction`] if `action` is not in
    /// `legal_actions(state)`.
    fn transition(&self, state: &PublicState, action: Action) -> Result<PublicState, GameError>;

    /// Payoff to player 0 at a terminal state for a concrete joint deal.
    ///
    /// Impossible joint deals (e.g. both players holding the same card)
    /// must return 0 so they drop out of counterfactual sums.
    fn terminal_value(&self, state: &PublicState, hand0: usize, hand1: usize) -> f64;

    /// Human-readable action name for logs and strategy dumps.
    fn action_name(&self, action: Action) -> String {
        format!("a{}", action)
    }

    /// Human-readable state description for logs and strategy dumps.
    fn state_description(&self, state: &PublicState) -> String {
        format!("{:?}", state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beliefs_uniform_sums_to_one() {
        let b = Beliefs::uniform(4);
        assert_eq!(b.len(), 4);
        assert!((b.mass() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_beliefs_normalized() {
        let mut b = Beliefs::new(vec![2.0, 0.0, 6.0]);
        let n = b.normalized();
        assert!((n.weights()[0] - 0.25).abs() < 1e-12);
        assert!((n.weights()[2] - 0.75).abs() < 1e-12);

        // Zero mass falls back to uniform rather than NaN.
        b.scale(0, 0.0);
        b.scale(2, 0.0);
        let n = b.normalized();
        assert!((n.weights()[1] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_public_state_equality() {
        let a = PublicState {
            last_action: Some(1),
            player_id: 0,
            bets: [2, 1],
            round: 1,
        };
        let b = a;
        assert_eq!(a, b);
        assert_eq!(a.opponent(), 1);
    }
}
