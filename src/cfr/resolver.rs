//! Continual re-solving.
//!
//! Plays out one full game by repeatedly solving depth-limited subgames:
//! unroll a tree at the current state, run CFR against value-net leaf
//! estimates, emit a training transition for the root, then advance. Beliefs
//! are carried forward with a Bayesian update on every observed action, so
//! each successive solve starts from posteriors consistent with the play so
//! far.

use std::sync::Arc;

use rand::Rng;

use crate::cfr::config::RecursiveParams;
use crate::cfr::game::{BeliefPair, Beliefs, Game, PublicState};
use crate::cfr::solver::{SolverError, SubgameSolver, TreeStrategy};
use crate::cfr::tree::unroll;
use crate::cfr::value::{EvaluationError, ValueNet};

/// One training example: a value-net query paired with the solved target.
///
/// `query` encodes the public state and both belief vectors; `values` holds
/// both players' per-hand root counterfactual values from the solve, player 0
/// first. Stored as `f32` since that is the precision the training side
/// consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Encoded state and beliefs, as the value net would be queried.
    pub query: Vec<f32>,
    /// Solve targets: `2 * num_hands` values, player 0's hands first.
    pub values: Vec<f32>,
}

/// Errors from a resolving trajectory.
#[derive(Debug)]
pub enum ResolveError {
    /// The value backend failed. The trajectory is discarded; the caller may
    /// start a fresh one.
    Evaluation(EvaluationError),
    /// The inner solve diverged numerically. Fatal for the worker.
    Diverged,
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveError::Evaluation(e) => write!(f, "{}", e),
            ResolveError::Diverged => write!(f, "subgame solve diverged"),
        }
    }
}

impl std::error::Error for ResolveError {}

impl From<SolverError> for ResolveError {
    fn from(e: SolverError) -> Self {
        match e {
            SolverError::Evaluation(e) => ResolveError::Evaluation(e),
            SolverError::DivergedNumerically | SolverError::MissingValueNet => {
                ResolveError::Diverged
            }
        }
    }
}

/// Encode a value-net query: one-hot last action (with a slot for "none"),
/// the acting player, raw pot contributions, the move counter, then both
/// belief vectors normalized.
pub fn encode_query<G: Game>(
    game: &G,
    state: &PublicState,
    beliefs: &BeliefPair,
) -> Vec<f32> {
    let num_actions = game.num_actions();
    let mut query = Vec::with_capacity(query_len(game));

    let mut one_hot = vec![0.0f32; num_actions + 1];
    match state.last_action {
        Some(a) => one_hot[a] = 1.0,
        None => one_hot[num_actions] = 1.0,
    }
    query.extend_from_slice(&one_hot);
    query.push(state.player_id as f32);
    query.push(state.bets[0] as f32);
    query.push(state.bets[1] as f32);
    query.push(state.round as f32);
    for beliefs in beliefs.iter() {
        query.extend(beliefs.normalized().weights().iter().map(|&w| w as f32));
    }
    query
}

/// Length of an encoded query for `game`.
pub fn query_len<G: Game>(game: &G) -> usize {
    (game.num_actions() + 1) + 4 + 2 * game.num_hands()
}

/// Bayesian belief update after observing the acting player choose
/// `action_slot`: each hand's weight is multiplied by the probability that
/// hand played the action, then renormalized (uniform if no hand could
/// have played it).
fn posterior(beliefs: &Beliefs, strategy_row: &[f64], actions: usize, action_slot: usize) -> Beliefs {
    let weights = beliefs
        .weights()
        .iter()
        .enumerate()
        .map(|(hand, &w)| w * strategy_row[hand * actions + action_slot])
        .collect();
    Beliefs::new(weights).normalized()
}

/// Plays full games by continual re-solving, emitting one [`Transition`] per
/// subgame solved.
pub struct RecursiveResolver<G: Game, R: Rng> {
    game: G,
    params: RecursiveParams,
    net: Arc<dyn ValueNet>,
    rng: R,
}

impl<G: Game, R: Rng> RecursiveResolver<G, R> {
    /// Create a resolver playing `game` with leaf values from `net`.
    pub fn new(game: G, params: RecursiveParams, net: Arc<dyn ValueNet>, rng: R) -> Self {
        Self {
            game,
            params,
            net,
            rng,
        }
    }

    /// Replace the value net used for subsequent solves.
    pub fn set_net(&mut self, net: Arc<dyn ValueNet>) {
        self.net = net;
    }

    /// Play one full game from the initial state, returning every transition
    /// generated along the way.
    pub fn run_game(&mut self) -> Result<Vec<Transition>, ResolveError> {
        let mut state = self.game.initial_state();
        let mut beliefs = [self.game.initial_beliefs(), self.game.initial_beliefs()];
        let mut transitions = Vec::new();

        while !self.game.is_terminal(&state) {
            let (transition, next_state, next_beliefs) =
                self.resolve_once(state, beliefs)?;
            transitions.push(transition);
            state = next_state;
            beliefs = next_beliefs;
        }

        log::debug!(
            "trajectory finished: {} transitions, final pot {:?}",
            transitions.len(),
            state.bets
        );
        Ok(transitions)
    }

    /// Solve one subgame at `state`, emit its transition, and advance to the
    /// next root (a single real step, or a sampled subgame leaf).
    fn resolve_once(
        &mut self,
        state: PublicState,
        beliefs: BeliefPair,
    ) -> Result<(Transition, PublicState, BeliefPair), ResolveError> {
        let tree = unroll(&self.game, state, self.params.subgame_params.max_depth);
        let mut solver = SubgameSolver::new(
            self.game.clone(),
            tree,
            beliefs.clone(),
            Some(Arc::clone(&self.net)),
            self.params.subgame_params.clone(),
        )?;
        solver.multistep(self.params.subgame_params.num_iters)?;

        let transition = Transition {
            query: encode_query(&self.game, &state, &beliefs),
            values: solver
                .get_root_values(0)?
                .into_iter()
                .chain(solver.get_root_values(1)?)
                .map(|v| v as f32)
                .collect(),
        };

        let strategy = solver.get_strategy();
        let (next_state, next_beliefs) = if self.params.sample_leaf {
            self.descend_to_leaf(solver.tree(), &strategy, beliefs)
        } else {
            self.advance_one_step(solver.tree(), &strategy, state, beliefs)
        };
        Ok((transition, next_state, next_beliefs))
    }

    /// Take one real-game step from the subgame root: pick a root action
    /// (solved strategy marginalized over the actor's beliefs, with optional
    /// uniform exploration), update the actor's beliefs, and transition.
    fn advance_one_step(
        &mut self,
        tree: &crate::cfr::tree::Tree,
        strategy: &TreeStrategy,
        state: PublicState,
        mut beliefs: BeliefPair,
    ) -> (PublicState, BeliefPair) {
        let actor = state.player_id;
        let actions = tree.root().children.len();
        let legal = self.game.legal_actions(&state);

        let slot = if self.rng.gen::<f64>() < self.params.random_action_prob {
            self.rng.gen_range(0..actions)
        } else {
            // Marginal action distribution under the actor's beliefs.
            let marginal: Vec<f64> = (0..actions)
                .map(|a| {
                    beliefs[actor]
                        .normalized()
                        .weights()
                        .iter()
                        .enumerate()
                        .map(|(hand, &w)| w * strategy[0][hand * actions + a])
                        .sum()
                })
                .collect();
            sample_index(&mut self.rng, &marginal)
        };

        beliefs[actor] = posterior(&beliefs[actor], &strategy[0], actions, slot);
        // The action came straight out of legal_actions, so transition
        // failure would be a broken game implementation.
        let next_state = self
            .game
            .transition(&state, legal[slot])
            .unwrap_or_else(|e| panic!("game rejected its own legal action: {}", e));
        (next_state, beliefs)
    }

    /// Sample a path from the subgame root to one of its leaves, applying the
    /// belief update at every edge. Recursing from a deeper root gives the
    /// value net training coverage of states a single-step walk rarely
    /// reaches.
    fn descend_to_leaf(
        &mut self,
        tree: &crate::cfr::tree::Tree,
        strategy: &TreeStrategy,
        mut beliefs: BeliefPair,
    ) -> (PublicState, BeliefPair) {
        let mut index = 0;
        while !tree.node(index).is_leaf() {
            let node = tree.node(index);
            let actor = node.state.player_id;
            let actions = node.children.len();

            let marginal: Vec<f64> = (0..actions)
                .map(|a| {
                    beliefs[actor]
                        .normalized()
                        .weights()
                        .iter()
                        .enumerate()
                        .map(|(hand, &w)| w * strategy[index][hand * actions + a])
                        .sum()
                })
                .collect();
            let slot = sample_index(&mut self.rng, &marginal);

            beliefs[actor] = posterior(&beliefs[actor], &strategy[index], actions, slot);
            index = node.children[slot];
        }
        (tree.node(index).state, beliefs)
    }
}

/// Sample an index proportional to `weights`, falling back to uniform when
/// all mass is zero.
fn sample_index<R: Rng>(rng: &mut R, weights: &[f64]) -> usize {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return rng.gen_range(0..weights.len());
    }
    let mut target = rng.gen::<f64>() * total;
    for (i, &w) in weights.iter().enumerate() {
        target -= w;
        if target <= 0.0 {
            return i;
        }
    }
    weights.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::cfr::config::SubgameParams;
    use crate::cfr::value::{NetValues, UniformValueNet};
    use crate::games::kuhn::KuhnPoker;

    fn resolver(params: RecursiveParams, seed: u64) -> RecursiveResolver<KuhnPoker, StdRng> {
        let game = KuhnPoker::default();
        let net: Arc<dyn ValueNet> = Arc::new(UniformValueNet::new(game.num_hands()));
        RecursiveResolver::new(game, params, net, StdRng::seed_from_u64(seed))
    }

    #[test]
    fn test_run_game_produces_transitions() {
        let params = RecursiveParams::default()
            .with_subgame(SubgameParams::default().with_iters(32).with_max_depth(2));
        let mut resolver = resolver(params, 7);
        let transitions = resolver.run_game().unwrap();

        // Kuhn games last between one and three moves, one solve per move.
        assert!(!transitions.is_empty());
        assert!(transitions.len() <= 3);

        let game = KuhnPoker::default();
        for t in &transitions {
            assert_eq!(t.query.len(), query_len(&game));
            assert_eq!(t.values.len(), 2 * game.num_hands());
            assert!(t.values.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_sample_leaf_trajectory_terminates() {
        let params = RecursiveParams::default()
            .with_sample_leaf(true)
            .with_subgame(SubgameParams::default().with_iters(32).with_max_depth(2));
        let mut resolver = resolver(params, 11);
        for seed_run in 0..10 {
            let transitions = resolver.run_game().unwrap();
            assert!(!transitions.is_empty(), "run {} emitted nothing", seed_run);
        }
    }

    #[test]
    fn test_posterior_zeros_inconsistent_hands() {
        // Three hands, two actions; hand 1 never plays action slot 0.
        let beliefs = Beliefs::uniform(3);
        let strategy_row = vec![0.5, 0.5, 0.0, 1.0, 0.8, 0.2];
        let post = posterior(&beliefs, &strategy_row, 2, 0);
        assert_eq!(post.weights()[1], 0.0);
        assert!((post.mass() - 1.0).abs() < 1e-12);
        // Hand 0 is now more likely than hand 2 in proportion 0.5 : 0.8.
        assert!((post.weights()[0] / post.weights()[2] - 0.5 / 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_posterior_uniform_when_action_impossible() {
        let beliefs = Beliefs::uniform(2);
        let strategy_row = vec![0.0, 1.0, 0.0, 1.0];
        let post = posterior(&beliefs, &strategy_row, 2, 0);
        assert!((post.weights()[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_query_encoding_shape() {
        let game = KuhnPoker::default();
        let state = game.initial_state();
        let beliefs = [game.initial_beliefs(), game.initial_beliefs()];
        let query = encode_query(&game, &state, &beliefs);
        assert_eq!(query.len(), query_len(&game));
        // Root has no last action: "none" slot is hot.
        assert_eq!(query[game.num_actions()], 1.0);
    }

    struct FailingNet;

    impl ValueNet for FailingNet {
        fn evaluate(
            &self,
            _state: &PublicState,
            _beliefs: &BeliefPair,
        ) -> Result<NetValues, EvaluationError> {
            Err(EvaluationError::new("backend offline"))
        }
    }

    #[test]
    fn test_evaluation_failure_is_recoverable_error() {
        let game = KuhnPoker::default();
        let params = RecursiveParams::default()
            .with_subgame(SubgameParams::default().with_iters(8).with_max_depth(1));
        let mut resolver = RecursiveResolver::new(
            game,
            params,
            Arc::new(FailingNet) as Arc<dyn ValueNet>,
            StdRng::seed_from_u64(3),
        );
        assert!(matches!(
            resolver.run_game(),
            Err(ResolveError::Evaluation(_))
        ));
    }
}
