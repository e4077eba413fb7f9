//! Depth-limited CFR over an unrolled public tree.
//!
//! The solver keeps all per-node state in flat arrays indexed by node id and
//! `hand * num_node_actions + action`, never in pointer-linked nodes. One
//! `step()` performs a full iteration: both players' counterfactual values
//! are computed by backward induction from the leaves, regrets are
//! accumulated with the configured variant weighting, and the cumulative
//! (average) strategy is advanced.
//!
//! Supported variants:
//! - **Linear CFR**: iteration `t` contributes with weight `t`
//! - **Discounted CFR**: separate discount exponents for positive regret,
//!   negative regret and the strategy average (alpha/beta/gamma)
//! - **Optimistic**: regret matching against cumulative regret plus the most
//!   recent regret delta

use std::sync::Arc;

use crate::cfr::config::SubgameParams;
use crate::cfr::game::{BeliefPair, Beliefs, Game};
use crate::cfr::tree::Tree;
use crate::cfr::value::{EvaluationError, ValueNet};

/// A behavioural strategy over a tree: for every decision node a row of
/// probabilities indexed `hand * num_node_actions + action_slot`. Leaf rows
/// are empty.
pub type TreeStrategy = Vec<Vec<f64>>;

/// Errors surfaced by the solver.
#[derive(Debug)]
pub enum SolverError {
    /// Regret accumulation left the representable range (NaN/Inf detected).
    /// Fatal for this resolve; never clamped silently.
    DivergedNumerically,
    /// The tree has depth-limited leaves but no value net was supplied.
    MissingValueNet,
    /// The value-estimation backend failed; the resolve should be retried
    /// from a fresh root.
    Evaluation(EvaluationError),
}

impl std::fmt::Display for SolverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolverError::DivergedNumerically => {
                write!(f, "regret accumulation diverged to non-finite values")
            }
            SolverError::MissingValueNet => {
                write!(f, "tree has depth-limited leaves but no value net")
            }
            SolverError::Evaluation(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SolverError {}

impl From<EvaluationError> for SolverError {
    fn from(e: EvaluationError) -> Self {
        SolverError::Evaluation(e)
    }
}

/// CFR solver over one fixed subgame tree.
pub struct SubgameSolver<G: Game> {
    game: G,
    tree: Tree,
    params: SubgameParams,
    net: Option<Arc<dyn ValueNet>>,
    root_beliefs: BeliefPair,

    /// Cumulative counterfactual regrets, `[node][hand * actions + slot]`.
    regrets: Vec<Vec<f64>>,
    /// Cumulative strategy weights for the average strategy.
    strategy_sums: Vec<Vec<f64>>,
    /// Most recent regret deltas, kept only for optimistic matching.
    last_deltas: Option<Vec<Vec<f64>>>,

    num_steps: u64,
}

impl<G: Game> SubgameSolver<G> {
    /// Create a solver for `tree` rooted at the given beliefs.
    ///
    /// `net` may be `None` only when every leaf of the tree is terminal;
    /// otherwise the solver has no way to value the depth cutoff.
    pub fn new(
        game: G,
        tree: Tree,
        root_beliefs: BeliefPair,
        net: Option<Arc<dyn ValueNet>>,
        params: SubgameParams,
    ) -> Result<Self, SolverError> {
        if net.is_none() {
            let has_pseudo_leaf =
                (0..tree.len()).any(|i| tree.is_pseudo_leaf(&game, i));
            if has_pseudo_leaf {
                return Err(SolverError::MissingValueNet);
            }
        }

        let num_hands = game.num_hands();
        let rows: Vec<Vec<f64>> = tree
            .nodes()
            .map(|n| vec![0.0; num_hands * n.children.len()])
            .collect();

        let last_deltas = params.optimistic.then(|| rows.clone());

        Ok(Self {
            game,
            tree,
            params,
            net,
            root_beliefs,
            regrets: rows.clone(),
            strategy_sums: rows,
            last_deltas,
            num_steps: 0,
        })
    }

    /// The tree being solved.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Iterations completed so far.
    pub fn num_steps(&self) -> u64 {
        self.num_steps
    }

    /// Run one full CFR iteration (both players).
    pub fn step(&mut self) -> Result<(), SolverError> {
        self.num_steps += 1;
        let t = self.num_steps;

        let strategies = self.current_strategies();
        let reach = self.compute_reach(&strategies);
        for traverser in 0..2 {
            self.update_regrets(traverser, &strategies, &reach, t)?;
        }

        if self.params.dcfr {
            self.apply_dcfr_discounts(t);
        }
        self.check_finite()?;
        Ok(())
    }

    /// Run `n` iterations, stopping at the first error.
    pub fn multistep(&mut self, n: usize) -> Result<(), SolverError> {
        for _ in 0..n {
            self.step()?;
        }
        Ok(())
    }

    /// The time-averaged strategy. Valid at any point; before the first
    /// iteration every decision is uniform.
    pub fn get_strategy(&self) -> TreeStrategy {
        let num_hands = self.game.num_hands();
        self.tree
            .nodes()
            .enumerate()
            .map(|(i, node)| {
                let actions = node.children.len();
                let mut row = vec![0.0; num_hands * actions];
                for hand in 0..num_hands {
                    let slice = &self.strategy_sums[i][hand * actions..(hand + 1) * actions];
                    let total: f64 = slice.iter().sum();
                    for a in 0..actions {
                        row[hand * actions + a] = if total > 0.0 {
                            slice[a] / total
                        } else {
                            1.0 / actions as f64
                        };
                    }
                }
                row
            })
            .collect()
    }

    /// Per-hand counterfactual values at the root for `player`, evaluated
    /// under the current average strategy. These are the training targets
    /// emitted by the resolver.
    pub fn get_root_values(&self, player: usize) -> Result<Vec<f64>, SolverError> {
        let strategies = self.get_strategy();
        let reach = self.compute_reach(&strategies);
        let values = self.backward_values(player, &strategies, &reach)?;
        Ok(values[0].clone())
    }

    /// Current (regret-matched) strategies for every decision node.
    fn current_strategies(&self) -> TreeStrategy {
        let num_hands = self.game.num_hands();
        self.tree
            .nodes()
            .enumerate()
            .map(|(i, node)| {
                let actions = node.children.len();
                let mut row = vec![0.0; num_hands * actions];
                for hand in 0..num_hands {
                    let base = hand * actions;
                    let mut positive = vec![0.0; actions];
                    let mut total = 0.0;
                    for a in 0..actions {
                        let mut r = self.regrets[i][base + a];
                        if let Some(deltas) = &self.last_deltas {
                            r += deltas[i][base + a];
                        }
                        if r > 0.0 {
                            positive[a] = r;
                            total += r;
                        }
                    }
                    for a in 0..actions {
                        row[base + a] = if total > 0.0 {
                            positive[a] / total
                        } else {
                            1.0 / actions as f64
                        };
                    }
                }
                row
            })
            .collect()
    }

    /// Per-player reach probabilities for every node, seeded with the root
    /// beliefs. A player's reach only picks up factors at their own
    /// decision nodes.
    fn compute_reach(&self, strategies: &TreeStrategy) -> [Vec<Vec<f64>>; 2] {
        let num_hands = self.game.num_hands();
        let n = self.tree.len();
        let mut reach = [
            vec![Vec::new(); n],
            vec![Vec::new(); n],
        ];
        for p in 0..2 {
            reach[p][0] = self.root_beliefs[p].weights().to_vec();
        }

        for i in 0..n {
            let node = self.tree.node(i);
            let actions = node.children.len();
            let actor = node.state.player_id;
            for (slot, &child) in node.children.iter().enumerate() {
                for p in 0..2 {
                    let child_reach: Vec<f64> = (0..num_hands)
                        .map(|hand| {
                            let mut r = reach[p][i][hand];
                            if p == actor {
                                r *= strategies[i][hand * actions + slot];
                            }
                            r
                        })
                        .collect();
                    reach[p][child] = child_reach;
                }
            }
        }
        reach
    }

    /// Backward induction: per-hand counterfactual values for `traverser`
    /// at every node, with leaves valued exactly (terminal) or by the value
    /// net (depth cutoff).
    fn backward_values(
        &self,
        traverser: usize,
        strategies: &TreeStrategy,
        reach: &[Vec<Vec<f64>>; 2],
    ) -> Result<Vec<Vec<f64>>, SolverError> {
        let num_hands = self.game.num_hands();
        let opponent = 1 - traverser;
        let mut values = vec![Vec::new(); self.tree.len()];

        for i in (0..self.tree.len()).rev() {
            let node = self.tree.node(i);
            if node.is_leaf() {
                values[i] = if self.game.is_terminal(&node.state) {
                    self.terminal_leaf_values(traverser, &node.state, &reach[opponent][i])
                } else {
                    self.estimated_leaf_values(traverser, i, reach)?
                };
                continue;
            }

            let actions = node.children.len();
            let mut node_values = vec![0.0; num_hands];
            if node.state.player_id == traverser {
                for hand in 0..num_hands {
                    let mut ev = 0.0;
                    for (slot, &child) in node.children.iter().enumerate() {
                        ev += strategies[i][hand * actions + slot] * values[child][hand];
                    }
                    node_values[hand] = ev;
                }
            } else {
                // The opponent's strategy is already folded into their reach
                // weights, so their decision just sums over children.
                for hand in 0..num_hands {
                    node_values[hand] =
                        node.children.iter().map(|&c| values[c][hand]).sum();
                }
            }
            values[i] = node_values;
        }
        Ok(values)
    }

    /// Exact counterfactual values at a terminal leaf: each traverser hand
    /// is scored against every opponent hand, weighted by opponent reach.
    fn terminal_leaf_values(
        &self,
        traverser: usize,
        state: &crate::cfr::game::PublicState,
        opp_reach: &[f64],
    ) -> Vec<f64> {
        let num_hands = self.game.num_hands();
        (0..num_hands)
            .map(|hand| {
                let mut v = 0.0;
                for (opp_hand, &w) in opp_reach.iter().enumerate() {
                    if w == 0.0 {
                        continue;
                    }
                    let payoff = if traverser == 0 {
                        self.game.terminal_value(state, hand, opp_hand)
                    } else {
                        -self.game.terminal_value(state, opp_hand, hand)
                    };
                    v += w * payoff;
                }
                v
            })
            .collect()
    }

    /// Estimated counterfactual values at a depth-limited leaf: query the
    /// value net with the normalized beliefs implied by current reach, then
    /// scale back by the opponent's reach mass.
    fn estimated_leaf_values(
        &self,
        traverser: usize,
        index: usize,
        reach: &[Vec<Vec<f64>>; 2],
    ) -> Result<Vec<f64>, SolverError> {
        let net = self.net.as_ref().ok_or(SolverError::MissingValueNet)?;
        let node = self.tree.node(index);
        let beliefs: BeliefPair = [
            Beliefs::new(reach[0][index].clone()).normalized(),
            Beliefs::new(reach[1][index].clone()).normalized(),
        ];
        let estimate = net.evaluate(&node.state, &beliefs)?;
        let opp_mass: f64 = reach[1 - traverser][index].iter().sum();
        Ok(estimate.values[traverser]
            .iter()
            .map(|v| v * opp_mass)
            .collect())
    }

    /// One traverser's half of an iteration: back up values, accumulate
    /// regrets at the traverser's decision nodes, and advance the strategy
    /// average.
    fn update_regrets(
        &mut self,
        traverser: usize,
        strategies: &TreeStrategy,
        reach: &[Vec<Vec<f64>>; 2],
        t: u64,
    ) -> Result<(), SolverError> {
        let num_hands = self.game.num_hands();
        let values = self.backward_values(traverser, strategies, reach)?;
        let weight = if self.params.linear_update {
            t as f64
        } else {
            1.0
        };

        for i in 0..self.tree.len() {
            let node = self.tree.node(i);
            if node.is_leaf() || node.state.player_id != traverser {
                continue;
            }
            let actions = node.children.len();
            for hand in 0..num_hands {
                let base = hand * actions;
                let mut ev = 0.0;
                for (slot, &child) in node.children.iter().enumerate() {
                    ev += strategies[i][base + slot] * values[child][hand];
                }
                for (slot, &child) in node.children.iter().enumerate() {
                    let delta = weight * (values[child][hand] - ev);
                    self.regrets[i][base + slot] += delta;
                    if let Some(deltas) = &mut self.last_deltas {
                        deltas[i][base + slot] = delta;
                    }
                }
                // Average strategy accumulates with the traverser's own
                // reach, so unreachable hands do not distort it.
                let my_reach = reach[traverser][i][hand];
                for slot in 0..actions {
                    self.strategy_sums[i][base + slot] +=
                        weight * my_reach * strategies[i][base + slot];
                }
            }
        }
        Ok(())
    }

    /// End-of-iteration DCFR discounts: positive regrets decay by
    /// `t^alpha / (t^alpha + 1)`, negative by `t^beta / (t^beta + 1)`, and
    /// the strategy average by `(t / (t + 1))^gamma`.
    fn apply_dcfr_discounts(&mut self, t: u64) {
        let t = t as f64;
        let pos = t.powf(self.params.dcfr_alpha) / (t.powf(self.params.dcfr_alpha) + 1.0);
        let neg = t.powf(self.params.dcfr_beta) / (t.powf(self.params.dcfr_beta) + 1.0);
        let avg = (t / (t + 1.0)).powf(self.params.dcfr_gamma);

        for row in &mut self.regrets {
            for r in row.iter_mut() {
                *r *= if *r > 0.0 { pos } else { neg };
            }
        }
        for row in &mut self.strategy_sums {
            for s in row.iter_mut() {
                *s *= avg;
            }
        }
    }

    /// Detect numerical divergence. Non-finite regret is a configuration or
    /// algorithmic defect and must be surfaced, never clamped.
    fn check_finite(&self) -> Result<(), SolverError> {
        for row in &self.regrets {
            if row.iter().any(|r| !r.is_finite()) {
                log::error!(
                    "non-finite regret detected at iteration {}",
                    self.num_steps
                );
                return Err(SolverError::DivergedNumerically);
            }
        }
        Ok(())
    }
}
