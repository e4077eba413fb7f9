//! Best-response evaluation.
//!
//! Measures how far a strategy is from equilibrium by computing, for each
//! player in turn, the value of the best response against the other player's
//! fixed strategy. Needs a fully unrolled tree (no depth cutoff): an estimated
//! continuation value would make the number meaningless.

use crate::cfr::game::Game;
use crate::cfr::solver::TreeStrategy;
use crate::cfr::tree::{unroll, Tree};

/// Per-hand best-response values for `responder` at the root of `tree`,
/// playing against `strategy`.
///
/// The opponent's strategy is folded into their reach weights; the responder
/// maximizes over children at their own decision nodes.
///
/// # Panics
///
/// Panics if the tree contains a depth-limited (non-terminal) leaf.
pub fn best_response_values<G: Game>(
    game: &G,
    tree: &Tree,
    strategy: &TreeStrategy,
    responder: usize,
) -> Vec<f64> {
    let num_hands = game.num_hands();
    let opponent = 1 - responder;

    // Opponent reach per node per hand, seeded with their prior.
    let mut reach = vec![Vec::new(); tree.len()];
    reach[0] = game.initial_beliefs().weights().to_vec();
    for i in 0..tree.len() {
        let node = tree.node(i);
        let actions = node.children.len();
        for (slot, &child) in node.children.iter().enumerate() {
            reach[child] = (0..num_hands)
                .map(|hand| {
                    let mut r = reach[i][hand];
                    if node.state.player_id == opponent {
                        r *= strategy[i][hand * actions + slot];
                    }
                    r
                })
                .collect();
        }
    }

    let mut values = vec![Vec::new(); tree.len()];
    for i in (0..tree.len()).rev() {
        let node = tree.node(i);
        if node.is_leaf() {
            assert!(
                game.is_terminal(&node.state),
                "best response requires a fully unrolled tree"
            );
            values[i] = (0..num_hands)
                .map(|hand| {
                    let mut v = 0.0;
                    for (opp_hand, &w) in reach[i].iter().enumerate() {
                        if w == 0.0 {
                            continue;
                        }
                        let payoff = if responder == 0 {
                            game.terminal_value(&node.state, hand, opp_hand)
                        } else {
                            -game.terminal_value(&node.state, opp_hand, hand)
                        };
                        v += w * payoff;
                    }
                    v
                })
                .collect();
            continue;
        }

        values[i] = if node.state.player_id == responder {
            (0..num_hands)
                .map(|hand| {
                    node.children
                        .iter()
                        .map(|&c| values[c][hand])
                        .fold(f64::NEG_INFINITY, f64::max)
                })
                .collect()
        } else {
            (0..num_hands)
                .map(|hand| node.children.iter().map(|&c| values[c][hand]).sum())
                .collect()
        };
    }

    values[0].clone()
}

/// Root best-response value for `responder`: per-hand values weighted by the
/// responder's own prior.
pub fn best_response_value<G: Game>(
    game: &G,
    tree: &Tree,
    strategy: &TreeStrategy,
    responder: usize,
) -> f64 {
    let values = best_response_values(game, tree, strategy, responder);
    game.initial_beliefs()
        .weights()
        .iter()
        .zip(values.iter())
        .map(|(w, v)| w * v)
        .sum()
}

/// Exploitability of `strategy` over the full game: the mean of both
/// players' best-response values. Zero at an exact equilibrium.
///
/// `strategy` must have been produced on a fully unrolled tree from the
/// game's initial state, which this function rebuilds internally.
pub fn compute_exploitability<G: Game>(game: &G, strategy: &TreeStrategy) -> f64 {
    let tree = unroll(game, game.initial_state(), usize::MAX);
    let br0 = best_response_value(game, &tree, strategy, 0);
    let br1 = best_response_value(game, &tree, strategy, 1);
    (br0 + br1) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfr::config::SubgameParams;
    use crate::cfr::solver::SubgameSolver;
    use crate::games::kuhn::KuhnPoker;

    fn solve_full(iters: usize) -> (KuhnPoker, TreeStrategy) {
        let game = KuhnPoker::default();
        let tree = unroll(&game, game.initial_state(), 100);
        let beliefs = [game.initial_beliefs(), game.initial_beliefs()];
        let mut solver = SubgameSolver::new(
            game.clone(),
            tree,
            beliefs,
            None,
            SubgameParams::linear(),
        )
        .unwrap();
        solver.multistep(iters).unwrap();
        (game, solver.get_strategy())
    }

    fn uniform_strategy(game: &KuhnPoker) -> TreeStrategy {
        let tree = unroll(game, game.initial_state(), 100);
        tree.nodes()
            .map(|n| vec![0.5; game.num_hands() * n.children.len()])
            .collect()
    }

    #[test]
    fn test_uniform_strategy_is_exploitable() {
        let game = KuhnPoker::default();
        let strategy = uniform_strategy(&game);
        let exploitability = compute_exploitability(&game, &strategy);
        assert!(exploitability > 0.1, "got {:.4}", exploitability);
    }

    #[test]
    fn test_exploitability_decreases_with_iterations() {
        let game = KuhnPoker::default();
        let early = compute_exploitability(&game, &solve_full(16).1);
        let late = compute_exploitability(&game, &solve_full(2000).1);
        assert!(
            late < early,
            "exploitability rose: {:.4} -> {:.4}",
            early,
            late
        );
    }

    #[test]
    fn test_converged_strategy_near_equilibrium() {
        let (game, strategy) = solve_full(4000);
        let exploitability = compute_exploitability(&game, &strategy);
        assert!(exploitability < 0.01, "got {:.4}", exploitability);
    }

    #[test]
    fn test_best_response_never_worse_than_strategy_value() {
        // A best response against any strategy earns at least the game value
        // of player 0 in Kuhn (-1/18 for the first player).
        let game = KuhnPoker::default();
        let tree = unroll(&game, game.initial_state(), 100);
        let strategy = uniform_strategy(&game);
        let br0 = best_response_value(&game, &tree, &strategy, 0);
        assert!(br0 > -1.0 / 18.0 - 1e-9, "got {:.4}", br0);
    }
}
