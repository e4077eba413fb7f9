//! Benchmarks for the CFR solver and the recursive resolver.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use resolver_pipeline::cfr::config::{RecursiveParams, SubgameParams};
use resolver_pipeline::cfr::resolver::RecursiveResolver;
use resolver_pipeline::cfr::tree::unroll;
use resolver_pipeline::cfr::{Game, SubgameSolver, UniformValueNet, ValueNet};
use resolver_pipeline::games::kuhn::KuhnPoker;

fn kuhn_iteration_benchmark(c: &mut Criterion) {
    let game = KuhnPoker::default();
    let tree = unroll(&game, game.initial_state(), 100);
    let beliefs = [game.initial_beliefs(), game.initial_beliefs()];
    let mut solver =
        SubgameSolver::new(game, tree, beliefs, None, SubgameParams::linear()).unwrap();

    c.bench_function("kuhn_single_iteration", |b| {
        b.iter(|| {
            solver.step().unwrap();
            black_box(solver.num_steps())
        })
    });
}

fn kuhn_1000_iterations_benchmark(c: &mut Criterion) {
    c.bench_function("kuhn_1000_iterations", |b| {
        b.iter(|| {
            let game = KuhnPoker::default();
            let tree = unroll(&game, game.initial_state(), 100);
            let beliefs = [game.initial_beliefs(), game.initial_beliefs()];
            let mut solver =
                SubgameSolver::new(game, tree, beliefs, None, SubgameParams::linear())
                    .unwrap();
            solver.multistep(black_box(1000)).unwrap();
            black_box(solver.get_strategy())
        })
    });
}

fn recursive_game_benchmark(c: &mut Criterion) {
    let game = KuhnPoker::default();
    let net: Arc<dyn ValueNet> = Arc::new(UniformValueNet::new(game.num_hands()));
    let params = RecursiveParams::default()
        .with_subgame(SubgameParams::default().with_iters(128).with_max_depth(2));
    let mut resolver =
        RecursiveResolver::new(game, params, net, StdRng::seed_from_u64(42));

    c.bench_function("kuhn_recursive_game", |b| {
        b.iter(|| black_box(resolver.run_game().unwrap()))
    });
}

criterion_group!(
    benches,
    kuhn_iteration_benchmark,
    kuhn_1000_iterations_benchmark,
    recursive_game_benchmark
);
criterion_main!(benches);
