//! Self-play data generation binary.
//!
//! Usage:
//!   cargo run --release --bin selfplay -- [OPTIONS]
//!
//! Options:
//!   --config <FILE>      Pipeline configuration JSON file (optional)
//!   --transitions <N>    Stop after N transitions generated (default: 10000)
//!   --threads <N>        Number of worker threads
//!   --deck <N>           Kuhn deck size (default: 3)
//!   --seed <N>           Base random seed
//!   --save <FILE>        Save the replay buffer on exit
//!   --sample-leaf        Recurse from sampled subgame leaves

use std::env;
use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

use resolver_pipeline::cfr::config::PipelineConfig;
use resolver_pipeline::cfr::tree::unroll;
use resolver_pipeline::cfr::{
    compute_exploitability, Game, SubgameSolver, UniformValueNet, ValueNet,
};
use resolver_pipeline::games::kuhn::KuhnPoker;
use resolver_pipeline::model::ModelLocker;
use resolver_pipeline::pipeline::{Context, DataLoop};
use resolver_pipeline::replay::ValueReplay;

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let mut config_file: Option<String> = None;
    let mut target_transitions: u64 = 10_000;
    let mut threads: Option<usize> = None;
    let mut deck_size: usize = 3;
    let mut seed: Option<u64> = None;
    let mut save_file: Option<String> = None;
    let mut sample_leaf = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                if i < args.len() {
                    config_file = Some(args[i].clone());
                }
            }
            "--transitions" | "-n" => {
                i += 1;
                if i < args.len() {
                    target_transitions = args[i].parse().unwrap_or(10_000);
                }
            }
            "--threads" | "-t" => {
                i += 1;
                if i < args.len() {
                    threads = args[i].parse().ok();
                }
            }
            "--deck" | "-d" => {
                i += 1;
                if i < args.len() {
                    deck_size = args[i].parse().unwrap_or(3);
                }
            }
            "--seed" | "-s" => {
                i += 1;
                if i < args.len() {
                    seed = args[i].parse().ok();
                }
            }
            "--save" | "-o" => {
                i += 1;
                if i < args.len() {
                    save_file = Some(args[i].clone());
                }
            }
            "--sample-leaf" => {
                sample_leaf = true;
            }
            "--help" | "-h" => {
                print_help();
                return;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                return;
            }
        }
        i += 1;
    }

    println!("=================================================");
    println!("  Self-Play Data Generation");
    println!("=================================================");
    println!();

    // Load or build configuration
    let mut config = if let Some(path) = &config_file {
        println!("Loading configuration from: {}", path);
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                eprintln!("Error reading config: {}", e);
                return;
            }
        };
        match serde_json::from_str::<PipelineConfig>(&text) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error parsing config: {}", e);
                return;
            }
        }
    } else {
        PipelineConfig::default()
    };

    if let Some(t) = threads {
        config = config.with_threads(t);
    }
    if let Some(s) = seed {
        config = config.with_seed(s);
    }
    if sample_leaf {
        config.recursive_params.sample_leaf = true;
    }
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        return;
    }

    println!("Game: Kuhn poker, {} cards", deck_size);
    println!("Threads: {}", config.num_threads);
    println!("Iterations per resolve: {}", config.recursive_params.subgame_params.num_iters);
    println!("Subgame depth: {}", config.recursive_params.subgame_params.max_depth);
    println!("Sample leaf: {}", config.recursive_params.sample_leaf);
    println!("Replay capacity: {}", config.capacity);
    println!("Target transitions: {}", target_transitions);
    println!("Seed: {}", config.seed);
    println!();

    // Build the pipeline
    let game = KuhnPoker::new(deck_size);
    let net: Arc<dyn ValueNet> = Arc::new(UniformValueNet::new(game.num_hands()));
    let locker = Arc::new(ModelLocker::single(Arc::clone(&net)));
    let replay = Arc::new(ValueReplay::from_config(&config));

    let mut context = Context::new();
    for worker in 0..config.num_threads {
        context.push_thread_loop(Box::new(DataLoop::new(
            game.clone(),
            config.recursive_params.clone(),
            Arc::clone(&locker),
            Arc::clone(&replay),
            0,
            config.seed + worker as u64,
        )));
    }

    println!("Starting {} workers...", config.num_threads);
    let start_time = Instant::now();
    if let Err(e) = context.start() {
        eprintln!("Failed to start workers: {}", e);
        return;
    }

    let bar = ProgressBar::new(target_transitions);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} transitions ({per_sec})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    while replay.num_add() < target_transitions {
        bar.set_position(replay.num_add().min(target_transitions));
        std::thread::sleep(Duration::from_millis(50));
    }
    bar.finish_with_message("done");
    context.terminate();

    let elapsed = start_time.elapsed().as_secs_f64();
    println!();
    println!("Generation complete!");
    println!("Transitions generated: {}", replay.num_add());
    println!("Buffer size: {}", replay.size());
    println!("Total time: {:.2}s", elapsed);
    println!("Throughput: {:.0} transitions/second", replay.num_add() as f64 / elapsed);
    println!();

    if let Some(path) = &save_file {
        println!("Saving replay buffer to {}...", path);
        match replay.save(path) {
            Ok(()) => println!("Buffer saved successfully!"),
            Err(e) => eprintln!("Error saving buffer: {}", e),
        }
        println!();
    }

    // Full-game solve for an exploitability reference point
    println!("=== Full-Game Solve ===");
    println!();

    let tree = unroll(&game, game.initial_state(), usize::MAX);
    let beliefs = [game.initial_beliefs(), game.initial_beliefs()];
    let params = config.recursive_params.subgame_params.clone().with_iters(4096);
    let mut solver = match SubgameSolver::new(game.clone(), tree, beliefs, None, params) {
        Ok(solver) => solver,
        Err(e) => {
            eprintln!("Full-game solve setup failed: {}", e);
            return;
        }
    };
    if let Err(e) = solver.multistep(4096) {
        eprintln!("Full-game solve failed: {}", e);
        return;
    }

    let strategy = solver.get_strategy();
    let exploitability = compute_exploitability(&game, &strategy);
    println!("Exploitability after 4096 iterations: {:.6}", exploitability);

    let root = game.initial_state();
    println!();
    println!("Root strategy ({}):", game.state_description(&root));
    let actions = game.legal_actions(&root);
    for hand in 0..game.num_hands() {
        print!("  hand {}:", hand);
        for (slot, &action) in actions.iter().enumerate() {
            print!(
                " {} {:.1}%",
                game.action_name(action),
                strategy[0][hand * actions.len() + slot] * 100.0
            );
        }
        println!();
    }

    println!();
    println!("Done!");
}

fn print_help() {
    println!("Self-Play Data Generation");
    println!();
    println!("Usage: selfplay [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config <FILE>      Pipeline configuration JSON file");
    println!("  -n, --transitions <N>    Stop after N transitions (default: 10000)");
    println!("  -t, --threads <N>        Number of worker threads");
    println!("  -d, --deck <N>           Kuhn deck size (default: 3)");
    println!("  -s, --seed <N>           Base random seed");
    println!("  -o, --save <FILE>        Save the replay buffer on exit");
    println!("  --sample-leaf            Recurse from sampled subgame leaves");
    println!("  -h, --help               Show this help");
    println!();
    println!("Examples:");
    println!("  # Generate 100k transitions on 8 threads");
    println!("  selfplay --transitions 100000 --threads 8");
    println!();
    println!("  # Leaf-sampling exploration with a saved buffer");
    println!("  selfplay --sample-leaf --save buffer.json");
}
