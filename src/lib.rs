//! Self-play training pipeline for imperfect-information games.
//!
//! The crate generates value-net training data by continual re-solving:
//! worker threads repeatedly solve depth-limited subgames with CFR, using
//! the current net to value the depth cutoff, and push the solved root
//! values into a prioritized replay buffer for the training side to consume.
//!
//! Layout:
//! - [`cfr`] — game model, tree unrolling, the CFR solver, the recursive
//!   resolver, and best-response evaluation
//! - [`games`] — concrete games (Kuhn poker)
//! - [`replay`] — the prioritized replay buffer
//! - [`model`] — hot-swappable value-net slots
//! - [`pipeline`] — the worker-thread pool and its lifecycle
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use resolver_pipeline::cfr::{PipelineConfig, UniformValueNet, ValueNet};
//! use resolver_pipeline::games::kuhn::KuhnPoker;
//! use resolver_pipeline::model::ModelLocker;
//! use resolver_pipeline::pipeline::{Context, DataLoop};
//! use resolver_pipeline::replay::ValueReplay;
//!
//! let config = PipelineConfig::default().with_threads(2);
//! let game = KuhnPoker::default();
//! let locker = Arc::new(ModelLocker::single(
//!     Arc::new(UniformValueNet::new(3)) as Arc<dyn ValueNet>,
//! ));
//! let replay = Arc::new(ValueReplay::from_config(&config));
//!
//! let mut context = Context::new();
//! for i in 0..config.num_threads {
//!     context.push_thread_loop(Box::new(DataLoop::new(
//!         game.clone(),
//!         config.recursive_params.clone(),
//!         Arc::clone(&locker),
//!         Arc::clone(&replay),
//!         0,
//!         config.seed + i as u64,
//!     )));
//! }
//! context.start().unwrap();
//! while replay.num_add() < 10 {
//!     std::thread::sleep(std::time::Duration::from_millis(10));
//! }
//! context.terminate();
//! ```

#![warn(missing_docs)]

pub mod cfr;
pub mod games;
pub mod model;
pub mod pipeline;
pub mod replay;

pub use cfr::{
    compute_exploitability, Game, PipelineConfig, RecursiveParams, SubgameParams,
    SubgameSolver, Transition, UniformValueNet, ValueNet,
};
pub use model::ModelLocker;
pub use pipeline::{Context, DataLoop};
pub use replay::ValueReplay;
