//! Depth-limited CFR solving and continual re-solving.
//!
//! The layers, bottom to top:
//! - [`game`]: the `Game` trait, public states and belief distributions
//! - [`tree`]: unrolling a public tree to a depth cutoff
//! - [`value`]: the estimator interface for depth-limited leaves
//! - [`solver`]: vector-form CFR over one fixed tree
//! - [`resolver`]: playing full games by re-solving subgame after subgame
//! - [`exploitability`]: best-response evaluation of a full-game strategy
//! - [`config`]: parameters for all of the above

pub mod config;
pub mod exploitability;
pub mod game;
pub mod resolver;
pub mod solver;
pub mod tree;
pub mod value;

pub use config::{ConfigError, PipelineConfig, RecursiveParams, SubgameParams};
pub use exploitability::{best_response_values, compute_exploitability};
pub use game::{Action, BeliefPair, Beliefs, Game, GameError, PublicState};
pub use resolver::{RecursiveResolver, ResolveError, Transition};
pub use solver::{SolverError, SubgameSolver, TreeStrategy};
pub use tree::{unroll, Node, Tree};
pub use value::{EvaluationError, NetValues, UniformValueNet, ValueNet};
