//! Configuration for subgame solving, recursive resolving and the pipeline.
//!
//! Three layers, matching the three layers of the engine: `SubgameParams`
//! controls a single CFR solve, `RecursiveParams` wraps it with the
//! continual re-solving options, and `PipelineConfig` adds the worker pool
//! and replay buffer knobs.

use serde::{Deserialize, Serialize};

/// Configuration for one depth-limited CFR solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubgameParams {
    /// CFR iterations per resolve.
    pub num_iters: usize,

    /// Depth cutoff for the unrolled subgame tree.
    pub max_depth: usize,

    /// Linear CFR: weight iteration `t`'s contribution by `t`.
    pub linear_update: bool,

    /// Optimistic updates: regret matching against cumulative regret plus
    /// the most recent regret delta (one-step look-ahead).
    pub optimistic: bool,

    /// Use CFR regret updates. Kept for configuration-file compatibility;
    /// only `true` is supported, `validate` rejects anything else.
    pub use_cfr: bool,

    /// Discounted CFR: apply per-iteration discounts to accumulated
    /// positive regret, negative regret, and the strategy average.
    pub dcfr: bool,

    /// DCFR exponent for positive regrets (alpha).
    pub dcfr_alpha: f64,

    /// DCFR exponent for negative regrets (beta).
    pub dcfr_beta: f64,

    /// DCFR exponent for the strategy average (gamma).
    pub dcfr_gamma: f64,
}

impl Default for SubgameParams {
    fn default() -> Self {
        Self {
            num_iters: 1024,
            max_depth: 2,
            linear_update: false,
            optimistic: false,
            use_cfr: true,
            dcfr: false,
            dcfr_alpha: 1.5,
            dcfr_beta: 0.0,
            dcfr_gamma: 2.0,
        }
    }
}

impl SubgameParams {
    /// Default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Linear CFR preset, the usual choice for self-play data generation.
    pub fn linear() -> Self {
        Self {
            linear_update: true,
            ..Default::default()
        }
    }

    /// Discounted CFR preset with the standard published exponents.
    pub fn discounted(alpha: f64, beta: f64, gamma: f64) -> Self {
        Self {
            dcfr: true,
            dcfr_alpha: alpha,
            dcfr_beta: beta,
            dcfr_gamma: gamma,
            ..Default::default()
        }
    }

    /// Builder method: set iterations per resolve.
    pub fn with_iters(mut self, num_iters: usize) -> Self {
        self.num_iters = num_iters;
        self
    }

    /// Builder method: set the depth cutoff.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Builder method: toggle linear weighting.
    pub fn with_linear_update(mut self, enable: bool) -> Self {
        self.linear_update = enable;
        self
    }

    /// Builder method: toggle optimistic updates.
    pub fn with_optimistic(mut self, enable: bool) -> Self {
        self.optimistic = enable;
        self
    }

    /// Validate the parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_iters == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        if self.max_depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }
        if !self.use_cfr {
            return Err(ConfigError::CfrDisabled);
        }
        if self.dcfr && self.linear_update {
            return Err(ConfigError::ConflictingVariants);
        }
        Ok(())
    }
}

/// Configuration for the continual re-solving loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecursiveParams {
    /// Parameters for each inner subgame solve.
    pub subgame_params: SubgameParams,

    /// Probability of taking a uniformly random root action instead of
    /// sampling the solved strategy (exploration noise for data diversity).
    pub random_action_prob: f64,

    /// When true, recurse from a sampled leaf of the solved subgame instead
    /// of advancing a single real-game step.
    pub sample_leaf: bool,
}

impl Default for RecursiveParams {
    fn default() -> Self {
        Self {
            subgame_params: SubgameParams::default(),
            random_action_prob: 0.0,
            sample_leaf: false,
        }
    }
}

impl RecursiveParams {
    /// Default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the inner solve parameters.
    pub fn with_subgame(mut self, params: SubgameParams) -> Self {
        self.subgame_params = params;
        self
    }

    /// Builder method: set exploration probability.
    pub fn with_random_action_prob(mut self, prob: f64) -> Self {
        self.random_action_prob = prob.clamp(0.0, 1.0);
        self
    }

    /// Builder method: toggle leaf sampling.
    pub fn with_sample_leaf(mut self, enable: bool) -> Self {
        self.sample_leaf = enable;
        self
    }

    /// Validate the parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.random_action_prob) {
            return Err(ConfigError::InvalidProbability(
                "random_action_prob",
                self.random_action_prob,
            ));
        }
        self.subgame_params.validate()
    }
}

/// Configuration for the whole self-play pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Resolving parameters given to every worker.
    pub recursive_params: RecursiveParams,

    /// Number of worker threads.
    pub num_threads: usize,

    /// Replay buffer capacity.
    pub capacity: usize,

    /// Priority exponent: samples are drawn proportional to
    /// `priority^alpha`.
    pub alpha: f64,

    /// Importance-sampling exponent for bias correction weights.
    pub beta: f64,

    /// Number of batches the buffer pre-draws per sample call.
    pub prefetch: usize,

    /// Store transition values in half precision inside the buffer.
    pub compressed_values: bool,

    /// Base random seed; worker `i` is seeded with `seed + i`.
    pub seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            recursive_params: RecursiveParams::default(),
            num_threads: 4,
            capacity: 1 << 16,
            alpha: 1.0,
            beta: 1.0,
            prefetch: 0,
            compressed_values: false,
            seed: 0,
        }
    }
}

impl PipelineConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the worker count.
    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Builder method: set replay capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Builder method: set the base random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builder method: set the resolving parameters.
    pub fn with_recursive_params(mut self, params: RecursiveParams) -> Self {
        self.recursive_params = params;
        self
    }

    /// Validate the full configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_threads == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.alpha < 0.0 {
            return Err(ConfigError::InvalidExponent("alpha", self.alpha));
        }
        if self.beta < 0.0 {
            return Err(ConfigError::InvalidExponent("beta", self.beta));
        }
        self.recursive_params.validate()
    }
}

/// Errors from configuration validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// `num_iters` must be positive.
    ZeroIterations,
    /// `max_depth` must be positive: a zero-depth subgame has no decision
    /// to solve.
    ZeroDepth,
    /// `num_threads` must be positive.
    ZeroThreads,
    /// Replay capacity must be positive.
    ZeroCapacity,
    /// Linear and discounted weighting cannot both be enabled.
    ConflictingVariants,
    /// `use_cfr` cannot be disabled; non-CFR regret updates are not
    /// implemented.
    CfrDisabled,
    /// A probability is outside [0, 1].
    InvalidProbability(&'static str, f64),
    /// A sampling exponent is negative.
    InvalidExponent(&'static str, f64),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ZeroIterations => write!(f, "num_iters must be positive"),
            ConfigError::ZeroDepth => write!(f, "max_depth must be positive"),
            ConfigError::ZeroThreads => write!(f, "num_threads must be positive"),
            ConfigError::ZeroCapacity => write!(f, "replay capacity must be positive"),
            ConfigError::ConflictingVariants => {
                write!(f, "linear_update and dcfr are mutually exclusive")
            }
            ConfigError::CfrDisabled => {
                write!(f, "use_cfr: false is not supported; regret updates always use CFR")
            }
            ConfigError::InvalidProbability(name, val) => {
                write!(f, "{} {} is out of range [0, 1]", name, val)
            }
            ConfigError::InvalidExponent(name, val) => {
                write!(f, "{} {} must be non-negative", name, val)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
        assert!(RecursiveParams::default().validate().is_ok());
        assert!(SubgameParams::default().validate().is_ok());
    }

    #[test]
    fn test_conflicting_variants_rejected() {
        let params = SubgameParams::discounted(1.5, 0.0, 2.0).with_linear_update(true);
        assert_eq!(params.validate(), Err(ConfigError::ConflictingVariants));
    }

    #[test]
    fn test_disabling_cfr_rejected() {
        let params = SubgameParams {
            use_cfr: false,
            ..Default::default()
        };
        assert_eq!(params.validate(), Err(ConfigError::CfrDisabled));
    }

    #[test]
    fn test_zero_values_rejected() {
        assert!(SubgameParams::default().with_iters(0).validate().is_err());
        assert!(SubgameParams::default().with_max_depth(0).validate().is_err());
        assert!(PipelineConfig::default().with_threads(0).validate().is_err());
        assert!(PipelineConfig::default().with_capacity(0).validate().is_err());
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = PipelineConfig::default()
            .with_threads(8)
            .with_seed(7)
            .with_recursive_params(
                RecursiveParams::default()
                    .with_sample_leaf(true)
                    .with_subgame(SubgameParams::linear().with_iters(256)),
            );
        let text = serde_json::to_string(&config).unwrap();
        let back: PipelineConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back.num_threads, 8);
        assert_eq!(back.seed, 7);
        assert!(back.recursive_params.sample_leaf);
        assert_eq!(back.recursive_params.subgame_params.num_iters, 256);
        assert!(back.recursive_params.subgame_params.linear_update);
    }
}
