//! Prioritized experience replay for value-net training data.
//!
//! A bounded, thread-safe buffer of [`Transition`]s. Worker threads push,
//! the training side samples proportionally to `priority^alpha` and gets
//! importance weights `(1 / (N * P(i)))^beta` back for bias correction.
//! Eviction at capacity prefers entries that have already been sampled at
//! least once, so fresh data is never dropped just because a trainer is slow.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use half::f16;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::cfr::resolver::Transition;

/// Stored value targets, either full or half precision.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum ValueStore {
    Full(Vec<f32>),
    Half(Vec<f16>),
}

impl ValueStore {
    fn encode(values: &[f32], compressed: bool) -> Self {
        if compressed {
            ValueStore::Half(values.iter().map(|&v| f16::from_f32(v)).collect())
        } else {
            ValueStore::Full(values.to_vec())
        }
    }

    fn decode(&self) -> Vec<f32> {
        match self {
            ValueStore::Full(v) => v.clone(),
            ValueStore::Half(v) => v.iter().map(|h| h.to_f32()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    seq: u64,
    query: Vec<f32>,
    values: ValueStore,
    priority: f64,
    sampled: bool,
}

/// Serialized buffer contents.
#[derive(Serialize, Deserialize)]
struct SavedState {
    entries: Vec<Entry>,
    next_seq: u64,
    num_add: u64,
}

struct Inner {
    entries: VecDeque<Entry>,
    next_seq: u64,
    num_add: u64,
    rng: StdRng,
    prefetched: VecDeque<Sample>,
}

/// A sampled training batch.
#[derive(Debug, Clone)]
pub struct Sample {
    /// The sampled transitions.
    pub transitions: Vec<Transition>,
    /// Buffer sequence ids, for feeding back into
    /// [`ValueReplay::update_priority`].
    pub seqs: Vec<u64>,
    /// Importance weights `(1 / (N * P(i)))^beta`.
    pub weights: Vec<f32>,
}

/// Errors from replay buffer operations.
#[derive(Debug)]
pub enum ReplayError {
    /// Sampling a batch larger than the current entry count. Recoverable:
    /// retry once more data has been pushed.
    EmptyBuffer {
        /// Requested batch size.
        requested: usize,
        /// Entries available.
        available: usize,
    },
    /// A saved state does not fit this buffer's capacity.
    Capacity {
        /// Entries the operation needs to hold.
        required: usize,
        /// This buffer's capacity.
        capacity: usize,
    },
    /// File I/O failure on save or load.
    Io(std::io::Error),
    /// Serialization failure on save or load.
    Serde(serde_json::Error),
}

impl std::fmt::Display for ReplayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplayError::EmptyBuffer {
                requested,
                available,
            } => write!(
                f,
                "replay buffer has {} entries, batch of {} requested",
                available, requested
            ),
            ReplayError::Capacity { required, capacity } => write!(
                f,
                "replay buffer capacity {} cannot hold {} entries",
                capacity, required
            ),
            ReplayError::Io(e) => write!(f, "replay buffer io error: {}", e),
            ReplayError::Serde(e) => write!(f, "replay buffer serialization error: {}", e),
        }
    }
}

impl std::error::Error for ReplayError {}

impl From<std::io::Error> for ReplayError {
    fn from(e: std::io::Error) -> Self {
        ReplayError::Io(e)
    }
}

impl From<serde_json::Error> for ReplayError {
    fn from(e: serde_json::Error) -> Self {
        ReplayError::Serde(e)
    }
}

/// Bounded prioritized replay buffer, safe to share across threads.
pub struct ValueReplay {
    capacity: usize,
    alpha: f64,
    beta: f64,
    prefetch: usize,
    use_priority: bool,
    compressed_values: bool,
    inner: Mutex<Inner>,
}

impl ValueReplay {
    /// Create a buffer.
    ///
    /// `alpha` shapes the sampling distribution (`0` = uniform), `beta`
    /// shapes the importance weights, `prefetch` pre-draws extra batches per
    /// sample call, and `compressed_values` stores targets in half
    /// precision. With `use_priority` off, priorities are ignored entirely.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        capacity: usize,
        seed: u64,
        alpha: f64,
        beta: f64,
        prefetch: usize,
        use_priority: bool,
        compressed_values: bool,
    ) -> Self {
        Self {
            capacity,
            alpha,
            beta,
            prefetch,
            use_priority,
            compressed_values,
            inner: Mutex::new(Inner {
                entries: VecDeque::with_capacity(capacity),
                next_seq: 0,
                num_add: 0,
                rng: StdRng::seed_from_u64(seed),
                prefetched: VecDeque::new(),
            }),
        }
    }

    /// Create a buffer from the pipeline configuration.
    pub fn from_config(config: &crate::cfr::config::PipelineConfig) -> Self {
        Self::new(
            config.capacity,
            config.seed,
            config.alpha,
            config.beta,
            config.prefetch,
            config.alpha > 0.0,
            config.compressed_values,
        )
    }

    /// Current number of entries.
    pub fn size(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Total transitions ever pushed. Monotonic; unaffected by eviction,
    /// which makes it the natural progress measure for a self-play run.
    pub fn num_add(&self) -> u64 {
        self.inner.lock().num_add
    }

    /// Sequence ids currently held, oldest first.
    pub fn seqs(&self) -> Vec<u64> {
        self.inner.lock().entries.iter().map(|e| e.seq).collect()
    }

    /// Add one transition with the given initial priority.
    ///
    /// At capacity, the oldest already-sampled entry is evicted; if nothing
    /// has been sampled yet, the oldest entry goes.
    pub fn push(&self, transition: &Transition, priority: f64) {
        let mut inner = self.inner.lock();
        if inner.entries.len() >= self.capacity {
            match inner.entries.iter().position(|e| e.sampled) {
                Some(i) => {
                    inner.entries.remove(i);
                }
                None => {
                    inner.entries.pop_front();
                }
            }
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.num_add += 1;
        inner.entries.push_back(Entry {
            seq,
            query: transition.query.clone(),
            values: ValueStore::encode(&transition.values, self.compressed_values),
            priority: priority.max(0.0),
            sampled: false,
        });
    }

    /// Draw `batch_size` transitions with replacement, proportionally to
    /// `priority^alpha`. Fails while the buffer holds fewer than
    /// `batch_size` entries.
    ///
    /// When prefetch is configured, extra batches are drawn under the same
    /// lock and served on later calls; those may be one priority update
    /// stale, which prioritized replay tolerates by construction.
    pub fn sample(&self, batch_size: usize) -> Result<Sample, ReplayError> {
        let mut inner = self.inner.lock();
        while let Some(batch) = inner.prefetched.pop_front() {
            if batch.transitions.len() == batch_size {
                return Ok(batch);
            }
            // Drawn for a different batch size; discard and draw fresh.
        }
        if inner.entries.len() < batch_size {
            return Err(ReplayError::EmptyBuffer {
                requested: batch_size,
                available: inner.entries.len(),
            });
        }

        let first = self.draw(&mut inner, batch_size);
        for _ in 0..self.prefetch {
            let batch = self.draw(&mut inner, batch_size);
            inner.prefetched.push_back(batch);
        }
        Ok(first)
    }

    fn draw(&self, inner: &mut Inner, batch_size: usize) -> Sample {
        let n = inner.entries.len();
        let weights: Vec<f64> = inner
            .entries
            .iter()
            .map(|e| {
                if self.use_priority {
                    e.priority.powf(self.alpha)
                } else {
                    1.0
                }
            })
            .collect();
        let total: f64 = weights.iter().sum();

        let mut transitions = Vec::with_capacity(batch_size);
        let mut seqs = Vec::with_capacity(batch_size);
        let mut importance = Vec::with_capacity(batch_size);
        for _ in 0..batch_size {
            let index = if total > 0.0 {
                let mut target = inner.rng.gen::<f64>() * total;
                let mut chosen = n - 1;
                for (i, &w) in weights.iter().enumerate() {
                    target -= w;
                    if target <= 0.0 {
                        chosen = i;
                        break;
                    }
                }
                chosen
            } else {
                inner.rng.gen_range(0..n)
            };

            let probability = if total > 0.0 {
                weights[index] / total
            } else {
                1.0 / n as f64
            };
            importance.push((1.0 / (n as f64 * probability)).powf(self.beta) as f32);

            let entry = &mut inner.entries[index];
            entry.sampled = true;
            seqs.push(entry.seq);
            transitions.push(Transition {
                query: entry.query.clone(),
                values: entry.values.decode(),
            });
        }

        Sample {
            transitions,
            seqs,
            weights: importance,
        }
    }

    /// Re-prioritize entries by sequence id. Ids already evicted are
    /// silently skipped.
    pub fn update_priority(&self, seqs: &[u64], priorities: &[f64]) {
        debug_assert_eq!(seqs.len(), priorities.len());
        let mut inner = self.inner.lock();
        for (&seq, &priority) in seqs.iter().zip(priorities.iter()) {
            if let Some(entry) = inner.entries.iter_mut().find(|e| e.seq == seq) {
                entry.priority = priority.max(0.0);
            }
        }
    }

    /// Drop every entry with a sequence id below `seq`. Pre-drawn batches
    /// are invalidated too: the watermark bounds staleness, and a cached
    /// batch may hold exactly the entries being discarded.
    pub fn pop_until(&self, seq: u64) {
        let mut inner = self.inner.lock();
        while inner.entries.front().is_some_and(|e| e.seq < seq) {
            inner.entries.pop_front();
        }
        inner.prefetched.clear();
    }

    /// Persist the buffer contents, counters included, as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ReplayError> {
        let inner = self.inner.lock();
        let state = SavedState {
            entries: inner.entries.iter().cloned().collect(),
            next_seq: inner.next_seq,
            num_add: inner.num_add,
        };
        let file = BufWriter::new(File::create(path)?);
        serde_json::to_writer(file, &state)?;
        Ok(())
    }

    /// Replace the buffer contents with a previously saved state.
    ///
    /// The restore is exact or it does not happen: a saved set larger than
    /// this buffer's capacity is rejected rather than truncated.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<(), ReplayError> {
        let file = BufReader::new(File::open(path)?);
        let state: SavedState = serde_json::from_reader(file)?;
        if state.entries.len() > self.capacity {
            return Err(ReplayError::Capacity {
                required: state.entries.len(),
                capacity: self.capacity,
            });
        }

        let mut inner = self.inner.lock();
        inner.entries = state.entries.into();
        inner.next_seq = state.next_seq;
        inner.num_add = state.num_add;
        inner.prefetched.clear();
        log::info!("replay buffer loaded: {} entries", inner.entries.len());
        Ok(())
    }
}
