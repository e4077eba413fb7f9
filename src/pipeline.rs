//! Self-play worker pool.
//!
//! A [`Context`] owns a set of worker threads, each running a [`ThreadLoop`]
//! that plays games by continual re-solving and feeds the replay buffer.
//! Control is cooperative: workers poll a shared [`Control`] between
//! resolves, so pause and terminate take effect at resolve boundaries and
//! never interrupt a solve midway.

use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::cfr::config::RecursiveParams;
use crate::cfr::game::Game;
use crate::cfr::resolver::{RecursiveResolver, ResolveError};
use crate::model::ModelLocker;
use crate::replay::ValueReplay;

/// Lifecycle of the worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Threads not yet started.
    Stopped,
    /// Workers producing data.
    Running,
    /// Workers parked at their next checkpoint.
    Paused,
    /// Workers shutting down; final state.
    Terminated,
}

/// Errors from pool control.
#[derive(Debug, PartialEq, Eq)]
pub enum PipelineError {
    /// The requested lifecycle transition is not allowed from the current
    /// state.
    InvalidTransition {
        /// State the pool was in.
        from: LoopState,
        /// State that was requested.
        to: LoopState,
    },
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::InvalidTransition { from, to } => {
                write!(f, "cannot transition worker pool from {:?} to {:?}", from, to)
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// Shared lifecycle flag workers poll between resolves.
pub struct Control {
    state: Mutex<LoopState>,
    condvar: Condvar,
}

impl Control {
    fn new() -> Self {
        Self {
            state: Mutex::new(LoopState::Stopped),
            condvar: Condvar::new(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LoopState {
        *self.state.lock()
    }

    /// Block while paused (or not yet started); returns `false` once the
    /// pool is terminating and the caller should exit its loop.
    pub fn checkpoint(&self) -> bool {
        let mut state = self.state.lock();
        while matches!(*state, LoopState::Stopped | LoopState::Paused) {
            self.condvar.wait(&mut state);
        }
        *state == LoopState::Running
    }

    fn transition(&self, from: LoopState, to: LoopState) -> Result<(), PipelineError> {
        let mut state = self.state.lock();
        if *state != from {
            return Err(PipelineError::InvalidTransition { from: *state, to });
        }
        *state = to;
        self.condvar.notify_all();
        Ok(())
    }

    fn terminate(&self) {
        let mut state = self.state.lock();
        *state = LoopState::Terminated;
        self.condvar.notify_all();
    }
}

/// A worker body run on its own thread until the control says stop.
pub trait ThreadLoop: Send + 'static {
    /// Run until [`Control::checkpoint`] returns `false`.
    fn run(&mut self, control: &Control);
}

/// The standard worker: plays full games by continual re-solving and pushes
/// every transition into the replay buffer.
pub struct DataLoop<G: Game> {
    game: G,
    params: RecursiveParams,
    locker: Arc<ModelLocker>,
    replay: Arc<ValueReplay>,
    slot: usize,
    seed: u64,
}

impl<G: Game> DataLoop<G> {
    /// Create a worker drawing its net from `slot` of the locker.
    pub fn new(
        game: G,
        params: RecursiveParams,
        locker: Arc<ModelLocker>,
        replay: Arc<ValueReplay>,
        slot: usize,
        seed: u64,
    ) -> Self {
        Self {
            game,
            params,
            locker,
            replay,
            slot,
            seed,
        }
    }
}

impl<G: Game> ThreadLoop for DataLoop<G> {
    fn run(&mut self, control: &Control) {
        let rng = StdRng::seed_from_u64(self.seed);
        let mut resolver = RecursiveResolver::new(
            self.game.clone(),
            self.params.clone(),
            self.locker.acquire(self.slot),
            rng,
        );

        while control.checkpoint() {
            // Pick up whatever net the trainer last published; the swap
            // only ever happens between games.
            resolver.set_net(self.locker.acquire(self.slot));
            match resolver.run_game() {
                Ok(transitions) => {
                    for transition in &transitions {
                        self.replay.push(transition, 1.0);
                    }
                }
                Err(ResolveError::Evaluation(e)) => {
                    // Transient backend failure: drop the trajectory and
                    // try again with a fresh net handle.
                    log::warn!("worker {}: trajectory discarded: {}", self.seed, e);
                }
                Err(err @ ResolveError::Diverged) => {
                    log::error!("worker {}: {}; worker exiting", self.seed, err);
                    return;
                }
            }
        }
    }
}

/// Owns the worker threads and their shared control.
pub struct Context {
    control: Arc<Control>,
    pending: Vec<Box<dyn ThreadLoop>>,
    handles: Vec<JoinHandle<()>>,
}

impl Context {
    /// An empty context in the `Stopped` state.
    pub fn new() -> Self {
        Self {
            control: Arc::new(Control::new()),
            pending: Vec::new(),
            handles: Vec::new(),
        }
    }

    /// The shared control, for observers that want to inspect pool state.
    pub fn control(&self) -> Arc<Control> {
        Arc::clone(&self.control)
    }

    /// Register a worker. Before `start` the loop is queued; while the pool
    /// runs its thread is spawned immediately. A terminated pool refuses new
    /// workers: there is no one left to join them.
    pub fn push_thread_loop(&mut self, thread_loop: Box<dyn ThreadLoop>) {
        match self.control.state() {
            LoopState::Stopped => self.pending.push(thread_loop),
            LoopState::Terminated => {
                log::warn!("worker registered after terminate; dropping it");
            }
            LoopState::Running | LoopState::Paused => self.spawn(thread_loop),
        }
    }

    /// Number of workers registered.
    pub fn num_threads(&self) -> usize {
        self.pending.len() + self.handles.len()
    }

    /// Launch all queued workers.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        self.control
            .transition(LoopState::Stopped, LoopState::Running)?;
        log::info!("starting {} worker threads", self.pending.len());
        for thread_loop in std::mem::take(&mut self.pending) {
            self.spawn(thread_loop);
        }
        Ok(())
    }

    /// Park every worker at its next checkpoint.
    pub fn pause(&self) -> Result<(), PipelineError> {
        self.control
            .transition(LoopState::Running, LoopState::Paused)
    }

    /// Wake parked workers.
    pub fn resume(&self) -> Result<(), PipelineError> {
        self.control
            .transition(LoopState::Paused, LoopState::Running)
    }

    /// Shut the pool down and join every worker thread. Idempotent.
    pub fn terminate(&mut self) {
        self.control.terminate();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                log::error!("worker thread panicked");
            }
        }
    }

    /// True once `terminate` has run and every thread has been joined.
    pub fn terminated(&self) -> bool {
        self.control.state() == LoopState::Terminated && self.handles.is_empty()
    }

    fn spawn(&mut self, mut thread_loop: Box<dyn ThreadLoop>) {
        let control = Arc::clone(&self.control);
        self.handles
            .push(std::thread::spawn(move || thread_loop.run(&control)));
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::cfr::config::{RecursiveParams, SubgameParams};
    use crate::cfr::value::{UniformValueNet, ValueNet};
    use crate::games::kuhn::KuhnPoker;

    fn build_context(num_threads: usize) -> (Context, Arc<ValueReplay>) {
        let game = KuhnPoker::default();
        let params = RecursiveParams::default()
            .with_subgame(SubgameParams::default().with_iters(16).with_max_depth(2));
        let locker = Arc::new(ModelLocker::single(
            Arc::new(UniformValueNet::new(game.num_hands())) as Arc<dyn ValueNet>,
        ));
        let replay = Arc::new(ValueReplay::new(1024, 0, 1.0, 1.0, 0, false, false));

        let mut context = Context::new();
        for i in 0..num_threads {
            context.push_thread_loop(Box::new(DataLoop::new(
                game.clone(),
                params.clone(),
                Arc::clone(&locker),
                Arc::clone(&replay),
                0,
                i as u64,
            )));
        }
        (context, replay)
    }

    #[test]
    fn test_workers_produce_data_and_terminate() {
        let (mut context, replay) = build_context(4);
        assert_eq!(context.num_threads(), 4);

        context.start().unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while replay.num_add() < 20 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        context.terminate();

        assert!(context.terminated());
        assert!(replay.num_add() >= 20, "got {}", replay.num_add());
    }

    #[test]
    fn test_pause_stops_data_production() {
        let (mut context, replay) = build_context(2);
        context.start().unwrap();

        while replay.num_add() == 0 {
            std::thread::sleep(Duration::from_millis(5));
        }
        context.pause().unwrap();
        // Workers drain to their next checkpoint, then stand still.
        std::thread::sleep(Duration::from_millis(100));
        let frozen = replay.num_add();
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(replay.num_add(), frozen);

        context.resume().unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while replay.num_add() == frozen && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(replay.num_add() > frozen);
        context.terminate();
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let (mut context, _replay) = build_context(1);

        // Pause before start and resume while running are both rejected.
        assert!(context.pause().is_err());
        context.start().unwrap();
        assert!(context.resume().is_err());
        assert!(context.start().is_err());
        context.terminate();

        // Nothing restarts a terminated pool.
        assert!(context.start().is_err());
        assert!(context.pause().is_err());
    }

    #[test]
    fn test_push_after_terminate_is_refused() {
        let (mut context, replay) = build_context(0);
        context.terminate();
        assert!(context.terminated());

        let game = KuhnPoker::default();
        let locker = Arc::new(ModelLocker::single(
            Arc::new(UniformValueNet::new(game.num_hands())) as Arc<dyn ValueNet>,
        ));
        context.push_thread_loop(Box::new(DataLoop::new(
            game,
            RecursiveParams::default(),
            locker,
            Arc::clone(&replay),
            0,
            0,
        )));

        // No thread was spawned and the pool stays terminated.
        assert_eq!(context.num_threads(), 0);
        assert!(context.terminated());
        assert_eq!(replay.num_add(), 0);
    }

    #[test]
    fn test_terminate_without_start() {
        let (mut context, _replay) = build_context(2);
        context.terminate();
        assert!(context.terminated());
    }
}
