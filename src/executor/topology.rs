use crate::{
    error::FlowError,
    executor::{Executor, setup::Plan},
    sync::{AtomicBool, AtomicUsize, Condvar, Mutex, Ordering, lock, wait},
};
use derive_more::Debug;
use std::sync::Arc;
use tracing::{debug, warn};

/// One dispatched run of a graph.
///
/// Completion is tracked by two counters:
/// - `sinks_left`: sinks of the root plan plus sinks of every detached
///   subflow spliced in so far. Reaching zero means every node finished.
/// - `active`: jobs scheduled or running. After a failure some nodes never
///   become ready, so the topology also completes once this drains.
#[derive(Debug)]
pub(crate) struct Topology {
    #[debug(skip)]
    pub(super) executor: Arc<Executor>,
    root: Arc<Plan>,
    sinks_left: AtomicUsize,
    active: AtomicUsize,
    failed: AtomicBool,
    state: Mutex<State>,
    finished: Condvar,
}

#[derive(Debug)]
struct State {
    done: bool,
    error: Option<FlowError>,
}

impl Topology {
    pub(super) fn new(executor: Arc<Executor>, root: Arc<Plan>) -> Self {
        let state = State {
            done: root.len() == 0,
            error: None,
        };
        Self {
            executor,
            sinks_left: AtomicUsize::new(root.num_sinks),
            root,
            active: AtomicUsize::new(0),
            failed: AtomicBool::new(false),
            state: Mutex::new(state),
            finished: Condvar::new(),
        }
    }

    pub(crate) fn root(&self) -> &Arc<Plan> {
        &self.root
    }

    /// Register the sinks of a detached subflow.
    ///
    /// Must be called by a running job, which keeps `sinks_left` above zero.
    pub(super) fn add_sinks(&self, count: usize) {
        self.sinks_left.fetch_add(count, Ordering::AcqRel);
    }

    pub(super) fn sink_finished(&self) {
        if self.sinks_left.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.complete();
        }
    }

    /// Account for `count` jobs about to be scheduled.
    pub(super) fn enter(&self, count: usize) {
        self.active.fetch_add(count, Ordering::AcqRel);
    }

    /// Account for a job that returned.
    pub(super) fn retire(&self) {
        if self.active.fetch_sub(1, Ordering::AcqRel) == 1 && self.failed.load(Ordering::Acquire) {
            self.complete();
        }
    }

    pub(super) fn fail(&self, error: FlowError) {
        {
            let mut state = lock(&self.state);
            if state.error.is_some() {
                warn!(%error, "task failed after an earlier failure");
            } else {
                warn!(%error, "task failed");
                state.error = Some(error);
            }
        }
        self.failed.store(true, Ordering::Release);
    }

    fn complete(&self) {
        let mut state = lock(&self.state);
        if state.done {
            return;
        }
        state.done = true;
        debug!(
            nodes = self.root.len(),
            failed = state.error.is_some(),
            "topology completed"
        );
        drop(state);
        self.finished.notify_all();
    }

    pub(crate) fn is_done(&self) -> bool {
        lock(&self.state).done
    }

    /// Block until the topology completes.
    ///
    /// # Errors
    /// The first failure captured while running.
    pub(crate) fn wait(&self) -> Result<(), FlowError> {
        let mut state = lock(&self.state);
        while !state.done {
            state = wait(&self.finished, state);
        }
        state.error.clone().map_or(Ok(()), Err)
    }
}
