mod execute;
mod setup;
mod topology;

pub(crate) use crate::executor::topology::Topology;
use crate::{
    config::ExecutorConfig,
    error::ExecutorBuildError,
    executor::{
        execute::schedule,
        setup::{JoinTarget, Plan},
    },
    graph::Graph,
    sync::WorkerPool,
};
use std::sync::Arc;
use tracing::debug;

/// Scheduling engine shared by any number of taskflows.
///
/// Key responsibilities:
/// - Owns the worker threads, which pull ready nodes and run their callables
///   in parallel.
/// - Freezes a graph into an execution plan on dispatch and schedules its
///   sources.
/// - Propagates readiness downstream: a finishing node decrements the pending
///   counter of each successor, and the node that observes a counter reach
///   zero schedules that successor (exactly once).
/// - Splices nested graphs built by subflow tasks into the running topology.
///
/// Ready nodes have no ordering guarantee among themselves; the only
/// ordering is the one given by precedence edges.
#[must_use]
#[derive(Debug)]
pub struct Executor {
    pool: WorkerPool,
    config: ExecutorConfig,
}

impl Executor {
    /// Start the worker threads described by `config`.
    ///
    /// # Errors
    /// If the worker threads cannot be spawned.
    pub fn new(config: ExecutorConfig) -> Result<Self, ExecutorBuildError> {
        let pool = WorkerPool::build(&config)?;
        debug!(workers = pool.num_workers(), "executor started");
        Ok(Self { pool, config })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn num_workers(&self) -> usize {
        self.pool.num_workers()
    }

    /// Configuration the executor was built with.
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Freeze `graph` and start running it.
    pub(crate) fn launch(self: &Arc<Self>, graph: &Graph) -> Arc<Topology> {
        let root = Arc::new(Plan::setup(graph, JoinTarget::Topology));
        debug!(
            nodes = root.len(),
            sources = root.sources.len(),
            sinks = root.num_sinks,
            "dispatching topology"
        );
        let topology = Arc::new(Topology::new(Arc::clone(self), Arc::clone(&root)));
        schedule(&topology, &root, &root.sources);
        topology
    }

    fn spawn(&self, job: impl FnOnce() + Send + 'static) {
        self.pool.spawn(job);
    }
}
