use std::{error::Error, sync::Arc};
use thiserror::Error;

/// Failure reported at a blocking wait point of a topology.
///
/// Only the first failure of a topology is reported; later ones are logged.
/// The error is cheap to clone so every waiter of the same topology receives
/// the same value.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum FlowError {
    /// A task callable returned an error.
    #[error("task `{task}` failed: {source}")]
    TaskFailed {
        /// Name of the failed task (empty if it was never named).
        task: String,
        /// Error returned by the callable.
        #[source]
        source: Arc<dyn Error + Send + Sync + 'static>,
    },
    /// A task callable panicked.
    #[error("task `{task}` panicked: {message}")]
    TaskPanicked {
        /// Name of the panicking task (empty if it was never named).
        task: String,
        /// Panic payload rendered as text.
        message: String,
    },
}

impl FlowError {
    /// Name of the task that caused the failure.
    #[must_use]
    pub fn task(&self) -> &str {
        match self {
            Self::TaskFailed { task, .. } | Self::TaskPanicked { task, .. } => task,
        }
    }
}

/// Error returned by [`Executor::new`](crate::executor::Executor::new) when the
/// worker pool cannot be started.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExecutorBuildError {
    /// The underlying thread pool failed to spawn its workers.
    #[error("failed to build worker pool")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}
