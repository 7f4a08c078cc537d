use core::num::NonZeroUsize;
use std::thread;

const DEFAULT_THREAD_NAME: &str = "dagflow-worker";

/// Configuration of an [`Executor`](crate::executor::Executor).
///
/// ```
/// use core::num::NonZeroUsize;
/// use dagflow::config::ExecutorConfig;
///
/// let config = ExecutorConfig::default()
///     .num_workers(NonZeroUsize::new(2).unwrap())
///     .thread_name("render");
/// assert_eq!(config.workers().get(), 2);
/// ```
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    num_workers: NonZeroUsize,
    thread_name: String,
}

impl ExecutorConfig {
    /// Set the number of worker threads.
    pub fn num_workers(mut self, num_workers: NonZeroUsize) -> Self {
        self.num_workers = num_workers;
        self
    }

    /// Set the prefix of worker thread names. Workers are named `{prefix}-{index}`.
    pub fn thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name = prefix.into();
        self
    }

    /// Configured number of worker threads.
    #[must_use]
    pub fn workers(&self) -> NonZeroUsize {
        self.num_workers
    }

    /// Configured prefix of worker thread names.
    #[must_use]
    pub fn thread_name_prefix(&self) -> &str {
        &self.thread_name
    }
}

impl Default for ExecutorConfig {
    /// One worker per available hardware thread.
    fn default() -> Self {
        Self {
            num_workers: thread::available_parallelism().unwrap_or(NonZeroUsize::MIN),
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_available_parallelism() {
        let config = ExecutorConfig::default();
        let expected = thread::available_parallelism().unwrap_or(NonZeroUsize::MIN);
        assert_eq!(config.workers(), expected);
        assert_eq!(config.thread_name_prefix(), DEFAULT_THREAD_NAME);
    }

    #[test]
    fn setters_override_defaults() {
        let config = ExecutorConfig::default()
            .num_workers(NonZeroUsize::new(3).unwrap())
            .thread_name("io");
        assert_eq!(config.workers().get(), 3);
        assert_eq!(config.thread_name_prefix(), "io");
    }
}
