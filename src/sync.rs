#[cfg(feature = "loom")]
mod imp {
    use crate::{config::ExecutorConfig, error::ExecutorBuildError};
    pub(crate) use loom::sync::{
        Condvar, Mutex, MutexGuard,
        atomic::{AtomicBool, AtomicUsize, Ordering, fence},
    };

    /// Every job gets its own model thread so loom can explore interleavings.
    #[derive(Debug)]
    pub(crate) struct WorkerPool {
        workers: usize,
    }

    impl WorkerPool {
        pub(crate) fn build(config: &ExecutorConfig) -> Result<Self, ExecutorBuildError> {
            Ok(Self {
                workers: config.workers().get(),
            })
        }

        pub(crate) fn spawn(&self, job: impl FnOnce() + Send + 'static) {
            drop(loom::thread::spawn(job));
        }

        pub(crate) fn num_workers(&self) -> usize {
            self.workers
        }
    }
}

#[cfg(not(feature = "loom"))]
mod imp {
    use crate::{config::ExecutorConfig, error::ExecutorBuildError};
    pub(crate) use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering, fence};
    pub(crate) use std::sync::{Condvar, Mutex, MutexGuard};

    #[derive(Debug)]
    pub(crate) struct WorkerPool(rayon::ThreadPool);

    impl WorkerPool {
        pub(crate) fn build(config: &ExecutorConfig) -> Result<Self, ExecutorBuildError> {
            let prefix = config.thread_name_prefix().to_owned();
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.workers().get())
                .thread_name(move |idx| format!("{prefix}-{idx}"))
                .build()?;
            Ok(Self(pool))
        }

        pub(crate) fn spawn(&self, job: impl FnOnce() + Send + 'static) {
            self.0.spawn(job);
        }

        pub(crate) fn num_workers(&self) -> usize {
            self.0.current_num_threads()
        }
    }
}

pub(crate) use imp::*;
use std::sync::PoisonError;

/// Lock a mutex, ignoring poisoning.
///
/// Task callables run under `catch_unwind` and never while a runtime lock is
/// held, so a poisoned lock cannot carry a half-applied update.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Block on `condvar` until it is notified, ignoring poisoning like [`lock`].
pub(crate) fn wait<'a, T>(condvar: &Condvar, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
    condvar.wait(guard).unwrap_or_else(PoisonError::into_inner)
}
