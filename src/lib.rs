//! Parallel runtime for task-dependency graphs that can grow while they run.
//!
//! This crate executes Directed Acyclic Graphs (DAGs) of tasks on a pool of
//! worker threads. It:
//! - Runs every task as soon as all of its predecessors have finished, with
//!   no ordering among tasks that are ready at the same time.
//! - Lets a running task spawn a whole nested graph (a *subflow*) which is
//!   spliced into the running topology, either attached (successors of the
//!   spawning task wait for it) or detached (only completion of the topology
//!   waits for it). Subflows nest to any depth.
//! - Captures task failures (returned errors and panics) and reports the
//!   first one at the next wait point, without cancelling unrelated work.
//!
//! Key modules:
//! - `graph`: the node arena, the [`Subflow`](graph::Subflow) builder and the
//!   graph-building operations shared by both levels.
//! - `task`: the copyable [`Task`](task::Task) handle used to name, rebind
//!   and connect nodes.
//! - `flow`: the top-level [`Taskflow`](flow::Taskflow) with dispatch,
//!   waiting and DOT dumps.
//! - `executor`: worker pool, readiness propagation and topology
//!   bookkeeping.
//!
//! Quick start:
//! 1. Build an [`Executor`](executor::Executor) from an
//!    [`ExecutorConfig`](config::ExecutorConfig) and wrap it in an `Arc`.
//! 2. Create a [`Taskflow`](flow::Taskflow), add tasks with `emplace` /
//!    `emplace_subflow` and connect them with `precede`.
//! 3. Call `dispatch` (and `get` on the handle) or `wait_for_all`.
//!
//! ```
//! use dagflow::{config::ExecutorConfig, executor::Executor, flow::Taskflow};
//! use std::sync::{
//!     Arc,
//!     atomic::{AtomicUsize, Ordering},
//! };
//!
//! let executor = Arc::new(Executor::new(ExecutorConfig::default()).unwrap());
//! let flow = Taskflow::new(executor);
//! let count = Arc::new(AtomicUsize::new(0));
//!
//! let c = Arc::clone(&count);
//! let spawner = flow.emplace_subflow(move |subflow| {
//!     let (c1, c2) = (Arc::clone(&c), Arc::clone(&c));
//!     let first = subflow.emplace(move || {
//!         c1.fetch_add(1, Ordering::Relaxed);
//!     });
//!     let second = subflow.emplace(move || {
//!         c2.fetch_add(1, Ordering::Relaxed);
//!     });
//!     first.precede(second);
//! });
//! let c = Arc::clone(&count);
//! let last = flow.emplace(move || assert_eq!(c.load(Ordering::Relaxed), 2));
//! spawner.precede(last);
//!
//! flow.dispatch().get().unwrap();
//! ```

/// Executor configuration (worker count, thread names).
pub mod config;
/// Failures reported by the runtime.
pub mod error;
/// The scheduling engine.
///
/// Contains the worker pool, the frozen execution plans built at dispatch,
/// topology completion tracking and the splicing of subflows into a running
/// topology.
pub mod executor;
/// The top-level taskflow and topology handles.
pub mod flow;
/// Graph storage, work items and the subflow builder.
pub mod graph;
mod sync;
/// Task handles and the return types accepted from task callables.
pub mod task;
/// Common aliases (node indices, callable types, errors).
pub mod types;
