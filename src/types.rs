use crate::graph::Subflow;
use indexmap::IndexSet as _IndexSet;
use rustc_hash::FxBuildHasher;
use std::error::Error;

/// Position of a node inside the arena of its owning graph.
///
/// Indices are stable for the lifetime of a graph generation: nodes are never
/// removed individually, only all at once by clearing the graph.
pub type NodeIndex = usize;

/// Type-erased error produced by a failing task.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Callable bound to a static task.
pub type StaticFn = dyn Fn() -> Result<(), BoxError> + Send + Sync + 'static;

/// Callable bound to a subflow-producing task.
///
/// The callable receives a fresh [`Subflow`] builder every time the task runs.
pub type SubflowFn = dyn Fn(&Subflow) -> Result<(), BoxError> + Send + Sync + 'static;

/// `IndexSet` type with fast hasher.
pub(crate) type IndexSet<T> = _IndexSet<T, FxBuildHasher>;
