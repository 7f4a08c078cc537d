use crate::{
    graph::{Graph, Subflow, Work},
    types::{BoxError, NodeIndex},
};
use derive_more::Debug;

/// Lightweight, copyable handle to a node of a [`Graph`].
///
/// A handle borrows its graph and does not keep the node alive: once the
/// graph is cleared or dropped the borrow checker rejects further use.
/// Handles are meant for configuring a graph between dispatches; edits made
/// while a topology runs apply to the next dispatch only.
#[derive(Debug, Clone, Copy)]
pub struct Task<'g> {
    #[debug(skip)]
    graph: &'g Graph,
    index: NodeIndex,
}

impl<'g> Task<'g> {
    pub(crate) fn new(graph: &'g Graph, index: NodeIndex) -> Self {
        Self { graph, index }
    }

    /// Position of the node in its graph.
    #[must_use]
    pub fn index(self) -> NodeIndex {
        self.index
    }

    /// Display name of the task (empty if never set).
    #[must_use]
    pub fn name(self) -> String {
        self.graph.node(self.index, |node| node.name.clone())
    }

    /// Set the display name, replacing any previous one.
    pub fn set_name(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.graph.node_mut(self.index, |node| node.name = name);
        self
    }

    /// Rebind the node to a static callable.
    ///
    /// Any nested graph retained from a previous run is dropped.
    pub fn work<F, R>(self, work: F) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: IntoTaskResult,
    {
        self.rebind(Work::from_static(work))
    }

    /// Rebind the node to a subflow-producing callable.
    ///
    /// Any nested graph retained from a previous run is dropped.
    pub fn subflow<F, R>(self, work: F) -> Self
    where
        F: Fn(&Subflow) -> R + Send + Sync + 'static,
        R: IntoTaskResult,
    {
        self.rebind(Work::from_subflow(work))
    }

    fn rebind(self, work: Work) -> Self {
        self.graph.node_mut(self.index, |node| {
            node.work = work;
            node.nested = None;
        });
        self
    }

    /// Whether a callable is bound to the node.
    #[must_use]
    pub fn has_work(self) -> bool {
        self.graph.node(self.index, |node| !node.work.is_empty())
    }

    /// Make `other` run after this task. Adding the same edge twice has no
    /// further effect.
    ///
    /// # Panics
    /// If `other` belongs to a different graph.
    pub fn precede(self, other: Task<'_>) -> Self {
        assert!(
            core::ptr::eq(self.graph, other.graph),
            "Task::precede: tasks belong to different graphs"
        );
        self.graph.add_edge(self.index, other.index);
        self
    }

    /// Make every task of `others` run after this task.
    ///
    /// # Panics
    /// If one of `others` belongs to a different graph.
    pub fn precede_all<'o>(self, others: impl IntoIterator<Item = Task<'o>>) -> Self {
        for other in others {
            self.precede(other);
        }
        self
    }

    /// Make this task run after `other`.
    ///
    /// # Panics
    /// If `other` belongs to a different graph.
    pub fn succeed(self, other: Task<'_>) -> Self {
        other.precede(self);
        self
    }

    /// Number of outgoing edges.
    #[must_use]
    pub fn num_successors(self) -> usize {
        self.graph.node(self.index, |node| node.successors.len())
    }

    /// Number of incoming edges.
    #[must_use]
    pub fn num_dependents(self) -> usize {
        self.graph.node(self.index, |node| node.dependents)
    }

    /// Size of the nested graph spawned by the most recent completed run, if
    /// this is a subflow task that has run and been collected by
    /// [`Taskflow::wait_for_all`](crate::flow::Taskflow::wait_for_all).
    #[must_use]
    pub fn num_spawned(self) -> Option<usize> {
        self.graph
            .node(self.index, |node| node.nested.as_ref().map(|nested| nested.graph.len()))
    }
}

impl PartialEq for Task<'_> {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self.graph, other.graph) && self.index == other.index
    }
}

impl Eq for Task<'_> {}

/// Return types accepted from task callables.
///
/// Implemented for `()` (infallible tasks) and `Result<(), E>` where the
/// error converts into a boxed error.
pub trait IntoTaskResult {
    /// Normalize into the runtime's result type.
    ///
    /// # Errors
    /// If the task failed.
    fn into_task_result(self) -> Result<(), BoxError>;
}

impl IntoTaskResult for () {
    fn into_task_result(self) -> Result<(), BoxError> {
        Ok(())
    }
}

impl<E: Into<BoxError>> IntoTaskResult for Result<(), E> {
    fn into_task_result(self) -> Result<(), BoxError> {
        self.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_latest_wins() {
        let graph = Graph::new();
        let task = graph.placeholder().set_name("first");
        assert_eq!(task.name(), "first");
        task.set_name("second");
        assert_eq!(task.name(), "second");
    }

    #[test]
    fn rebinding_work_replaces_the_callable() {
        let graph = Graph::new();
        let task = graph.placeholder();
        assert!(!task.has_work());
        task.work(|| ());
        assert!(task.has_work());
        task.subflow(|_: &Subflow| ());
        assert!(graph.node(task.index(), |node| matches!(node.work, Work::Subflow(_))));
    }

    #[test]
    fn succeed_is_reverse_precede() {
        let graph = Graph::new();
        let a = graph.placeholder();
        let b = graph.placeholder().succeed(a);
        assert_eq!(a.num_successors(), 1);
        assert_eq!(b.num_dependents(), 1);
    }

    #[test]
    fn precede_all_fans_out() {
        let graph = Graph::new();
        let root = graph.placeholder();
        let leaves = [graph.placeholder(), graph.placeholder(), graph.placeholder()];
        root.precede_all(leaves);
        assert_eq!(root.num_successors(), 3);
        assert!(leaves.iter().all(|leaf| leaf.num_dependents() == 1));
    }

    #[test]
    fn handles_compare_by_graph_and_index() {
        let graph = Graph::new();
        let other = Graph::new();
        let a = graph.placeholder();
        let b = other.placeholder();
        assert_eq!(a, Task::new(&graph, 0));
        assert_ne!(a, b);
    }

    #[test]
    #[should_panic(expected = "different graphs")]
    fn precede_across_graphs_panics() {
        let graph = Graph::new();
        let other = Graph::new();
        graph.placeholder().precede(other.placeholder());
    }

    #[test]
    fn fallible_results_are_normalized() {
        assert!(().into_task_result().is_ok());
        assert!(Ok::<(), std::io::Error>(()).into_task_result().is_ok());
        let err = Err::<(), _>("boom").into_task_result().unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
