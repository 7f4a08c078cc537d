use crate::{
    task::{IntoTaskResult, Task},
    types::{IndexSet, NodeIndex, StaticFn, SubflowFn},
};
use core::cell::{Cell, Ref, RefCell, RefMut};
use derive_more::{Debug, Deref};
use std::sync::Arc;

/// Work item bound to a node.
#[derive(Debug, Clone, Default)]
pub enum Work {
    /// No callable: the node only forwards its dependencies.
    #[default]
    Empty,
    /// A callable run once per dispatch.
    Static(#[debug(skip)] Arc<StaticFn>),
    /// A callable that builds a nested graph each time it runs.
    Subflow(#[debug(skip)] Arc<SubflowFn>),
}

impl Work {
    pub(crate) fn from_static<F, R>(work: F) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: IntoTaskResult,
    {
        Self::Static(Arc::new(move || work().into_task_result()))
    }

    pub(crate) fn from_subflow<F, R>(work: F) -> Self
    where
        F: Fn(&Subflow) -> R + Send + Sync + 'static,
        R: IntoTaskResult,
    {
        Self::Subflow(Arc::new(move |subflow: &Subflow| {
            work(subflow).into_task_result()
        }))
    }

    /// Whether no callable is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// A nested graph retained by the node that spawned it.
#[derive(Debug)]
pub(crate) struct Nested {
    pub(crate) graph: Graph,
    pub(crate) detached: bool,
}

#[derive(Debug, Default)]
pub(crate) struct Node {
    pub(crate) name: String,
    pub(crate) work: Work,
    /// Outgoing edges, in insertion order.
    pub(crate) successors: IndexSet<NodeIndex>,
    /// Number of incoming edges.
    pub(crate) dependents: usize,
    /// Graph built by the most recent run of a subflow callable.
    pub(crate) nested: Option<Nested>,
}

/// One generation of a dependency structure.
///
/// A graph is an arena of nodes addressed by [`Task`] handles. Building is
/// single-threaded: handles borrow the graph, and every mutation goes through
/// a short-lived interior borrow. Execution never touches the graph itself;
/// dispatch freezes it into an execution plan instead, so edits made after a
/// dispatch only affect later dispatches.
///
/// Modifying a graph while a nested graph is being populated by one of its
/// own tasks is impossible by construction: callables are `Send + Sync` and
/// cannot capture a `&Graph`.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: RefCell<Vec<Node>>,
    generation: Cell<u64>,
    modified: Cell<bool>,
}

impl Graph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node with no work bound to it.
    pub fn placeholder(&self) -> Task<'_> {
        self.insert(Node::default())
    }

    /// Create a node bound to a static callable.
    ///
    /// The callable may return `()` or `Result<(), E>`; an error (or a panic)
    /// is reported by the wait point of the topology that ran it.
    pub fn emplace<F, R>(&self, work: F) -> Task<'_>
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: IntoTaskResult,
    {
        self.insert(Node {
            work: Work::from_static(work),
            ..Node::default()
        })
    }

    /// Create a node whose callable spawns a nested graph every time it runs.
    pub fn emplace_subflow<F, R>(&self, work: F) -> Task<'_>
    where
        F: Fn(&Subflow) -> R + Send + Sync + 'static,
        R: IntoTaskResult,
    {
        self.insert(Node {
            work: Work::from_subflow(work),
            ..Node::default()
        })
    }

    /// Chain `tasks` so that each one precedes the next.
    pub fn linearize(&self, tasks: &[Task<'_>]) {
        for pair in tasks.windows(2) {
            pair[0].precede(pair[1]);
        }
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    /// Whether the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }

    fn insert(&self, node: Node) -> Task<'_> {
        let mut nodes = self.nodes.borrow_mut();
        let index = nodes.len();
        nodes.push(node);
        self.modified.set(true);
        Task::new(self, index)
    }

    pub(crate) fn node<R>(&self, index: NodeIndex, f: impl FnOnce(&Node) -> R) -> R {
        f(&self.nodes.borrow()[index])
    }

    pub(crate) fn node_mut<R>(&self, index: NodeIndex, f: impl FnOnce(&mut Node) -> R) -> R {
        self.modified.set(true);
        f(&mut self.nodes.borrow_mut()[index])
    }

    /// Add the edge `from -> to`. Returns whether the edge is new.
    pub(crate) fn add_edge(&self, from: NodeIndex, to: NodeIndex) -> bool {
        let mut nodes = self.nodes.borrow_mut();
        let inserted = nodes[from].successors.insert(to);
        if inserted {
            nodes[to].dependents += 1;
        }
        self.modified.set(true);
        inserted
    }

    pub(crate) fn nodes(&self) -> Ref<'_, Vec<Node>> {
        self.nodes.borrow()
    }

    /// Mutable access that does not count as a client modification.
    pub(crate) fn nodes_mut(&self) -> RefMut<'_, Vec<Node>> {
        self.nodes.borrow_mut()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.get()
    }

    pub(crate) fn is_modified(&self) -> bool {
        self.modified.get()
    }

    pub(crate) fn mark_dispatched(&self) {
        self.modified.set(false);
    }

    /// Drop every node and start a new generation.
    pub(crate) fn clear(&mut self) {
        self.nodes.get_mut().clear();
        self.generation.set(self.generation.get() + 1);
        self.modified.set(false);
    }
}

/// Builder handed to a subflow callable while its task runs.
///
/// It offers the same building operations as the top-level graph (through
/// `Deref<Target = Graph>`) and populates a fresh nested graph owned by the
/// running task. When the callable returns, the nested graph is spliced into
/// the running topology:
/// - attached (default): successors of the running task wait for every sink
///   of the nested graph;
/// - detached: the running task finishes as soon as its callable returns and
///   the nested graph only holds back completion of the topology.
#[derive(Debug, Default, Deref)]
pub struct Subflow {
    #[deref]
    graph: Graph,
    detached: Cell<bool>,
}

impl Subflow {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Detach the nested graph from the successors of the spawning task.
    ///
    /// # Panics
    /// If called more than once on the same builder.
    pub fn detach(&self) {
        let already = self.detached.replace(true);
        assert!(!already, "Subflow::detach called more than once");
    }

    /// Whether [`detach`](Self::detach) has been called.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.detached.get()
    }

    pub(crate) fn into_nested(self) -> Nested {
        Nested {
            graph: self.graph,
            detached: self.detached.into_inner(),
        }
    }
}
