use crate::{
    error::FlowError,
    executor::{Executor, Topology},
    graph::Graph,
};
use core::{
    cell::{Cell, RefCell},
    fmt, mem,
};
use derive_more::{Debug, Deref};
use std::sync::Arc;
use tracing::debug;

/// Top-level graph bound to an [`Executor`].
///
/// Building happens through the [`Graph`] operations reachable by deref.
/// Every dispatch freezes the current structure into a new, independent
/// topology, so a taskflow can be edited and dispatched again once earlier
/// runs are done (or even while they run: edits only affect later runs).
///
/// ```
/// use dagflow::{config::ExecutorConfig, executor::Executor, flow::Taskflow};
/// use std::sync::{Arc, Mutex};
///
/// let executor = Arc::new(Executor::new(ExecutorConfig::default()).unwrap());
/// let flow = Taskflow::new(executor);
/// let log = Arc::new(Mutex::new(Vec::new()));
///
/// let (l1, l2) = (Arc::clone(&log), Arc::clone(&log));
/// let a = flow.emplace(move || l1.lock().unwrap().push("A")).set_name("A");
/// let b = flow
///     .emplace_subflow(move |subflow| {
///         let l3 = Arc::clone(&l2);
///         subflow.emplace(move || l3.lock().unwrap().push("B1"));
///     })
///     .set_name("B");
/// a.precede(b);
///
/// flow.wait_for_all().unwrap();
/// assert_eq!(*log.lock().unwrap(), ["A", "B1"]);
/// assert_eq!(b.num_spawned(), Some(1));
/// ```
///
/// # Limitations
/// Cycles are not detected: a topology over a cyclic graph never completes.
/// Waiting on a topology from inside one of its own tasks deadlocks.
#[derive(Debug, Deref)]
pub struct Taskflow {
    #[deref]
    graph: Graph,
    #[debug(skip)]
    executor: Arc<Executor>,
    topologies: RefCell<Vec<Dispatched>>,
    /// Number of dispatches so far.
    dispatched: Cell<u64>,
    /// Dispatch sequence of the most recent run whose nested graphs were
    /// collected.
    harvested: Cell<Option<u64>>,
}

/// A topology not yet collected by `wait_for_all`.
#[derive(Debug)]
struct Dispatched {
    sequence: u64,
    topology: Arc<Topology>,
}

impl Taskflow {
    /// Create an empty taskflow running on `executor`.
    #[must_use]
    pub fn new(executor: Arc<Executor>) -> Self {
        Self {
            graph: Graph::new(),
            executor,
            topologies: RefCell::default(),
            dispatched: Cell::new(0),
            harvested: Cell::new(None),
        }
    }

    /// Executor running this taskflow.
    #[must_use]
    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    /// Start running the current graph and return a handle to the run.
    ///
    /// The taskflow keeps every dispatched topology (with its execution plan
    /// and the nested graphs it spawns) until
    /// [`wait_for_all`](Self::wait_for_all) collects it, even if the handle
    /// was already waited on. A loop of `dispatch().get()` should call
    /// `wait_for_all` from time to time.
    pub fn dispatch(&self) -> TopologyHandle {
        let topology = self.executor.launch(&self.graph);
        self.graph.mark_dispatched();
        let sequence = self.dispatched.get();
        self.dispatched.set(sequence + 1);
        self.topologies.borrow_mut().push(Dispatched {
            sequence,
            topology: Arc::clone(&topology),
        });
        TopologyHandle { topology }
    }

    /// Start running the current graph without keeping a handle; the run is
    /// awaited by [`wait_for_all`](Self::wait_for_all).
    pub fn silent_dispatch(&self) {
        drop(self.dispatch());
    }

    /// Dispatch the graph if it changed since the last dispatch, then block
    /// until every outstanding topology completes.
    ///
    /// Nested graphs spawned by subflow tasks become visible on their tasks
    /// (see [`Task::num_spawned`](crate::task::Task::num_spawned) and
    /// [`dump`](Self::dump)) once this returns.
    ///
    /// # Errors
    /// The first failure of the outstanding topologies, in dispatch order.
    pub fn wait_for_all(&self) -> Result<(), FlowError> {
        if self.graph.is_modified() && !self.graph.is_empty() {
            self.silent_dispatch();
        }
        let topologies = mem::take(&mut *self.topologies.borrow_mut());
        let mut result = Ok(());
        for dispatched in topologies {
            let outcome = dispatched.topology.wait();
            self.harvest(&dispatched);
            if let (Ok(()), Err(error)) = (&result, outcome) {
                result = Err(error);
            }
        }
        result
    }

    /// Number of dispatched topologies not yet collected by
    /// [`wait_for_all`](Self::wait_for_all).
    #[must_use]
    pub fn num_topologies(&self) -> usize {
        self.topologies.borrow().len()
    }

    /// Remove every task. Topologies already dispatched keep running.
    pub fn clear(&mut self) {
        self.graph.clear();
    }

    /// Render the graph, including collected nested graphs, in Graphviz DOT.
    #[must_use]
    pub fn dump(&self) -> String {
        for dispatched in self.topologies.borrow().iter() {
            if dispatched.topology.is_done() {
                self.harvest(dispatched);
            }
        }
        Dot(&self.graph).to_string()
    }

    /// Collect the nested graphs of a finished run, unless a later run was
    /// already collected or the graph was cleared since the dispatch.
    fn harvest(&self, dispatched: &Dispatched) {
        if self
            .harvested
            .get()
            .is_some_and(|latest| latest > dispatched.sequence)
        {
            return;
        }
        let root = dispatched.topology.root();
        if root.generation() == self.graph.generation() {
            root.harvest_into(&self.graph);
            self.harvested.set(Some(dispatched.sequence));
        }
    }
}

impl Drop for Taskflow {
    fn drop(&mut self) {
        for Dispatched { topology, .. } in self.topologies.get_mut().drain(..) {
            if let Err(error) = topology.wait() {
                debug!(%error, "uncollected topology failed");
            }
        }
    }
}

/// Handle to one dispatched run of a [`Taskflow`].
#[must_use]
#[derive(Debug, Clone)]
pub struct TopologyHandle {
    topology: Arc<Topology>,
}

impl TopologyHandle {
    /// Block until the run completes.
    ///
    /// # Errors
    /// The first task failure of the run. Tasks that were already ready keep
    /// running after a failure; tasks depending on the failed one never run.
    pub fn get(&self) -> Result<(), FlowError> {
        self.topology.wait()
    }

    /// Same as [`get`](Self::get).
    ///
    /// # Errors
    /// The first task failure of the run.
    pub fn wait(&self) -> Result<(), FlowError> {
        self.get()
    }

    /// Whether the run has completed.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.topology.is_done()
    }
}

struct Dot<'a>(&'a Graph);

impl fmt::Display for Dot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "digraph Taskflow {{")?;
        write_nodes(f, self.0, "n", 1)?;
        writeln!(f, "}}")
    }
}

fn write_nodes(f: &mut fmt::Formatter<'_>, graph: &Graph, prefix: &str, depth: usize) -> fmt::Result {
    let indent = "  ".repeat(depth);
    for (index, node) in graph.nodes().iter().enumerate() {
        let id = format!("{prefix}{index}");
        let label = if node.name.is_empty() {
            id.clone()
        } else {
            node.name.replace('"', "\\\"")
        };
        writeln!(f, "{indent}\"{id}\" [label=\"{label}\"];")?;
        for successor in &node.successors {
            writeln!(f, "{indent}\"{id}\" -> \"{prefix}{successor}\";")?;
        }
        if let Some(nested) = &node.nested {
            let kind = if nested.detached {
                "Detached subflow"
            } else {
                "Subflow"
            };
            writeln!(f, "{indent}subgraph cluster_{id} {{")?;
            writeln!(f, "{indent}  label=\"{kind}: {label}\";")?;
            write_nodes(f, &nested.graph, &format!("{id}_"), depth + 1)?;
            writeln!(f, "{indent}}}")?;
        }
    }
    Ok(())
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use crate::config::ExecutorConfig;
    use core::num::NonZeroUsize;

    fn taskflow() -> Taskflow {
        let config = ExecutorConfig::default().num_workers(NonZeroUsize::new(2).unwrap());
        Taskflow::new(Arc::new(Executor::new(config).unwrap()))
    }

    #[test]
    fn dump_lists_nodes_and_edges() {
        let flow = taskflow();
        let a = flow.placeholder().set_name("A");
        let b = flow.placeholder();
        a.precede(b);
        assert_eq!(
            flow.dump(),
            "digraph Taskflow {\n  \"n0\" [label=\"A\"];\n  \"n0\" -> \"n1\";\n  \"n1\" [label=\"n1\"];\n}\n"
        );
    }

    #[test]
    fn dump_escapes_quotes() {
        let flow = taskflow();
        flow.placeholder().set_name("say \"hi\"");
        assert!(flow.dump().contains("[label=\"say \\\"hi\\\"\"]"));
    }

    #[test]
    fn dump_shows_collected_subflows() {
        let flow = taskflow();
        flow.emplace_subflow(|subflow| {
            let b1 = subflow.placeholder().set_name("B1");
            let b2 = subflow.placeholder().set_name("B2");
            b1.precede(b2);
            subflow.detach();
        })
        .set_name("B");
        flow.wait_for_all().unwrap();

        let dot = flow.dump();
        assert!(dot.contains("subgraph cluster_n0 {"));
        assert!(dot.contains("label=\"Detached subflow: B\";"));
        assert!(dot.contains("\"n0_0\" [label=\"B1\"];"));
        assert!(dot.contains("\"n0_0\" -> \"n0_1\";"));
    }

    #[test]
    fn wait_for_all_does_not_redispatch_unchanged_graph() {
        let flow = taskflow();
        let runs = Arc::new(crate::sync::AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        flow.emplace(move || {
            counter.fetch_add(1, crate::sync::Ordering::Relaxed);
        });
        flow.wait_for_all().unwrap();
        flow.wait_for_all().unwrap();
        assert_eq!(runs.load(crate::sync::Ordering::Relaxed), 1);
        assert_eq!(flow.num_topologies(), 0);
    }

    #[test]
    fn clear_removes_tasks() {
        let mut flow = taskflow();
        flow.placeholder();
        flow.clear();
        assert!(flow.is_empty());
        assert!(flow.wait_for_all().is_ok());
    }
}
