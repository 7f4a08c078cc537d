use crate::{
    graph::{Graph, Nested, Work},
    sync::{AtomicUsize, Mutex, lock},
    types::NodeIndex,
};
use derive_more::Debug;
use std::sync::{Arc, Weak};

/// Immutable snapshot of one graph generation, shared by the workers running it.
///
/// Example (sources, sinks and pending counters):
///
/// ```text
///   A     B
///    \   /
///      C
///      |
///      D
/// ```
///
/// - Sources: A, B (`pending = 0`), scheduled as soon as the plan is launched.
/// - `pending(C) = 2`: C becomes ready when the second of A, B finishes.
/// - Sinks: D only. When D finishes, the plan reports to its [`Join`].
#[derive(Debug)]
pub(crate) struct Plan {
    pub(super) nodes: Box<[PlanNode]>,
    pub(super) sources: Box<[NodeIndex]>,
    pub(super) num_sinks: usize,
    pub(super) join: Join,
    pub(super) generation: u64,
}

#[derive(Debug)]
pub(crate) struct PlanNode {
    pub(super) name: String,
    pub(super) work: Work,
    pub(super) successors: Box<[NodeIndex]>,
    /// Number of predecessors that haven't finished yet.
    pub(super) pending: AtomicUsize,
    /// Nested graph produced by this node's subflow callable during this run.
    pub(super) spawned: Mutex<Option<Spawned>>,
}

#[derive(Debug)]
pub(crate) struct Spawned {
    pub(super) nested: Nested,
    pub(super) plan: Arc<Plan>,
}

/// Where the sinks of a plan report when they finish.
#[derive(Debug)]
pub(crate) enum Join {
    /// Sinks count toward completion of the topology.
    Topology,
    /// Sinks gate the node that spawned the plan (attached subflow).
    Parent {
        #[debug(skip)]
        plan: Weak<Plan>,
        index: NodeIndex,
        /// Number of sinks that haven't finished yet.
        sinks_left: AtomicUsize,
    },
}

/// Where a plan being set up should report.
pub(crate) enum JoinTarget {
    Topology,
    Parent(Weak<Plan>, NodeIndex),
}

impl Plan {
    /// Freeze the current structure of `graph`.
    pub(crate) fn setup(graph: &Graph, target: JoinTarget) -> Self {
        let graph_nodes = graph.nodes();
        let mut sources = Vec::new();
        let mut num_sinks = 0;
        let nodes: Box<[PlanNode]> = graph_nodes
            .iter()
            .enumerate()
            .map(|(index, node)| {
                if node.dependents == 0 {
                    sources.push(index);
                }
                if node.successors.is_empty() {
                    num_sinks += 1;
                }
                PlanNode {
                    name: node.name.clone(),
                    work: node.work.clone(),
                    successors: node.successors.iter().copied().collect(),
                    pending: AtomicUsize::new(node.dependents),
                    spawned: Mutex::new(None),
                }
            })
            .collect();
        let join = match target {
            JoinTarget::Topology => Join::Topology,
            JoinTarget::Parent(plan, index) => Join::Parent {
                plan,
                index,
                sinks_left: AtomicUsize::new(num_sinks),
            },
        };
        Self {
            nodes,
            sources: sources.into_boxed_slice(),
            num_sinks,
            join,
            generation: graph.generation(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Move the nested graphs spawned while running this plan into the
    /// matching nodes of `graph`, recursively.
    ///
    /// Nodes whose work was rebound since this plan was frozen keep what
    /// they have: a rebind drops the retained nested graph for good.
    pub(crate) fn harvest_into(&self, graph: &Graph) {
        let mut graph_nodes = graph.nodes_mut();
        for (node, plan_node) in graph_nodes.iter_mut().zip(self.nodes.iter()) {
            let Some(Spawned { nested, plan }) = lock(&plan_node.spawned).take() else {
                continue;
            };
            if !same_subflow(&node.work, &plan_node.work) {
                continue;
            }
            plan.harvest_into(&nested.graph);
            node.nested = Some(nested);
        }
    }
}

/// Whether both work items are the same subflow callable.
fn same_subflow(current: &Work, frozen: &Work) -> bool {
    match (current, frozen) {
        (Work::Subflow(current), Work::Subflow(frozen)) => Arc::ptr_eq(current, frozen),
        _ => false,
    }
}
