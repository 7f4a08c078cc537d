use crate::{
    error::FlowError,
    executor::{
        setup::{Join, JoinTarget, Plan, Spawned},
        topology::Topology,
    },
    graph::{Subflow, Work},
    sync::{Ordering, fence, lock},
    types::{BoxError, NodeIndex},
};
use core::any::Any;
use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};
use tracing::{debug, trace};

/// A ready node of some plan of a topology.
pub(super) struct Job {
    plan: Arc<Plan>,
    index: NodeIndex,
}

/// Schedule `ready` nodes of `plan` on the worker pool.
///
/// All jobs are accounted for before the first one is spawned, so the active
/// count of the topology cannot drain while the batch is being submitted.
pub(super) fn schedule(topology: &Arc<Topology>, plan: &Arc<Plan>, ready: &[NodeIndex]) {
    if ready.is_empty() {
        return;
    }
    topology.enter(ready.len());
    for &index in ready {
        let job = Job {
            plan: Arc::clone(plan),
            index,
        };
        let worker = Arc::clone(topology);
        topology.executor.spawn(move || run(&worker, job));
    }
}

/// Run `job` and then, on the same worker, one of the successors it made
/// ready, until no successor is left to continue with.
fn run(topology: &Arc<Topology>, mut job: Job) {
    loop {
        let next = invoke(topology, &job);
        topology.retire();
        match next {
            Some(next) => job = next,
            None => return,
        }
    }
}

/// Run the work of a node. Returns the successor to continue with, if any.
fn invoke(topology: &Arc<Topology>, job: &Job) -> Option<Job> {
    let node = &job.plan.nodes[job.index];
    trace!(task = %node.name, index = job.index, "running task");
    match &node.work {
        Work::Empty => {}
        Work::Static(work) => {
            if let Err(error) = guard(&node.name, || work()) {
                topology.fail(error);
                return None;
            }
        }
        Work::Subflow(work) => {
            let subflow = Subflow::new();
            if let Err(error) = guard(&node.name, || work(&subflow)) {
                topology.fail(error);
                return None;
            }
            if !subflow.is_empty() && !splice(topology, job, subflow) {
                // The last sink of the nested graph finishes this node.
                return None;
            }
        }
    }
    finish(topology, &job.plan, job.index)
}

/// Splice the nested graph built by the subflow of `job` into the topology
/// and schedule its sources. Returns whether the spawning node is finished
/// (detached) or must wait for the nested sinks (attached).
fn splice(topology: &Arc<Topology>, job: &Job, subflow: Subflow) -> bool {
    let nested = subflow.into_nested();
    let detached = nested.detached;
    let target = if detached {
        JoinTarget::Topology
    } else {
        JoinTarget::Parent(Arc::downgrade(&job.plan), job.index)
    };
    let plan = Arc::new(Plan::setup(&nested.graph, target));
    if detached {
        // Registered before any nested node can finish.
        topology.add_sinks(plan.num_sinks);
    }
    let node = &job.plan.nodes[job.index];
    debug!(
        task = %node.name,
        nodes = plan.len(),
        sources = plan.sources.len(),
        sinks = plan.num_sinks,
        detached,
        "spliced subflow"
    );
    *lock(&node.spawned) = Some(Spawned {
        nested,
        plan: Arc::clone(&plan),
    });
    schedule(topology, &plan, &plan.sources);
    detached
}

/// Mark a node finished: release its successors, or report to the join of
/// its plan if it is a sink.
fn finish(topology: &Arc<Topology>, plan: &Arc<Plan>, index: NodeIndex) -> Option<Job> {
    let node = &plan.nodes[index];
    if node.successors.is_empty() {
        return match &plan.join {
            Join::Topology => {
                topology.sink_finished();
                None
            }
            Join::Parent {
                plan: parent,
                index: parent_index,
                sinks_left,
            } => {
                if sinks_left.fetch_sub(1, Ordering::AcqRel) != 1 {
                    return None;
                }
                // The parent plan is kept alive by the `spawned` slot of its
                // own parent (or by the topology) until the topology is done.
                let parent = parent.upgrade()?;
                finish(topology, &parent, *parent_index)
            }
        };
    }

    // Publish this node's effects to whichever thread runs each successor.
    fence(Ordering::Release);
    let mut ready: Vec<NodeIndex> = node
        .successors
        .iter()
        .copied()
        .filter(|&successor| plan.nodes[successor].pending.fetch_sub(1, Ordering::Relaxed) == 1)
        .collect();
    let inline = ready.pop()?;
    fence(Ordering::Acquire);
    schedule(topology, plan, &ready);
    topology.enter(1);
    Some(Job {
        plan: Arc::clone(plan),
        index: inline,
    })
}

/// Run a callable, turning both returned errors and panics into [`FlowError`].
fn guard(task: &str, work: impl FnOnce() -> Result<(), BoxError>) -> Result<(), FlowError> {
    match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(FlowError::TaskFailed {
            task: task.to_owned(),
            source: Arc::from(source),
        }),
        Err(payload) => Err(FlowError::TaskPanicked {
            task: task.to_owned(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;

    #[test]
    fn guard_passes_success_through() {
        assert!(guard("ok", || Ok(())).is_ok());
    }

    #[test]
    fn guard_wraps_returned_errors() {
        let error = guard("io", || Err("disk full".into())).unwrap_err();
        assert!(matches!(&error, FlowError::TaskFailed { task, .. } if task == "io"));
        assert_eq!(error.to_string(), "task `io` failed: disk full");
    }

    #[test]
    fn guard_catches_panics() {
        let error = guard("bad", || panic!("exploded {}", 42)).unwrap_err();
        let FlowError::TaskPanicked { task, message } = error else {
            panic!("expected a panic failure");
        };
        assert_eq!(task, "bad");
        assert_eq!(message, "exploded 42");
    }

    #[test]
    fn panic_message_handles_static_str() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
