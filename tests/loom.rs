#![allow(missing_docs)]
#![cfg(feature = "loom")]

use dagflow::{
    config::ExecutorConfig, error::FlowError, executor::Executor, flow::Taskflow, graph::Subflow,
};
use loom::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn taskflow() -> Taskflow {
    Taskflow::new(Arc::new(Executor::new(ExecutorConfig::default()).unwrap()))
}

#[derive(Debug, Clone)]
struct Counts(Arc<Vec<AtomicUsize>>);

impl Counts {
    fn new(len: usize) -> Self {
        Self(Arc::new((0..len).map(|_| AtomicUsize::new(0)).collect()))
    }

    fn hit(&self, index: usize) {
        self.0[index].fetch_add(1, Ordering::Relaxed);
    }

    fn get(&self, index: usize) -> usize {
        self.0[index].load(Ordering::Relaxed)
    }
}

#[test]
fn loom_shared_child_runs_once_after_both_parents() {
    loom::model(|| {
        // Graph:
        //   A   B
        //    \ /
        //     C
        // C must observe both parents' writes and run exactly once, whichever
        // parent finishes last.
        let counts = Counts::new(3);
        let flow = taskflow();
        let (ca, cb, cc) = (counts.clone(), counts.clone(), counts.clone());
        let a = flow.emplace(move || ca.hit(0));
        let b = flow.emplace(move || cb.hit(1));
        let c = flow.emplace(move || {
            assert_eq!(cc.get(0), 1);
            assert_eq!(cc.get(1), 1);
            cc.hit(2);
        });
        c.succeed(a).succeed(b);

        flow.wait_for_all().unwrap();
        for index in 0..3 {
            assert_eq!(counts.get(index), 1);
        }
    });
}

#[test]
fn loom_attached_subflow_gates_successor() {
    loom::model(|| {
        // P spawns {X}; D runs after P, hence after X.
        let counts = Counts::new(2);
        let flow = taskflow();
        let cx = counts.clone();
        let p = flow.emplace_subflow(move |subflow: &Subflow| {
            let cx = cx.clone();
            subflow.emplace(move || cx.hit(0));
        });
        let cd = counts.clone();
        let d = flow.emplace(move || {
            assert_eq!(cd.get(0), 1);
            cd.hit(1);
        });
        p.precede(d);

        flow.wait_for_all().unwrap();
        assert_eq!(counts.get(0), 1);
        assert_eq!(counts.get(1), 1);
    });
}

#[test]
fn loom_detached_subflow_holds_back_completion() {
    loom::model(|| {
        // P detaches {X}: the topology is only done once X ran.
        let counts = Counts::new(1);
        let flow = taskflow();
        let cx = counts.clone();
        flow.emplace_subflow(move |subflow: &Subflow| {
            let cx = cx.clone();
            subflow.emplace(move || cx.hit(0));
            subflow.detach();
        });

        flow.dispatch().get().unwrap();
        assert_eq!(counts.get(0), 1);
    });
}

#[test]
fn loom_failure_completes_after_independent_work() {
    loom::model(|| {
        // A fails while B runs; C depends on A and never runs. Completion
        // fires once both jobs retired, whichever retires last.
        let counts = Counts::new(2);
        let flow = taskflow();
        let a = flow.emplace(|| Err::<(), _>("fail")).set_name("A");
        let cb = counts.clone();
        flow.emplace(move || cb.hit(0)).set_name("B");
        let cc = counts.clone();
        flow.emplace(move || cc.hit(1)).succeed(a);

        let error = flow.dispatch().get().unwrap_err();
        assert!(matches!(&error, FlowError::TaskFailed { task, .. } if task == "A"));
        assert_eq!(counts.get(0), 1);
        assert_eq!(counts.get(1), 0);
    });
}
