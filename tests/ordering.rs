// tests/ordering.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Barrier;

use warmdag::{StaticResolver, WarmUper};
use warmdag_test_utils::recorder::{Recorder, recorded, sleeper};
use warmdag_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn chain_runs_dependencies_first() -> TestResult {
    init_tracing();

    // A -> B -> C
    let resolver = StaticResolver::new().with_edge("A", "B").with_edge("B", "C");
    let warmuper = WarmUper::new(resolver).with_parallelism(4);
    let rec = Recorder::new();

    warmuper.register_type("A", sleeper("A", &rec, 5));
    warmuper.register_type("B", sleeper("B", &rec, 5));
    warmuper.register_type("C", sleeper("C", &rec, 5));

    let report = with_timeout(warmuper.stage_with(rec.clone())).await?;

    assert!(rec.finished_before_started("C", "B"));
    assert!(rec.finished_before_started("B", "A"));
    assert_eq!(rec.success_count(), 3);
    assert_eq!(report.stageables_run, 3);
    assert!(report.is_clean());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn diamond_dependency_runs_exactly_once() -> TestResult {
    init_tracing();

    // A -> {B, C}, B -> D, C -> D
    let resolver = StaticResolver::new()
        .with_dependencies("A", ["B", "C"])
        .with_edge("B", "D")
        .with_edge("C", "D");
    let warmuper = WarmUper::new(resolver).with_parallelism(4);
    let rec = Recorder::new();

    for node in ["A", "B", "C", "D"] {
        warmuper.register_type(node, sleeper(node, &rec, 5));
    }

    let report = with_timeout(warmuper.stage_with(rec.clone())).await?;

    assert_eq!(rec.starts("D"), 1);
    assert_eq!(rec.outcomes_for("D").len(), 1);
    for upper in ["B", "C"] {
        assert!(rec.finished_before_started("D", upper));
        assert!(rec.finished_before_started(upper, "A"));
    }
    assert_eq!(report.nodes_visited, 4);
    assert_eq!(report.succeeded, 4);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn independent_siblings_overlap_while_dependent_pair_does_not() -> TestResult {
    init_tracing();

    // A -> {B, C}; B and C meet at a barrier, which only opens if both run
    // at the same time.
    let resolver = StaticResolver::new().with_dependencies("A", ["B", "C"]);
    let warmuper = WarmUper::new(resolver).with_parallelism(4);
    let rec = Recorder::new();
    let barrier = Arc::new(Barrier::new(2));

    for node in ["B", "C"] {
        let barrier = Arc::clone(&barrier);
        warmuper.register_type(
            node,
            recorded(node, &rec, move |_| {
                let barrier = Arc::clone(&barrier);
                async move {
                    tokio::time::timeout(Duration::from_secs(2), barrier.wait())
                        .await
                        .map_err(|_| anyhow::anyhow!("sibling never arrived"))?;
                    Ok(())
                }
            }),
        );
    }
    warmuper.register_type("A", sleeper("A", &rec, 1));

    with_timeout(warmuper.stage_with(rec.clone())).await?;

    assert_eq!(rec.starts("B"), 1);
    assert_eq!(rec.starts("C"), 1);
    assert!(rec.overlapped("B", "C"));
    assert!(!rec.overlapped("A", "B"));
    assert!(!rec.overlapped("A", "C"));
    assert!(rec.finished_before_started("B", "A"));
    assert!(rec.finished_before_started("C", "A"));
    assert_eq!(rec.success_count(), 3);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unregistered_link_node_still_orders_its_dependents() -> TestResult {
    init_tracing();

    // A -> L -> B, where L has no stageables of its own.
    let resolver = StaticResolver::new().with_edge("A", "L").with_edge("L", "B");
    let warmuper = WarmUper::new(resolver);
    let rec = Recorder::new();

    warmuper.register_type("A", sleeper("A", &rec, 1));
    warmuper.register_type("B", sleeper("B", &rec, 10));

    let report = with_timeout(warmuper.stage_with(rec.clone())).await?;

    assert!(rec.finished_before_started("B", "A"));
    assert_eq!(report.nodes_registered, 2);
    assert_eq!(report.nodes_visited, 3);
    Ok(())
}

#[tokio::test]
async fn multiple_stageables_on_one_node_all_run() -> TestResult {
    init_tracing();

    let warmuper = WarmUper::new(StaticResolver::new().with_edge("svc", "db"));
    let rec = Recorder::new();

    warmuper.register_type("db", sleeper("db", &rec, 5));
    warmuper.register_type("svc", sleeper("svc#1", &rec, 1));
    warmuper.register_type("svc", sleeper("svc#2", &rec, 1));

    let report = with_timeout(warmuper.stage_with(rec.clone())).await?;

    assert_eq!(report.stageables_registered, 3);
    assert_eq!(report.succeeded, 3);
    assert!(rec.finished_before_started("db", "svc#1"));
    assert!(rec.finished_before_started("db", "svc#2"));
    Ok(())
}

#[tokio::test]
async fn parallelism_of_one_serialises_independent_nodes() -> TestResult {
    init_tracing();

    let warmuper = WarmUper::new(StaticResolver::<&str>::new()).with_parallelism(1);
    let rec = Recorder::new();

    for node in ["X", "Y", "Z"] {
        warmuper.register_type(node, sleeper(node, &rec, 5));
    }

    with_timeout(warmuper.stage_with(rec.clone())).await?;

    assert!(!rec.overlapped("X", "Y"));
    assert!(!rec.overlapped("X", "Z"));
    assert!(!rec.overlapped("Y", "Z"));
    assert_eq!(rec.success_count(), 3);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dense_graph_finishes_well_inside_a_tight_deadline() -> TestResult {
    init_tracing();

    // Node i depends on every node below it: n * (n - 1) / 2 edges.
    let n = 200usize;
    let mut resolver = StaticResolver::new();
    for i in 0..n {
        resolver = resolver.with_dependencies(i, 0..i);
    }
    let warmuper = WarmUper::new(resolver)
        .with_parallelism(4)
        .with_max_wait(Duration::from_secs(3));
    let rec = Recorder::new();

    for i in 0..n {
        warmuper.register_type(i, sleeper(&format!("n{i}"), &rec, 0));
    }

    let report = with_timeout(warmuper.stage_with(rec.clone())).await?;

    assert_eq!(report.succeeded, n);
    assert_eq!(report.nodes_visited, n);
    assert!(rec.finished_before_started("n0", "n1"));
    assert!(rec.finished_before_started(&format!("n{}", n - 2), &format!("n{}", n - 1)));
    Ok(())
}
