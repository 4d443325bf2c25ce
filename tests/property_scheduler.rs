// tests/property_scheduler.rs

use std::collections::HashSet;

use proptest::prelude::*;
use warmdag::{StaticResolver, WarmUper};
use warmdag_test_utils::recorder::{Recorder, sleeper};

/// Random DAG over `0..n`: node `i` only depends on nodes `0..i`.
fn dag_strategy(max_nodes: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_nodes).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..n), n).prop_map(
            |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, potential)| {
                        let deps: HashSet<usize> = if i == 0 {
                            HashSet::new()
                        } else {
                            potential.into_iter().map(|d| d % i).collect()
                        };
                        deps.into_iter().collect()
                    })
                    .collect()
            },
        )
    })
}

/// Every node `i` waits on, directly or through unregistered links.
fn transitive_deps(deps: &[Vec<usize>], i: usize) -> HashSet<usize> {
    let mut seen = HashSet::new();
    let mut stack = deps[i].clone();
    while let Some(d) = stack.pop() {
        if seen.insert(d) {
            stack.extend(deps[d].iter().copied());
        }
    }
    seen
}

fn name(i: usize) -> String {
    format!("node_{i}")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn every_node_runs_once_after_its_dependencies(
        deps in dag_strategy(8),
        registered_mask in proptest::collection::vec(any::<bool>(), 8),
        parallelism in 1..4usize,
    ) {
        let mut resolver = StaticResolver::new();
        for (i, node_deps) in deps.iter().enumerate() {
            resolver = resolver.with_dependencies(name(i), node_deps.iter().map(|&d| name(d)));
        }

        let warmuper = WarmUper::new(resolver).with_parallelism(parallelism);
        let rec = Recorder::new();

        // Node 0 is always registered so every run has work.
        let registered: Vec<usize> = (0..deps.len())
            .filter(|&i| i == 0 || registered_mask[i])
            .collect();
        for &i in &registered {
            warmuper.register_type(name(i), sleeper(&name(i), &rec, 1));
        }

        let report = warmuper.stage_blocking(rec.clone()).unwrap();

        let registered_set: HashSet<usize> = registered.iter().copied().collect();
        for &i in &registered {
            prop_assert_eq!(rec.starts(&name(i)), 1, "{} start count", name(i));
            for e in transitive_deps(&deps, i) {
                if registered_set.contains(&e) {
                    prop_assert!(
                        rec.finished_before_started(&name(e), &name(i)),
                        "{} started before dependency {} finished",
                        name(i),
                        name(e)
                    );
                }
            }
        }
        prop_assert_eq!(report.stageables_run, registered.len());
        prop_assert_eq!(rec.success_count(), registered.len());
        prop_assert!(report.is_clean());
    }
}
