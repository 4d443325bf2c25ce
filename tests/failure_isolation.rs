// tests/failure_isolation.rs

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use warmdag::stage::{FnStageable, StageFuture, StageHandler, Stageable};
use warmdag::{StaticResolver, WarmUper};
use warmdag_test_utils::recorder::{Outcome, Recorder, recorded, sleeper};
use warmdag_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failing_stageable_does_not_stop_others() -> TestResult {
    init_tracing();

    // top -> {bad, good}; other is unrelated.
    let resolver = StaticResolver::new().with_dependencies("top", ["bad", "good"]);
    let warmuper = WarmUper::new(resolver);
    let rec = Recorder::new();

    warmuper.register_type(
        "bad",
        recorded("bad", &rec, |_| async { Err(anyhow::anyhow!("cache unreachable")) }),
    );
    warmuper.register_type("good", sleeper("good", &rec, 2));
    warmuper.register_type("top", sleeper("top", &rec, 1));
    warmuper.register_type("other", sleeper("other", &rec, 1));

    let report = with_timeout(warmuper.stage_with(rec.clone())).await?;

    let bad = rec.outcomes_for("bad");
    assert_eq!(bad.len(), 1);
    assert!(matches!(&bad[0], Outcome::Failed(msg) if msg.contains("cache unreachable")));

    for ok in ["good", "top", "other"] {
        assert_eq!(rec.outcomes_for(ok), vec![Outcome::Success], "{ok}");
    }

    assert_eq!(report.failed, 1);
    assert_eq!(report.succeeded, 3);
    assert!(!report.is_clean());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_stageable_is_reported_once() -> TestResult {
    init_tracing();

    let warmuper = WarmUper::new(StaticResolver::new().with_edge("after", "boom"));
    let rec = Recorder::new();

    warmuper.register_type(
        "boom",
        Arc::new(FnStageable::new("boom", |_| async {
            if true {
                panic!("exploded during warm-up");
            }
            Ok(())
        })),
    );
    warmuper.register_type("after", sleeper("after", &rec, 1));

    let report = with_timeout(warmuper.stage_with(rec.clone())).await?;

    let boom = rec.outcomes_for("boom");
    assert_eq!(boom.len(), 1);
    assert!(matches!(&boom[0], Outcome::Panicked(msg) if msg.contains("exploded")));
    assert_eq!(rec.outcomes_for("after"), vec![Outcome::Success]);
    assert_eq!(report.failed, 1);
    Ok(())
}

/// Reports success and then panics on its way out.
struct PanicsAfterReporting;

impl Stageable for PanicsAfterReporting {
    fn subject(&self) -> &str {
        "eager"
    }

    fn stage<'a>(
        &'a self,
        handler: &'a dyn StageHandler,
        _cancel: CancellationToken,
    ) -> StageFuture<'a> {
        Box::pin(async move {
            handler.on_success(self.subject());
            if true {
                panic!("teardown failed after reporting");
            }
        })
    }
}

#[tokio::test]
async fn panic_after_reporting_keeps_the_first_outcome() -> TestResult {
    init_tracing();

    let warmuper = WarmUper::new(StaticResolver::<&str>::new());
    let rec = Recorder::new();
    warmuper.register_type("eager", Arc::new(PanicsAfterReporting));

    let report = with_timeout(warmuper.stage_with(rec.clone())).await?;

    assert_eq!(rec.outcomes_for("eager"), vec![Outcome::Success]);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 0);
    Ok(())
}
