// tests/cli_commands.rs
#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use warmdag::WarmUpError;
use warmdag::build_warmuper;
use warmdag::stage::NoOpStageHandler;
use warmdag_test_utils::builders::{ConfigFileBuilder, NodeConfigBuilder};
use warmdag_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn append(name: &str, log: &Path) -> String {
    format!("echo {name} >> {}", log.display())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn commands_run_in_after_order() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let log = dir.path().join("order.log");

    let cfg = ConfigFileBuilder::new()
        .with_node("db", NodeConfigBuilder::new().warmup(&append("db", &log)).build())
        .with_node(
            "cache",
            NodeConfigBuilder::new()
                .after("db")
                .warmup(&append("cache", &log))
                .build(),
        )
        .with_node(
            "web",
            NodeConfigBuilder::new()
                .after("cache")
                .warmup(&append("web", &log))
                .build(),
        )
        .build();

    let warmuper = build_warmuper(&cfg, None)?;
    let report = with_timeout(warmuper.stage()).await?;

    let lines: Vec<String> = fs::read_to_string(&log)?
        .lines()
        .map(str::to_string)
        .collect();
    assert_eq!(lines, vec!["db", "cache", "web"]);
    assert!(report.is_clean());
    Ok(())
}

#[tokio::test]
async fn failing_command_is_counted_not_fatal() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let marker = dir.path().join("after-failure");

    let cfg = ConfigFileBuilder::new()
        .with_node("broken", NodeConfigBuilder::new().warmup("exit 3").build())
        .with_node(
            "next",
            NodeConfigBuilder::new()
                .after("broken")
                .warmup(&format!("touch {}", marker.display()))
                .build(),
        )
        .build();

    let warmuper = build_warmuper(&cfg, None)?;
    let report = with_timeout(warmuper.stage()).await?;

    assert_eq!(report.failed, 1);
    assert_eq!(report.succeeded, 1);
    assert!(!report.is_clean());
    assert!(marker.exists());
    Ok(())
}

#[tokio::test]
async fn config_deadline_kills_slow_command() -> TestResult {
    init_tracing();

    let cfg = ConfigFileBuilder::new()
        .max_wait("200ms")
        .with_node("slow", NodeConfigBuilder::new().warmup("sleep 5").build())
        .build();

    let warmuper = build_warmuper(&cfg, None)?;
    let result = with_timeout(warmuper.stage_with(Arc::new(NoOpStageHandler))).await;

    assert!(matches!(result, Err(WarmUpError::Timeout { .. })), "{result:?}");
    Ok(())
}

#[tokio::test]
async fn max_wait_override_wins_over_config() -> TestResult {
    init_tracing();

    let cfg = ConfigFileBuilder::new()
        .max_wait("1h")
        .with_node("n", NodeConfigBuilder::new().warmup("true").build())
        .build();

    let warmuper = build_warmuper(&cfg, Some("250ms"))?;
    assert_eq!(warmuper.max_wait(), Some(std::time::Duration::from_millis(250)));

    assert!(build_warmuper(&cfg, Some("whenever")).is_err());
    Ok(())
}

#[test]
fn parallelism_comes_from_config() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .parallelism(2)
        .with_node("n", NodeConfigBuilder::new().build())
        .build();

    let warmuper = build_warmuper(&cfg, None)?;
    assert_eq!(warmuper.parallelism(), 2);
    assert_eq!(warmuper.pending_nodes(), 0);
    Ok(())
}
