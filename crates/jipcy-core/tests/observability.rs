//! Observability tests for triage run lifecycle tracing.
//!
//! `no-env-filter` lets `#[traced_test]` capture events emitted by
//! `jipcy_core` itself, not only by this test binary.

use std::sync::Arc;
use std::time::Duration;

use jipcy_core::fakes::ScriptedOracle;
use jipcy_core::obs::{emit_candidate_failed, emit_run_aborted, emit_run_started, run_span};
use jipcy_core::{
    Candidate, Evaluator, EvaluatorConfig, RetryPolicy, Scheduler, SchedulerConfig, ThreadFinder,
};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_emit_run_started_logs_candidate_count() {
    emit_run_started("run-123", 7, 5);
    assert!(logs_contain("run.started"));
    assert!(logs_contain("candidates=7"));
}

#[traced_test]
#[test]
fn test_failures_log_at_warn() {
    emit_candidate_failed("OPS-1", 3, &"status 429");
    emit_run_aborted("run-err-001", &"run cancelled");
    assert!(logs_contain("candidate.failed"));
    assert!(logs_contain("status 429"));
    assert!(logs_contain("run.aborted"));
}

#[traced_test]
#[test]
fn test_run_span_tags_events() {
    let _entered = run_span("span-run-1").entered();
    tracing::info!("inside run");
    assert!(logs_contain("span-run-1"));
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn test_scheduler_run_emits_lifecycle_events() {
    let oracle = ScriptedOracle::new()
        .with_score("good", 0.8)
        .always_failing("bad");
    let scheduler = Scheduler::new(
        Evaluator::new(
            Arc::new(ThreadFinder::disabled()),
            Arc::new(oracle),
            EvaluatorConfig {
                score_threshold: 0.3,
                retry: RetryPolicy::new(2, Duration::from_millis(5)),
            },
        ),
        SchedulerConfig::default(),
    );

    scheduler
        .run(
            "q",
            vec![Candidate::new("1", "OPS-1", "good"), Candidate::new("2", "OPS-2", "bad")],
        )
        .await
        .unwrap();

    assert!(logs_contain("run.started"));
    assert!(logs_contain("candidate.evaluated"));
    assert!(logs_contain("candidate.failed"));
    assert!(logs_contain("attempt failed, retrying"));
    assert!(logs_contain("run.finished"));
}
