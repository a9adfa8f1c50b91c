//! End-to-end triage with in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use jipcy_core::fakes::{
    CannedQueryGenerator, CannedSummarizer, ScriptedOracle, StaticTracker,
};
use jipcy_core::{
    Candidate, Evaluator, EvaluatorConfig, JipcyError, RetryPolicy, RunContext, Scheduler,
    SchedulerConfig, ThreadFinder, TriageService,
};
use tokio_util::sync::CancellationToken;

fn candidates() -> Vec<Candidate> {
    vec![
        Candidate::new("1", "OPS-1", "login fails").with_url("https://jira/browse/OPS-1"),
        Candidate::new("2", "OPS-2", "printer jam").with_url("https://jira/browse/OPS-2"),
        Candidate::new("3", "OPS-3", "login slow").with_url("https://jira/browse/OPS-3"),
    ]
}

fn scheduler() -> Scheduler {
    let oracle = ScriptedOracle::new()
        .with_score("login fails", 0.9)
        .with_score("printer jam", 0.05)
        .with_score("login slow", 0.6);
    Scheduler::new(
        Evaluator::new(
            Arc::new(ThreadFinder::disabled()),
            Arc::new(oracle),
            EvaluatorConfig::default(),
        ),
        SchedulerConfig::default(),
    )
}

#[tokio::test]
async fn test_triage_ranks_and_summarises() {
    let tracker = Arc::new(StaticTracker::new(candidates()));
    let summarizer = Arc::new(CannedSummarizer::new());
    let service = TriageService::new(
        Arc::new(CannedQueryGenerator::new("OPS")),
        tracker.clone(),
        summarizer.clone(),
        scheduler(),
    );

    let report = service
        .triage("cannot log in", RunContext::new())
        .await
        .unwrap();

    assert_eq!(report.query, "project = OPS AND text ~ \"1\"");
    assert_eq!(report.candidates, 3);
    let keys: Vec<&str> = report.results.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(keys, vec!["OPS-1", "OPS-3"]);
    assert_eq!(
        report.results[0].summary.as_deref(),
        Some("summary of OPS-1")
    );
    assert_eq!(summarizer.calls(), 2);
    assert_eq!(tracker.queries().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_tracker_error_is_fed_back_to_query_generation() {
    let generator = Arc::new(CannedQueryGenerator::new("OPS"));
    let tracker = Arc::new(StaticTracker::new(candidates()).with_failures(2));
    let service = TriageService::new(
        generator.clone(),
        tracker.clone(),
        Arc::new(CannedSummarizer::new()),
        scheduler(),
    );

    let report = service.triage("cannot log in", RunContext::new()).await.unwrap();

    assert_eq!(report.query, "project = OPS AND text ~ \"3\"");
    let feedback = generator.feedback();
    assert_eq!(feedback.len(), 3);
    assert!(feedback[0].is_none());
    assert!(feedback[1]
        .as_deref()
        .unwrap()
        .contains("Error in the JQL Query: 'project = OPS AND text ~ \"1\"'"));
    assert!(feedback[2].as_deref().unwrap().contains("text ~ \"2\""));
}

#[tokio::test(start_paused = true)]
async fn test_tracker_exhaustion_fails_before_scoring() {
    let tracker = Arc::new(StaticTracker::new(candidates()).with_failures(10));
    let summarizer = Arc::new(CannedSummarizer::new());
    let service = TriageService::new(
        Arc::new(CannedQueryGenerator::new("OPS")),
        tracker.clone(),
        summarizer.clone(),
        scheduler(),
    )
    .with_query_retry(RetryPolicy::new(2, Duration::from_millis(5)));

    let err = service
        .triage("cannot log in", RunContext::new())
        .await
        .unwrap_err();

    assert!(matches!(err, JipcyError::Tracker(_)));
    assert_eq!(tracker.queries().len(), 2);
    assert_eq!(summarizer.calls(), 0);
}

#[tokio::test]
async fn test_summary_failure_fails_triage() {
    let service = TriageService::new(
        Arc::new(CannedQueryGenerator::new("OPS")),
        Arc::new(StaticTracker::new(candidates())),
        Arc::new(CannedSummarizer::failing()),
        scheduler(),
    );

    let err = service
        .triage("cannot log in", RunContext::new())
        .await
        .unwrap_err();
    assert!(matches!(err, JipcyError::Summary(_)));
}

#[tokio::test]
async fn test_no_candidates_yields_empty_report() {
    let summarizer = Arc::new(CannedSummarizer::new());
    let service = TriageService::new(
        Arc::new(CannedQueryGenerator::new("OPS")),
        Arc::new(StaticTracker::new(Vec::new())),
        summarizer.clone(),
        scheduler(),
    );

    let report = service.triage("anything", RunContext::new()).await.unwrap();

    assert_eq!(report.candidates, 0);
    assert!(report.results.is_empty());
    assert_eq!(summarizer.calls(), 0);
}

#[tokio::test]
async fn test_cancelled_triage() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let service = TriageService::new(
        Arc::new(CannedQueryGenerator::new("OPS")),
        Arc::new(StaticTracker::new(candidates())),
        Arc::new(CannedSummarizer::new()),
        scheduler(),
    );

    let err = service
        .triage("cannot log in", RunContext::new().with_cancel(cancel))
        .await
        .unwrap_err();
    assert!(matches!(err, JipcyError::Cancelled));
}
