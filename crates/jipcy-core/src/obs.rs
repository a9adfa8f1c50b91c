//! Structured observability hooks for triage runs.
//!
//! This module provides:
//! - Run-scoped tracing spans via [`run_span`]
//! - Emission functions for run and candidate lifecycle events
//!
//! Events are emitted at `info!` level, failures at `warn!`. For JSON output
//! run the CLI with `--json`.

use tracing::{info, warn};

/// Span tagged with the run id. Attach it to the run future with
/// `tracing::Instrument` so it survives `.await` points.
///
/// # Example
///
/// ```ignore
/// scheduler_run(...).instrument(run_span("9b2c...")).await
/// ```
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("jipcy.run", run_id = %run_id)
}

/// Emit event: scheduler run started.
pub fn emit_run_started(run_id: &str, candidates: usize, max_concurrency: usize) {
    info!(
        event = "run.started",
        run_id = %run_id,
        candidates = candidates,
        max_concurrency = max_concurrency,
    );
}

/// Emit event: scheduler run finished.
pub fn emit_run_finished(run_id: &str, duration_ms: u64, ranked: usize, failed: usize) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        ranked = ranked,
        failed = failed,
    );
}

/// Emit event: run aborted by an infrastructure error or cancellation.
pub fn emit_run_aborted(run_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "run.aborted", run_id = %run_id, error = %error);
}

/// Emit event: one candidate reached a terminal state.
pub fn emit_candidate_evaluated(key: &str, outcome: &str, score: f64, attempts: u32) {
    info!(
        event = "candidate.evaluated",
        key = %key,
        outcome = %outcome,
        score = score,
        attempts = attempts,
    );
}

/// Emit event: one candidate exhausted its retries.
pub fn emit_candidate_failed(key: &str, attempts: u32, error: &dyn std::fmt::Display) {
    warn!(event = "candidate.failed", key = %key, attempts = attempts, error = %error);
}

/// Emit event: a progress notification could not be delivered.
pub fn emit_notification_failed(key: &str, error: &dyn std::fmt::Display) {
    warn!(event = "notify.failed", key = %key, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_create() {
        let _entered = run_span("test-run-id").entered();
        emit_candidate_evaluated("OPS-1", "succeeded", 0.9, 1);
    }
}
