//! End-to-end triage: query generation, tracker search, scheduling and
//! summaries.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::collaborators::{QueryGenerator, Summarizer, TrackerSearch};
use crate::domain::{Candidate, CandidateFailure, EvaluationResult, JipcyError, Result};
use crate::notify::DeliveryStats;
use crate::retry::{retry_with_policy, RetryError, RetryPolicy};
use crate::scheduler::{RunContext, Scheduler};

/// Result of one triage request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriageReport {
    /// Tracker query that produced the candidates.
    pub query: String,
    /// Number of candidates returned by the tracker.
    pub candidates: usize,
    /// Ranked results with summaries.
    pub results: Vec<EvaluationResult>,
    pub failures: Vec<CandidateFailure>,
    pub notifications: DeliveryStats,
}

pub struct TriageService {
    query_gen: Arc<dyn QueryGenerator>,
    tracker: Arc<dyn TrackerSearch>,
    summarizer: Arc<dyn Summarizer>,
    scheduler: Scheduler,
    query_retry: RetryPolicy,
}

impl TriageService {
    pub fn new(
        query_gen: Arc<dyn QueryGenerator>,
        tracker: Arc<dyn TrackerSearch>,
        summarizer: Arc<dyn Summarizer>,
        scheduler: Scheduler,
    ) -> Self {
        Self {
            query_gen,
            tracker,
            summarizer,
            scheduler,
            query_retry: RetryPolicy::new(3, std::time::Duration::from_secs(1)),
        }
    }

    pub fn with_query_retry(mut self, policy: RetryPolicy) -> Self {
        self.query_retry = policy;
        self
    }

    /// Triage `text`: find related tracker records, rank them and summarise
    /// the best matches.
    pub async fn triage(&self, text: &str, ctx: RunContext) -> Result<TriageReport> {
        let (query, candidates) = self.search_candidates(text, &ctx).await?;
        let found = candidates.len();
        info!(query = %query, candidates = found, "tracker search finished");

        let cancel = ctx.cancel.clone();
        let report = self.scheduler.run_with(text, candidates, ctx).await?;

        let mut results = report.ranked;
        for result in results.iter_mut() {
            let summary = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(JipcyError::Cancelled),
                summary = self.summarizer.summarize(result) => summary?,
            };
            result.summary = Some(summary);
        }

        Ok(TriageReport {
            query,
            candidates: found,
            results,
            failures: report.failures,
            notifications: report.notifications,
        })
    }

    /// Generate a tracker query and run it, retrying both together. The
    /// previous failure is fed back into the next generation.
    async fn search_candidates(
        &self,
        text: &str,
        ctx: &RunContext,
    ) -> Result<(String, Vec<Candidate>)> {
        let policy = &self.query_retry;
        let attempted = retry_with_policy(policy, &ctx.cancel, move |attempt| async move {
            let query = self
                .query_gen
                .generate_query(text, attempt.last_error.as_deref())
                .await?;
            info!(query = %query, attempt = attempt.number, "generated tracker query");
            let candidates = self.tracker.search(&query).await?;
            Ok::<_, JipcyError>((query, candidates))
        })
        .await;

        match attempted {
            Ok(attempted) => Ok(attempted.value),
            Err(RetryError::Exhausted { last_error, .. }) => Err(last_error),
            Err(RetryError::Cancelled { .. }) => Err(JipcyError::Cancelled),
        }
    }
}
