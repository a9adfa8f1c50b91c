//! Bounded-concurrency scheduling of candidate evaluations.
//!
//! One task per candidate is spawned into a [`JoinSet`]; each task must
//! acquire a permit of a shared [`Semaphore`] before it evaluates. Every task
//! writes exactly one result slot, keyed by the candidate's input position.
//! When all slots are written they are aggregated by [`select_top`].
//!
//! Per-candidate failures degrade to excluded slots. Infrastructure failures
//! (cancellation, a closed limiter, a panicked task) fail the whole run: the
//! remaining tasks are cancelled and aborted and no partial list is returned.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::collaborators::NotificationTransport;
use crate::domain::{
    Candidate, CandidateFailure, EvaluationOutcome, EvaluationResult, JipcyError, NotifyTarget,
    Result,
};
use crate::evaluator::Evaluator;
use crate::notify::{DeliveryStats, NotificationSink, NotifyConfig};
use crate::obs;

/// Scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Evaluations allowed past permit acquisition at once.
    pub max_concurrency: usize,
    /// Length bound of the ranked output.
    pub top_k: usize,
    pub notify: NotifyConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            top_k: 5,
            notify: NotifyConfig::default(),
        }
    }
}

/// Per-run inputs that are not part of the scheduler's configuration.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub cancel: CancellationToken,
    /// Progress notifications are posted here when a transport is configured.
    pub notify_target: Option<NotifyTarget>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_target(mut self, target: NotifyTarget) -> Self {
        self.notify_target = Some(target);
        self
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub run_id: String,
    /// Top results, score descending.
    pub ranked: Vec<EvaluationResult>,
    /// Slots written; always equal to the candidate count.
    pub slots_written: usize,
    /// Slots carrying the excluded marker.
    pub excluded: usize,
    pub failures: Vec<CandidateFailure>,
    pub notifications: DeliveryStats,
}

pub struct Scheduler {
    evaluator: Arc<Evaluator>,
    transport: Option<Arc<dyn NotificationTransport>>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(evaluator: Evaluator, config: SchedulerConfig) -> Self {
        Self {
            evaluator: Arc::new(evaluator),
            transport: None,
            config,
        }
    }

    /// Deliver progress events through `transport`.
    pub fn with_notifications(mut self, transport: Arc<dyn NotificationTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Evaluate all candidates and return the top-K results.
    pub async fn run(
        &self,
        query: &str,
        candidates: Vec<Candidate>,
    ) -> Result<Vec<EvaluationResult>> {
        let report = self.run_with(query, candidates, RunContext::default()).await?;
        Ok(report.ranked)
    }

    /// [`run`](Self::run) with cancellation, a notification target and the
    /// full bookkeeping.
    pub async fn run_with(
        &self,
        query: &str,
        candidates: Vec<Candidate>,
        ctx: RunContext,
    ) -> Result<RunReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = obs::run_span(&run_id);
        self.run_inner(run_id, query, candidates, ctx)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        run_id: String,
        query: &str,
        candidates: Vec<Candidate>,
        ctx: RunContext,
    ) -> Result<RunReport> {
        if ctx.cancel.is_cancelled() {
            return Err(JipcyError::Cancelled);
        }
        if candidates.is_empty() {
            return Ok(RunReport {
                run_id,
                ..Default::default()
            });
        }

        let started = Instant::now();
        let total = candidates.len();
        obs::emit_run_started(&run_id, total, self.config.max_concurrency);

        let cancel = ctx.cancel.child_token();
        let sink = match (&self.transport, ctx.notify_target) {
            (Some(transport), Some(target)) => NotificationSink::start(
                transport.clone(),
                target,
                &self.config.notify,
                cancel.clone(),
            ),
            _ => NotificationSink::disabled(),
        };

        let limiter = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let failures: Arc<Mutex<Vec<CandidateFailure>>> = Arc::new(Mutex::new(Vec::new()));
        let query: Arc<str> = Arc::from(query);

        let mut tasks = JoinSet::new();
        for (index, candidate) in candidates.into_iter().enumerate() {
            let evaluator = self.evaluator.clone();
            let limiter = limiter.clone();
            let failures = failures.clone();
            let query = query.clone();
            let notifier = sink.handle();
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return (index, Err(JipcyError::Cancelled)),
                    permit = limiter.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return (index, Err(JipcyError::LimiterClosed)),
                    },
                };

                let outcome = evaluator
                    .evaluate(&query, &candidate, permit, &notifier, &cancel)
                    .await;

                if let Ok(EvaluationOutcome::Failed { attempts, error }) = &outcome {
                    failures.lock().await.push(CandidateFailure {
                        index,
                        key: candidate.key.clone(),
                        attempts: *attempts,
                        error: error.clone(),
                    });
                }
                (index, outcome)
            });
        }

        let mut slots: Vec<Option<EvaluationResult>> = vec![None; total];
        if let Err(err) = collect_slots(&mut tasks, &mut slots).await {
            cancel.cancel();
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
            sink.close().await;
            obs::emit_run_aborted(&run_id, &err);
            return Err(err);
        }

        let notifications = sink.close().await;

        let slots = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.ok_or(JipcyError::MissingSlot { index }))
            .collect::<Result<Vec<_>>>()?;

        let excluded = slots.iter().filter(|slot| slot.is_excluded()).count();
        let mut failures = std::mem::take(&mut *failures.lock().await);
        failures.sort_by_key(|f| f.index);
        let ranked = select_top(&slots, self.config.top_k);

        obs::emit_run_finished(
            &run_id,
            started.elapsed().as_millis() as u64,
            ranked.len(),
            failures.len(),
        );

        Ok(RunReport {
            run_id,
            ranked,
            slots_written: slots.len(),
            excluded,
            failures,
            notifications,
        })
    }
}

/// Drain `tasks`, writing each outcome into its slot. Returns on the first
/// infrastructure error.
async fn collect_slots(
    tasks: &mut JoinSet<(usize, Result<EvaluationOutcome>)>,
    slots: &mut [Option<EvaluationResult>],
) -> Result<()> {
    while let Some(joined) = tasks.join_next().await {
        let (index, outcome) = joined.map_err(|e| JipcyError::TaskFailed(e.to_string()))?;
        let outcome = outcome?;
        let slot = slots
            .get_mut(index)
            .ok_or(JipcyError::MissingSlot { index })?;
        if slot.is_some() {
            return Err(JipcyError::TaskFailed(format!(
                "slot {} written twice",
                index
            )));
        }
        *slot = Some(outcome.into_slot());
    }
    Ok(())
}

/// Keep non-excluded results, sort by score descending (stable for ties) and
/// truncate to `k`. Idempotent.
pub fn select_top(results: &[EvaluationResult], k: usize) -> Vec<EvaluationResult> {
    let mut kept: Vec<EvaluationResult> = results
        .iter()
        .filter(|r| !r.is_excluded())
        .cloned()
        .collect();
    kept.sort_by(|a, b| b.score.total_cmp(&a.score));
    kept.truncate(k);
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, score: f64) -> EvaluationResult {
        EvaluationResult {
            id: Some(id.to_string()),
            key: id.to_string(),
            score,
            ..Default::default()
        }
    }

    #[test]
    fn test_select_top_filters_sorts_truncates() {
        let slots = vec![
            result("a", 0.4),
            EvaluationResult::excluded(),
            result("b", 0.9),
            result("c", 0.6),
        ];
        let top = select_top(&slots, 2);
        let ids: Vec<_> = top.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_select_top_stable_for_ties() {
        let slots = vec![result("first", 0.5), result("second", 0.5), result("third", 0.5)];
        let top = select_top(&slots, 5);
        let ids: Vec<_> = top.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_select_top_idempotent() {
        let slots = vec![result("a", 0.3), result("b", 0.8), EvaluationResult::excluded()];
        let once = select_top(&slots, 5);
        assert_eq!(select_top(&once, 5), once);
    }

    #[test]
    fn test_select_top_empty_and_all_excluded() {
        assert!(select_top(&[], 5).is_empty());
        assert!(select_top(&[EvaluationResult::excluded()], 5).is_empty());
        assert!(select_top(&[result("a", 0.9)], 0).is_empty());
    }

    #[test]
    fn test_default_config() {
        let cfg = SchedulerConfig::default();
        assert_eq!(cfg.max_concurrency, 5);
        assert_eq!(cfg.top_k, 5);
    }
}
