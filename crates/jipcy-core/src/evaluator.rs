//! Per-candidate unit of work.
//!
//! An evaluation holds one concurrency permit for its whole lifetime and runs
//! `format → thread lookup → score` under the retry policy. It always ends in
//! exactly one [`EvaluationOutcome`] and exactly one `Completed` progress
//! event; the only error it returns is [`JipcyError::Cancelled`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::OwnedSemaphorePermit;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::collaborators::SimilarityOracle;
use crate::domain::{
    Candidate, EvaluationOutcome, EvaluationResult, JipcyError, ProgressEvent, Result,
};
use crate::format::{format_candidate, render_thread};
use crate::notify::Notifier;
use crate::obs;
use crate::retry::{retry_with_policy, Attempted, RetryError, RetryPolicy};
use crate::thread_finder::ThreadFinder;

/// Evaluator settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluatorConfig {
    /// Results scoring below this are excluded.
    pub score_threshold: f64,
    pub retry: RetryPolicy,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.3,
            retry: RetryPolicy::default(),
        }
    }
}

/// Output of one successful attempt.
struct Scored {
    score: f64,
    thread: String,
    thread_url: Option<String>,
}

pub struct Evaluator {
    finder: Arc<ThreadFinder>,
    oracle: Arc<dyn SimilarityOracle>,
    config: EvaluatorConfig,
}

impl Evaluator {
    pub fn new(
        finder: Arc<ThreadFinder>,
        oracle: Arc<dyn SimilarityOracle>,
        config: EvaluatorConfig,
    ) -> Self {
        Self {
            finder,
            oracle,
            config,
        }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Evaluate `candidate` against `query`.
    ///
    /// `permit` is held until this returns, on every path.
    pub async fn evaluate(
        &self,
        query: &str,
        candidate: &Candidate,
        permit: OwnedSemaphorePermit,
        notifier: &Notifier,
        cancel: &CancellationToken,
    ) -> Result<EvaluationOutcome> {
        let _permit = permit;

        notifier.notify(ProgressEvent::Started {
            key: candidate.key.clone(),
            title: candidate.title.clone(),
        });

        let content = format_candidate(candidate);
        let content = content.as_str();

        let attempted = retry_with_policy(&self.config.retry, cancel, move |attempt| async move {
            debug!(key = %candidate.key, attempt = attempt.number, "evaluating candidate");
            self.attempt(query, candidate, content).await
        })
        .await;

        let (outcome, attempts) = match attempted {
            Ok(Attempted { value, attempts }) => (self.decide(candidate, content, value), attempts),
            Err(RetryError::Exhausted {
                attempts,
                last_error,
            }) => {
                obs::emit_candidate_failed(&candidate.key, attempts, &last_error);
                notifier
                    .send(
                        ProgressEvent::Failed {
                            key: candidate.key.clone(),
                            title: candidate.title.clone(),
                            attempts,
                            error: last_error.to_string(),
                        },
                        cancel,
                    )
                    .await;
                (
                    EvaluationOutcome::Failed {
                        attempts,
                        error: last_error.to_string(),
                    },
                    attempts,
                )
            }
            Err(RetryError::Cancelled { .. }) => return Err(JipcyError::Cancelled),
        };

        notifier
            .send(
                ProgressEvent::Completed {
                    key: candidate.key.clone(),
                    title: candidate.title.clone(),
                    score: outcome.score(),
                    excluded: !outcome.is_included(),
                },
                cancel,
            )
            .await;
        obs::emit_candidate_evaluated(&candidate.key, outcome.label(), outcome.score(), attempts);

        Ok(outcome)
    }

    async fn attempt(&self, query: &str, candidate: &Candidate, content: &str) -> Result<Scored> {
        let messages = self.finder.find(search_keyword(candidate)).await?;
        let thread = render_thread(&messages);

        let score = self.oracle.score(query, content, &thread).await?;
        if !(0.0..=1.0).contains(&score) {
            return Err(JipcyError::Scoring(format!(
                "score {} outside [0, 1]",
                score
            )));
        }

        Ok(Scored {
            score,
            thread,
            thread_url: messages.first().and_then(|m| self.finder.permalink(m)),
        })
    }

    fn decide(&self, candidate: &Candidate, content: &str, scored: Scored) -> EvaluationOutcome {
        if scored.score < self.config.score_threshold {
            return EvaluationOutcome::Excluded {
                score: scored.score,
            };
        }

        EvaluationOutcome::Succeeded(EvaluationResult {
            id: Some(candidate.id.clone()),
            key: candidate.key.clone(),
            title: candidate.title.clone(),
            description: candidate.description.clone(),
            url: candidate.url.clone(),
            content: content.to_string(),
            score: scored.score,
            thread: scored.thread,
            thread_url: scored.thread_url,
            summary: None,
        })
    }
}

/// Threads reference a record by its URL; fall back to the key when the
/// tracker supplied none.
fn search_keyword(candidate: &Candidate) -> &str {
    if candidate.url.is_empty() {
        &candidate.key
    } else {
        &candidate.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = EvaluatorConfig::default();
        assert_eq!(cfg.score_threshold, 0.3);
        assert_eq!(cfg.retry.max_attempts, 3);
    }

    #[test]
    fn test_search_keyword_prefers_url() {
        let with_url = Candidate::new("1", "OPS-1", "t").with_url("https://jira/browse/OPS-1");
        assert_eq!(search_keyword(&with_url), "https://jira/browse/OPS-1");
        let without = Candidate::new("2", "OPS-2", "t");
        assert_eq!(search_keyword(&without), "OPS-2");
    }
}
