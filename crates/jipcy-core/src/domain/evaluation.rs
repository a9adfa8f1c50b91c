//! Per-candidate evaluation results.

use serde::{Deserialize, Serialize};

/// One result slot per candidate.
///
/// A slot whose `id` is `None` is the excluded marker: the candidate scored
/// below the threshold or failed permanently. Excluded slots are dropped during
/// aggregation and never re-scored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EvaluationResult {
    pub id: Option<String>,
    pub key: String,
    pub title: String,
    pub description: String,
    pub url: String,
    /// Formatted content that was scored.
    pub content: String,
    /// Similarity in [0, 1].
    pub score: f64,
    /// Rendered thread context that was scored alongside the content.
    pub thread: String,
    /// Permalink of the first thread message, if any thread was found.
    pub thread_url: Option<String>,
    /// Generated summary, filled in after ranking.
    pub summary: Option<String>,
}

impl EvaluationResult {
    /// The excluded marker.
    pub fn excluded() -> Self {
        Self::default()
    }

    pub fn is_excluded(&self) -> bool {
        self.id.is_none()
    }
}

/// Terminal state of a single candidate's evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationOutcome {
    /// Scored at or above the threshold.
    Succeeded(EvaluationResult),
    /// Scored below the threshold.
    Excluded { score: f64 },
    /// Every attempt failed; degrades to an excluded slot.
    Failed { attempts: u32, error: String },
}

impl EvaluationOutcome {
    /// Score observed for this candidate; failed evaluations report `0.0`.
    pub fn score(&self) -> f64 {
        match self {
            Self::Succeeded(result) => result.score,
            Self::Excluded { score } => *score,
            Self::Failed { .. } => 0.0,
        }
    }

    pub fn is_included(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    /// Short label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded(_) => "succeeded",
            Self::Excluded { .. } => "excluded",
            Self::Failed { .. } => "failed",
        }
    }

    /// Collapse into the slot value written for this candidate.
    pub fn into_slot(self) -> EvaluationResult {
        match self {
            Self::Succeeded(result) => result,
            Self::Excluded { .. } | Self::Failed { .. } => EvaluationResult::excluded(),
        }
    }
}

/// A candidate whose evaluation failed permanently.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateFailure {
    /// Input position of the candidate.
    pub index: usize,
    pub key: String,
    pub attempts: u32,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excluded_marker_has_no_id() {
        assert!(EvaluationResult::excluded().is_excluded());
        let included = EvaluationResult {
            id: Some("1".into()),
            score: 0.5,
            ..Default::default()
        };
        assert!(!included.is_excluded());
    }

    #[test]
    fn test_outcome_into_slot() {
        let ok = EvaluationOutcome::Succeeded(EvaluationResult {
            id: Some("1".into()),
            score: 0.8,
            ..Default::default()
        });
        assert_eq!(ok.score(), 0.8);
        assert!(!ok.into_slot().is_excluded());

        let low = EvaluationOutcome::Excluded { score: 0.1 };
        assert_eq!(low.label(), "excluded");
        assert!(low.into_slot().is_excluded());

        let failed = EvaluationOutcome::Failed {
            attempts: 3,
            error: "boom".into(),
        };
        assert_eq!(failed.score(), 0.0);
        assert!(failed.into_slot().is_excluded());
    }
}
