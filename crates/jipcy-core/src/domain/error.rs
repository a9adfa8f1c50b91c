//! Error taxonomy for jipcy.

/// Errors produced by the evaluation pipeline and its collaborators.
///
/// `ThreadSearch` and `Scoring` are transient per-candidate errors and are
/// retried by the evaluator. `Cancelled`, `LimiterClosed` and `TaskFailed` are
/// infrastructure errors that fail the whole run.
#[derive(Debug, thiserror::Error)]
pub enum JipcyError {
    #[error("thread search failed: {0}")]
    ThreadSearch(String),

    #[error("similarity scoring failed: {0}")]
    Scoring(String),

    #[error("tracker query generation failed: {0}")]
    QueryGeneration(String),

    #[error("tracker search failed: {0}")]
    Tracker(String),

    #[error("summary generation failed: {0}")]
    Summary(String),

    #[error("notification delivery failed: {0}")]
    Notification(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("concurrency limiter closed")]
    LimiterClosed,

    #[error("evaluation task failed: {0}")]
    TaskFailed(String),

    #[error("result slot {index} was not written")]
    MissingSlot { index: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl JipcyError {
    /// Returns `true` for errors that must abort the whole run rather than a
    /// single candidate.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::LimiterClosed | Self::TaskFailed(_) | Self::MissingSlot { .. }
        )
    }
}

/// Result type for jipcy operations.
pub type Result<T> = std::result::Result<T, JipcyError>;
