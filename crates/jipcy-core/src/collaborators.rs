//! Injectable collaborators of the pipeline.
//!
//! Every remote service the pipeline talks to sits behind one of these traits.
//! Implementations are passed in as `Arc<dyn Trait>` at construction time;
//! `jipcy-clients` provides the HTTP implementations and [`crate::fakes`]
//! provides in-memory ones for tests.

use async_trait::async_trait;

use crate::domain::{Candidate, ChannelMessage, EvaluationResult, Result, SearchMatch};

/// Messaging-platform search and history lookups used by the thread finder.
#[async_trait]
pub trait ThreadSearch: Send + Sync {
    /// Keyword search; returns at most `count` matches.
    async fn search_messages(&self, query: &str, count: usize) -> Result<Vec<SearchMatch>>;

    /// The single message at `ts` in `channel`, if it still exists.
    async fn message_at(&self, channel: &str, ts: &str) -> Result<Option<ChannelMessage>>;

    /// Up to `limit` messages of the thread rooted at `root_ts`, root included.
    async fn replies(&self, channel: &str, root_ts: &str, limit: usize)
        -> Result<Vec<ChannelMessage>>;

    /// Preferred display name of a user. Best effort; `None` when unknown.
    async fn display_name(&self, _user_id: &str) -> Option<String> {
        None
    }

    /// Handle (or name) of a user group. Best effort; `None` when unknown.
    async fn group_name(&self, _group_id: &str) -> Option<String> {
        None
    }
}

/// Similarity scoring between the user's query and a candidate.
#[async_trait]
pub trait SimilarityOracle: Send + Sync {
    /// Similarity in `[0, 1]`. Errors propagate unchanged; no fallback score.
    async fn score(&self, query: &str, content: &str, thread: &str) -> Result<f64>;
}

/// Delivery of plain-text notifications.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn post(&self, channel: &str, thread_ts: Option<&str>, text: &str) -> Result<()>;
}

/// Turns natural-language text into a tracker query.
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    /// `last_error` carries the failure of the previous attempt, if any, so the
    /// generator can correct itself.
    async fn generate_query(&self, text: &str, last_error: Option<&str>) -> Result<String>;
}

/// Tracker search in the tracker's native query language.
#[async_trait]
pub trait TrackerSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<Candidate>>;
}

/// Prose summaries for ranked results.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, result: &EvaluationResult) -> Result<String>;
}
