//! Typed progress events posted by evaluators to the notification sink.

use serde::{Deserialize, Serialize};

use crate::mentions::sanitize_plain;

/// Where progress notifications are delivered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotifyTarget {
    pub channel: String,
    /// Thread anchor; `None` posts at channel level.
    pub thread_ts: Option<String>,
}

impl NotifyTarget {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            thread_ts: None,
        }
    }

    pub fn in_thread(mut self, thread_ts: impl Into<String>) -> Self {
        self.thread_ts = Some(thread_ts.into());
        self
    }
}

/// Progress of a single candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started {
        key: String,
        title: String,
    },
    Completed {
        key: String,
        title: String,
        score: f64,
        excluded: bool,
    },
    Failed {
        key: String,
        title: String,
        attempts: u32,
        error: String,
    },
}

impl ProgressEvent {
    pub fn key(&self) -> &str {
        match self {
            Self::Started { key, .. } | Self::Completed { key, .. } | Self::Failed { key, .. } => {
                key
            }
        }
    }

    /// Message text posted to the messaging platform.
    ///
    /// Titles and error text are sanitised so nothing in a tracker record can
    /// address people in the channel.
    pub fn render(&self) -> String {
        match self {
            Self::Started { key, title } => {
                format!("▶️ Started: `{}` - {}", key, sanitize_plain(title))
            }
            Self::Completed {
                key,
                title,
                score,
                excluded: false,
            } => format!(
                "✅ Done: `{}` - {} (similarity: {:.2})",
                key,
                sanitize_plain(title),
                score
            ),
            Self::Completed {
                key,
                title,
                score,
                excluded: true,
            } => format!(
                "⚪ Done: `{}` - {} (similarity: {:.2} - excluded)",
                key,
                sanitize_plain(title),
                score
            ),
            Self::Failed {
                key, title, error, ..
            } => format!(
                "❌ Failed: `{}` - {} (error: {})",
                key,
                sanitize_plain(title),
                sanitize_plain(error)
            ),
        }
    }
}
