//! Messaging-platform shapes used by thread search.

use serde::{Deserialize, Serialize};

/// A raw keyword-search hit: where the matching message lives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchMatch {
    pub channel: String,
    pub ts: String,
}

/// A message as returned by history/replies lookups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ChannelMessage {
    pub ts: String,
    /// Root timestamp when the message belongs to a thread.
    pub thread_ts: Option<String>,
    /// Author id.
    pub user: String,
    pub text: String,
}

impl ChannelMessage {
    /// Timestamp of the conversation root: the message's own timestamp when it
    /// starts a thread (or stands alone), otherwise its thread root.
    pub fn root_ts(&self) -> &str {
        match self.thread_ts.as_deref() {
            Some(root) if !root.is_empty() => root,
            _ => &self.ts,
        }
    }
}

/// One message of a candidate's thread context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThreadMessage {
    pub channel: String,
    pub ts: String,
    /// Display name when resolvable, otherwise the author id.
    pub author: String,
    /// Text with mentions already neutralised.
    pub text: String,
}

impl ThreadMessage {
    /// Permalink to this message inside `workspace_url`.
    ///
    /// Slack permalinks drop the dot from the timestamp:
    /// `1700000000.123456` becomes `p1700000000123456`.
    pub fn permalink(&self, workspace_url: &str) -> String {
        format!(
            "{}/archives/{}/p{}",
            workspace_url.trim_end_matches('/'),
            self.channel,
            self.ts.replace('.', "")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_ts_prefers_thread_root() {
        let reply = ChannelMessage {
            ts: "1700000100.000200".into(),
            thread_ts: Some("1700000000.000100".into()),
            ..Default::default()
        };
        assert_eq!(reply.root_ts(), "1700000000.000100");

        let standalone = ChannelMessage {
            ts: "1700000000.000100".into(),
            ..Default::default()
        };
        assert_eq!(standalone.root_ts(), "1700000000.000100");

        let empty_root = ChannelMessage {
            ts: "1.2".into(),
            thread_ts: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(empty_root.root_ts(), "1.2");
    }

    #[test]
    fn test_permalink_format() {
        let msg = ThreadMessage {
            channel: "C0123".into(),
            ts: "1700000000.123456".into(),
            author: "alice".into(),
            text: "hi".into(),
        };
        assert_eq!(
            msg.permalink("https://example.slack.com/"),
            "https://example.slack.com/archives/C0123/p1700000000123456"
        );
    }
}
