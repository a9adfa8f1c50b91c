//! Tracker records under evaluation.

use serde::{Deserialize, Serialize};

/// A single comment on a tracker record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    /// Display name of the comment author.
    pub author: String,
    /// Creation timestamp exactly as reported by the tracker.
    pub created: String,
    /// Plain-text body.
    pub body: String,
}

impl Comment {
    pub fn new(
        author: impl Into<String>,
        created: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            author: author.into(),
            created: created.into(),
            body: body.into(),
        }
    }
}

/// An immutable tracker record produced by the tracker search.
///
/// Comments are kept in the order the tracker returned them, which is assumed
/// to be chronological.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Candidate {
    /// Tracker-internal identifier.
    pub id: String,
    /// Human-facing key (e.g. `OPS-123`).
    pub key: String,
    /// Summary line.
    pub title: String,
    /// Plain-text description.
    pub description: String,
    /// Canonical browse URL; also the keyword used for thread search.
    pub url: String,
    /// Comments in chronological order.
    pub comments: Vec<Comment>,
}

impl Candidate {
    pub fn new(id: impl Into<String>, key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_comment(mut self, comment: Comment) -> Self {
        self.comments.push(comment);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_preserves_comment_order() {
        let c = Candidate::new("10001", "OPS-1", "Login fails")
            .with_description("500 on /login")
            .with_url("https://jira.example.com/browse/OPS-1")
            .with_comment(Comment::new("alice", "2024-01-01T10:00:00.000+0900", "first"))
            .with_comment(Comment::new("bob", "2024-01-02T10:00:00.000+0900", "second"));

        assert_eq!(c.key, "OPS-1");
        assert_eq!(c.comments.len(), 2);
        assert_eq!(c.comments[0].body, "first");
        assert_eq!(c.comments[1].body, "second");
    }
}
