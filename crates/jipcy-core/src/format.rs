//! Rendering tracker records into the text that is scored and displayed.

use crate::domain::{Candidate, ThreadMessage};
use crate::mentions::sanitize_plain;

/// Render a candidate into its formatted content.
///
/// Sections are always present, empty when the record has no data for them.
/// Comments keep the order supplied by the tracker. All free text is passed
/// through [`sanitize_plain`].
pub fn format_candidate(candidate: &Candidate) -> String {
    let comments: Vec<String> = candidate
        .comments
        .iter()
        .map(|c| {
            format!(
                "### {} ({})\n{}",
                sanitize_plain(c.author.trim()),
                c.created.trim(),
                sanitize_plain(c.body.trim())
            )
        })
        .collect();

    format!(
        "## Summary\n{}\n## Description\n{}\n## Comments\n{}",
        sanitize_plain(candidate.title.trim()),
        sanitize_plain(candidate.description.trim()),
        comments.join("\n\n")
    )
}

/// Render a thread context for prompts. Message text is expected to be
/// sanitised already; authors are sanitised here.
pub fn render_thread(messages: &[ThreadMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            format!(
                "### {} ({})\n{}",
                sanitize_plain(&m.author),
                display_ts(&m.ts),
                m.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Slack timestamps are `seconds.micros`; show them as RFC 3339 when they parse.
fn display_ts(ts: &str) -> String {
    let seconds = ts.split('.').next().and_then(|s| s.parse::<i64>().ok());
    match seconds.and_then(|s| chrono::DateTime::from_timestamp(s, 0)) {
        Some(dt) => dt.to_rfc3339(),
        None => ts.to_string(),
    }
}
