//! In-memory fakes for the collaborator traits (testing only)
//!
//! Provides `ScriptedOracle`, `MemoryThreadSearch`, `RecordingTransport`,
//! `StaticTracker`, `CannedQueryGenerator` and `CannedSummarizer`, which
//! satisfy the trait contracts without any network access.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::collaborators::*;
use crate::domain::{
    Candidate, ChannelMessage, EvaluationResult, JipcyError, Result, SearchMatch,
};

// ---------------------------------------------------------------------------
// ScriptedOracle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
struct Script {
    score: f64,
    /// Calls that fail before the first success; `u32::MAX` fails forever.
    fail_first: u32,
    panics: bool,
}

/// Similarity oracle with per-candidate scripted scores.
///
/// Candidates are recognised by their title, the second line of the
/// formatted content. Unscripted candidates score `0.0`.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<HashMap<String, u32>>,
    threads: Mutex<Vec<String>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_score(self, title: &str, score: f64) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(title.to_string())
            .or_default()
            .score = score;
        self
    }

    /// Fail the first `failures` calls for `title`.
    pub fn with_failures(self, title: &str, failures: u32) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(title.to_string())
            .or_default()
            .fail_first = failures;
        self
    }

    /// Fail every call for `title`.
    pub fn always_failing(self, title: &str) -> Self {
        self.with_failures(title, u32::MAX)
    }

    /// Panic on every call for `title`.
    pub fn with_panic(self, title: &str) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(title.to_string())
            .or_default()
            .panics = true;
        self
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls_for(&self, title: &str) -> u32 {
        self.calls.lock().unwrap().get(title).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }

    /// Highest number of calls observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Thread renderings passed to the oracle, in call order.
    pub fn seen_threads(&self) -> Vec<String> {
        self.threads.lock().unwrap().clone()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SimilarityOracle for ScriptedOracle {
    async fn score(&self, _query: &str, content: &str, thread: &str) -> Result<f64> {
        let title = content.lines().nth(1).unwrap_or_default().to_string();

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let call = {
            let mut calls = self.calls.lock().unwrap();
            let entry = calls.entry(title.clone()).or_insert(0);
            *entry += 1;
            *entry
        };
        self.threads.lock().unwrap().push(thread.to_string());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&title)
            .copied()
            .unwrap_or_default();

        if script.panics {
            panic!("scripted panic for {}", title);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if script.fail_first == u32::MAX || call <= script.fail_first {
            return Err(JipcyError::Scoring(format!(
                "scripted failure {} for {}",
                call, title
            )));
        }
        Ok(script.score)
    }
}

// ---------------------------------------------------------------------------
// MemoryThreadSearch
// ---------------------------------------------------------------------------

/// Thread search over an in-memory workspace.
///
/// A registered hit matches every query that contains its keyword.
#[derive(Debug, Default)]
pub struct MemoryThreadSearch {
    hits: Mutex<Vec<(String, SearchMatch)>>,
    history: Mutex<HashMap<(String, String), ChannelMessage>>,
    threads: Mutex<HashMap<(String, String), Vec<ChannelMessage>>>,
    users: Mutex<HashMap<String, String>>,
    groups: Mutex<HashMap<String, String>>,
    queries: Mutex<Vec<String>>,
    replies_calls: AtomicUsize,
    failing: bool,
}

impl MemoryThreadSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `message` in `channel` as a hit for `keyword`.
    pub fn with_hit(self, keyword: &str, channel: &str, message: ChannelMessage) -> Self {
        self.hits.lock().unwrap().push((
            keyword.to_string(),
            SearchMatch {
                channel: channel.to_string(),
                ts: message.ts.clone(),
            },
        ));
        self.history
            .lock()
            .unwrap()
            .insert((channel.to_string(), message.ts.clone()), message);
        self
    }

    /// Register a hit whose message no longer exists in history.
    pub fn with_dangling_hit(self, keyword: &str, channel: &str, ts: &str) -> Self {
        self.hits.lock().unwrap().push((
            keyword.to_string(),
            SearchMatch {
                channel: channel.to_string(),
                ts: ts.to_string(),
            },
        ));
        self
    }

    pub fn with_thread(self, channel: &str, root_ts: &str, messages: Vec<ChannelMessage>) -> Self {
        self.threads
            .lock()
            .unwrap()
            .insert((channel.to_string(), root_ts.to_string()), messages);
        self
    }

    pub fn with_user(self, id: &str, name: &str) -> Self {
        self.users
            .lock()
            .unwrap()
            .insert(id.to_string(), name.to_string());
        self
    }

    pub fn with_group(self, id: &str, handle: &str) -> Self {
        self.groups
            .lock()
            .unwrap()
            .insert(id.to_string(), handle.to_string());
        self
    }

    /// Every search fails.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn search_calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn replies_calls(&self) -> usize {
        self.replies_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ThreadSearch for MemoryThreadSearch {
    async fn search_messages(&self, query: &str, count: usize) -> Result<Vec<SearchMatch>> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.failing {
            return Err(JipcyError::ThreadSearch("search unavailable".to_string()));
        }
        Ok(self
            .hits
            .lock()
            .unwrap()
            .iter()
            .filter(|(keyword, _)| query.contains(keyword.as_str()))
            .map(|(_, hit)| hit.clone())
            .take(count)
            .collect())
    }

    async fn message_at(&self, channel: &str, ts: &str) -> Result<Option<ChannelMessage>> {
        Ok(self
            .history
            .lock()
            .unwrap()
            .get(&(channel.to_string(), ts.to_string()))
            .cloned())
    }

    async fn replies(
        &self,
        channel: &str,
        root_ts: &str,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>> {
        self.replies_calls.fetch_add(1, Ordering::SeqCst);
        let threads = self.threads.lock().unwrap();
        let messages = threads
            .get(&(channel.to_string(), root_ts.to_string()))
            .cloned()
            .unwrap_or_default();
        Ok(messages.into_iter().take(limit).collect())
    }

    async fn display_name(&self, user_id: &str) -> Option<String> {
        self.users.lock().unwrap().get(user_id).cloned()
    }

    async fn group_name(&self, group_id: &str) -> Option<String> {
        self.groups.lock().unwrap().get(group_id).cloned()
    }
}

// ---------------------------------------------------------------------------
// RecordingTransport
// ---------------------------------------------------------------------------

/// A notification as the transport received it.
#[derive(Debug, Clone, PartialEq)]
pub struct PostedMessage {
    pub channel: String,
    pub thread_ts: Option<String>,
    pub text: String,
    pub at: tokio::time::Instant,
}

/// Transport that records every post. Posts whose text contains one of the
/// configured markers fail after being recorded.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    posts: Mutex<Vec<PostedMessage>>,
    fail_markers: Vec<String>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_when_contains(mut self, marker: &str) -> Self {
        self.fail_markers.push(marker.to_string());
        self
    }

    pub fn posts(&self) -> Vec<PostedMessage> {
        self.posts.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.text.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationTransport for RecordingTransport {
    async fn post(&self, channel: &str, thread_ts: Option<&str>, text: &str) -> Result<()> {
        self.posts.lock().unwrap().push(PostedMessage {
            channel: channel.to_string(),
            thread_ts: thread_ts.map(str::to_string),
            text: text.to_string(),
            at: tokio::time::Instant::now(),
        });
        if self.fail_markers.iter().any(|m| text.contains(m.as_str())) {
            return Err(JipcyError::Notification("channel_not_found".to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StaticTracker
// ---------------------------------------------------------------------------

/// Tracker that answers every query with the same candidates.
#[derive(Debug, Default)]
pub struct StaticTracker {
    candidates: Vec<Candidate>,
    fail_first: u32,
    queries: Mutex<Vec<String>>,
}

impl StaticTracker {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates,
            ..Default::default()
        }
    }

    /// Reject the first `failures` searches.
    pub fn with_failures(mut self, failures: u32) -> Self {
        self.fail_first = failures;
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrackerSearch for StaticTracker {
    async fn search(&self, query: &str) -> Result<Vec<Candidate>> {
        let call = {
            let mut queries = self.queries.lock().unwrap();
            queries.push(query.to_string());
            queries.len() as u32
        };
        if call <= self.fail_first {
            return Err(JipcyError::Tracker(format!(
                "Error in the JQL Query: '{}'",
                query
            )));
        }
        Ok(self.candidates.clone())
    }
}

// ---------------------------------------------------------------------------
// CannedQueryGenerator
// ---------------------------------------------------------------------------

/// Query generator that returns `project = X AND text ~ "<n>"` for call `n`
/// and records the feedback it was given.
#[derive(Debug, Default)]
pub struct CannedQueryGenerator {
    project: String,
    feedback: Mutex<Vec<Option<String>>>,
}

impl CannedQueryGenerator {
    pub fn new(project: &str) -> Self {
        Self {
            project: project.to_string(),
            ..Default::default()
        }
    }

    /// `last_error` arguments received, in call order.
    pub fn feedback(&self) -> Vec<Option<String>> {
        self.feedback.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryGenerator for CannedQueryGenerator {
    async fn generate_query(&self, _text: &str, last_error: Option<&str>) -> Result<String> {
        let call = {
            let mut feedback = self.feedback.lock().unwrap();
            feedback.push(last_error.map(str::to_string));
            feedback.len()
        };
        Ok(format!("project = {} AND text ~ \"{}\"", self.project, call))
    }
}

// ---------------------------------------------------------------------------
// CannedSummarizer
// ---------------------------------------------------------------------------

/// Summarizer that returns `summary of <key>`.
#[derive(Debug, Default)]
pub struct CannedSummarizer {
    failing: bool,
    calls: AtomicUsize,
}

impl CannedSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for CannedSummarizer {
    async fn summarize(&self, result: &EvaluationResult) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(JipcyError::Summary("model unavailable".to_string()));
        }
        Ok(format!("summary of {}", result.key))
    }
}
