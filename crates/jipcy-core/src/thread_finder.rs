//! Discussion-thread lookup for a candidate.
//!
//! A keyword search returns individual messages; each match is resolved to
//! the root of its conversation and the whole thread is fetched once. Two
//! matches in the same `(channel, root_ts)` thread expand it only once.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collaborators::ThreadSearch;
use crate::domain::{ChannelMessage, Result, ThreadMessage};
use crate::mentions::{referenced_group_ids, referenced_user_ids, sanitize};

/// Configuration for thread lookups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreadFinderConfig {
    /// Number of keyword matches requested per search.
    pub search_count: usize,
    /// Maximum messages fetched per thread.
    pub reply_limit: usize,
    /// Restrict searches to this channel name (with or without `#`).
    pub scope_channel: Option<String>,
    /// Workspace base URL used to build permalinks.
    pub workspace_url: Option<String>,
}

impl Default for ThreadFinderConfig {
    fn default() -> Self {
        Self {
            search_count: 10,
            reply_limit: 100,
            scope_channel: None,
            workspace_url: None,
        }
    }
}

/// Finds thread context for a keyword. Disabled when no search backend is
/// configured, in which case it returns nothing and makes no calls.
pub struct ThreadFinder {
    search: Option<Arc<dyn ThreadSearch>>,
    config: ThreadFinderConfig,
}

impl ThreadFinder {
    pub fn new(search: Arc<dyn ThreadSearch>, config: ThreadFinderConfig) -> Self {
        Self {
            search: Some(search),
            config,
        }
    }

    /// A finder for deployments without messaging credentials.
    pub fn disabled() -> Self {
        Self {
            search: None,
            config: ThreadFinderConfig::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.search.is_some()
    }

    /// Search within the configured scope channel.
    pub async fn find(&self, keyword: &str) -> Result<Vec<ThreadMessage>> {
        self.find_in(keyword, self.config.scope_channel.as_deref())
            .await
    }

    /// Search, optionally restricted to `scope_channel`.
    pub async fn find_in(
        &self,
        keyword: &str,
        scope_channel: Option<&str>,
    ) -> Result<Vec<ThreadMessage>> {
        let Some(search) = &self.search else {
            return Ok(Vec::new());
        };

        let query = match scope_channel {
            Some(channel) if !channel.trim_start_matches('#').is_empty() => {
                format!("in:#{} {}", channel.trim_start_matches('#'), keyword)
            }
            _ => keyword.to_string(),
        };

        let matches = search
            .search_messages(&query, self.config.search_count)
            .await?;

        // Dedup set is local to this call: one candidate, one evaluation.
        let mut visited: HashSet<(String, String)> = HashSet::new();
        let mut collected: Vec<(String, ChannelMessage)> = Vec::new();

        for hit in matches {
            let Some(message) = search.message_at(&hit.channel, &hit.ts).await? else {
                debug!(channel = %hit.channel, ts = %hit.ts, "search hit no longer exists");
                continue;
            };
            let root = message.root_ts().to_string();
            if !visited.insert((hit.channel.clone(), root.clone())) {
                continue;
            }
            let replies = search
                .replies(&hit.channel, &root, self.config.reply_limit)
                .await?;
            collected.extend(replies.into_iter().map(|m| (hit.channel.clone(), m)));
        }

        let (names, groups) = futures::join!(
            resolve_names(search.as_ref(), &collected),
            resolve_groups(search.as_ref(), &collected)
        );

        Ok(collected
            .into_iter()
            .map(|(channel, message)| ThreadMessage {
                channel,
                author: names
                    .get(&message.user)
                    .cloned()
                    .unwrap_or_else(|| message.user.clone()),
                text: sanitize(
                    &message.text,
                    |id| names.get(id).cloned(),
                    |id| groups.get(id).cloned(),
                ),
                ts: message.ts,
            })
            .collect())
    }

    /// Permalink of `message`, when a workspace URL is configured.
    pub fn permalink(&self, message: &ThreadMessage) -> Option<String> {
        self.config
            .workspace_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .map(|url| message.permalink(url))
    }
}

/// Display names for every author and every user mentioned in the messages.
async fn resolve_names(
    search: &dyn ThreadSearch,
    messages: &[(String, ChannelMessage)],
) -> HashMap<String, String> {
    let mut ids: Vec<String> = Vec::new();
    for (_, message) in messages {
        let candidates = std::iter::once(message.user.clone())
            .chain(referenced_user_ids(&message.text));
        for id in candidates {
            if !id.is_empty() && !ids.contains(&id) {
                ids.push(id);
            }
        }
    }

    let lookups = ids.into_iter().map(|id| async move {
        let name = search.display_name(&id).await;
        (id, name)
    });

    join_all(lookups)
        .await
        .into_iter()
        .filter_map(|(id, name)| name.map(|n| (id, n)))
        .collect()
}

/// Names of user groups mentioned without a label.
async fn resolve_groups(
    search: &dyn ThreadSearch,
    messages: &[(String, ChannelMessage)],
) -> HashMap<String, String> {
    let mut ids: Vec<String> = Vec::new();
    for (_, message) in messages {
        for id in referenced_group_ids(&message.text) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }

    let lookups = ids.into_iter().map(|id| async move {
        let name = search.group_name(&id).await;
        (id, name)
    });

    join_all(lookups)
        .await
        .into_iter()
        .filter_map(|(id, name)| name.map(|n| (id, n)))
        .collect()
}
