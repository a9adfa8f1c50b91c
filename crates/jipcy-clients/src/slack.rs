//! Slack Web API client.
//!
//! One client per token: the user token drives search and history lookups
//! (`ThreadSearch`), the bot token drives `chat.postMessage`
//! (`NotificationTransport`).

use std::collections::HashMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use jipcy_core::{
    ChannelMessage, JipcyError, NotificationTransport, SearchMatch, ThreadSearch,
};

use crate::config::DEFAULT_SLACK_API_URL;
use crate::error::ClientError;
use crate::Result;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    messages: SearchMessages,
}

#[derive(Debug, Default, Deserialize)]
struct SearchMessages {
    #[serde(default)]
    matches: Vec<RawMatch>,
}

#[derive(Debug, Deserialize)]
struct RawMatch {
    channel: RawChannel,
    ts: String,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    messages: Vec<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    ts: String,
    thread_ts: Option<String>,
    user: Option<String>,
    bot_id: Option<String>,
    #[serde(default)]
    text: String,
}

impl From<RawMessage> for ChannelMessage {
    fn from(m: RawMessage) -> Self {
        ChannelMessage {
            ts: m.ts,
            thread_ts: m.thread_ts,
            user: m.user.or(m.bot_id).unwrap_or_default(),
            text: m.text,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UsersResponse {
    #[serde(default)]
    members: Vec<SlackUser>,
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Deserialize)]
struct SlackUser {
    id: String,
    #[serde(default)]
    name: String,
    real_name: Option<String>,
    profile: Option<SlackProfile>,
}

#[derive(Debug, Deserialize)]
struct SlackProfile {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserGroupsResponse {
    #[serde(default)]
    usergroups: Vec<SlackUserGroup>,
}

#[derive(Debug, Deserialize)]
struct SlackUserGroup {
    id: String,
    #[serde(default)]
    handle: String,
    #[serde(default)]
    name: String,
}

/// Handle, then name. `None` when both are empty.
fn group_label(group: &SlackUserGroup) -> Option<String> {
    [&group.handle, &group.name]
        .into_iter()
        .find(|label| !label.is_empty())
        .cloned()
}

/// Display name, then real name, then handle.
fn preferred_name(user: &SlackUser) -> String {
    let display = user
        .profile
        .as_ref()
        .and_then(|p| p.display_name.as_deref())
        .filter(|n| !n.is_empty());
    let real = user.real_name.as_deref().filter(|n| !n.is_empty());
    display.or(real).unwrap_or(&user.name).to_string()
}

/// Unwrap a Slack envelope: `ok: false` becomes [`ClientError::Slack`].
fn unwrap_envelope<T: DeserializeOwned>(method: &str, value: Value) -> Result<T> {
    if value.get("ok").and_then(Value::as_bool) != Some(true) {
        let error = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error");
        return Err(ClientError::Slack {
            method: method.to_string(),
            error: error.to_string(),
        });
    }
    Ok(serde_json::from_value(value)?)
}

/// Slack Web API client bound to one token
pub struct SlackClient {
    http: reqwest::Client,
    token: String,
    api_url: String,
    users: RwLock<Option<HashMap<String, String>>>,
    groups: RwLock<Option<HashMap<String, String>>>,
}

impl SlackClient {
    pub fn new(token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("jipcy/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(SlackClient {
            http,
            token: token.to_string(),
            api_url: DEFAULT_SLACK_API_URL.to_string(),
            users: RwLock::new(None),
            groups: RwLock::new(None),
        })
    }

    pub fn with_api_url(mut self, url: &str) -> Self {
        self.api_url = url.trim_end_matches('/').to_string();
        self
    }

    async fn get<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .http
            .get(format!("{}/{}", self.api_url, method))
            .bearer_auth(&self.token)
            .query(params)
            .send()
            .await?;
        self.decode(method, response).await
    }

    async fn post_json<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T> {
        let response = self
            .http
            .post(format!("{}/{}", self.api_url, method))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        self.decode(method, response).await
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        method: &str,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                service: "Slack",
                status: status.as_u16(),
                body,
            });
        }
        let value: Value = response.json().await?;
        unwrap_envelope(method, value)
    }

    /// `search.messages`, oldest first.
    pub async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchMatch>> {
        let response: SearchResponse = self
            .get(
                "search.messages",
                &[
                    ("query", query.to_string()),
                    ("count", count.to_string()),
                    ("sort", "timestamp".to_string()),
                    ("sort_dir", "asc".to_string()),
                ],
            )
            .await?;
        Ok(response
            .messages
            .matches
            .into_iter()
            .map(|m| SearchMatch {
                channel: m.channel.id,
                ts: m.ts,
            })
            .collect())
    }

    /// The single message at `ts`.
    pub async fn history_at(&self, channel: &str, ts: &str) -> Result<Option<ChannelMessage>> {
        let response: MessagesResponse = self
            .get(
                "conversations.history",
                &[
                    ("channel", channel.to_string()),
                    ("latest", ts.to_string()),
                    ("oldest", ts.to_string()),
                    ("inclusive", "true".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(response.messages.into_iter().next().map(ChannelMessage::from))
    }

    /// Messages of the thread rooted at `root_ts`, root included.
    pub async fn thread(
        &self,
        channel: &str,
        root_ts: &str,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>> {
        let response: MessagesResponse = self
            .get(
                "conversations.replies",
                &[
                    ("channel", channel.to_string()),
                    ("ts", root_ts.to_string()),
                    ("inclusive", "true".to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(response
            .messages
            .into_iter()
            .map(ChannelMessage::from)
            .collect())
    }

    /// `chat.postMessage` with link-name expansion disabled.
    pub async fn post_message(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        text: &str,
    ) -> Result<()> {
        let mut body = json!({
            "channel": channel,
            "text": text,
            "link_names": false,
        });
        if let Some(ts) = thread_ts {
            body["thread_ts"] = json!(ts);
        }
        let _: Value = self.post_json("chat.postMessage", &body).await?;
        Ok(())
    }

    /// All workspace users keyed by id, fetched once per client.
    async fn user_directory(&self) -> Result<HashMap<String, String>> {
        if let Some(users) = self.users.read().await.as_ref() {
            return Ok(users.clone());
        }

        let mut guard = self.users.write().await;
        if let Some(users) = guard.as_ref() {
            return Ok(users.clone());
        }

        let mut users = HashMap::new();
        let mut cursor = String::new();
        loop {
            let mut params = vec![("limit", "200".to_string())];
            if !cursor.is_empty() {
                params.push(("cursor", cursor.clone()));
            }
            let page: UsersResponse = self.get("users.list", &params).await?;
            for user in &page.members {
                users.insert(user.id.clone(), preferred_name(user));
            }
            cursor = page
                .response_metadata
                .map(|m| m.next_cursor)
                .unwrap_or_default();
            if cursor.is_empty() {
                break;
            }
        }
        debug!(users = users.len(), "cached Slack user directory");

        *guard = Some(users.clone());
        Ok(users)
    }

    /// All user groups keyed by id, fetched once per client.
    async fn group_directory(&self) -> Result<HashMap<String, String>> {
        if let Some(groups) = self.groups.read().await.as_ref() {
            return Ok(groups.clone());
        }

        let mut guard = self.groups.write().await;
        if let Some(groups) = guard.as_ref() {
            return Ok(groups.clone());
        }

        let response: UserGroupsResponse = self.get("usergroups.list", &[]).await?;
        let groups: HashMap<String, String> = response
            .usergroups
            .iter()
            .filter_map(|g| group_label(g).map(|label| (g.id.clone(), label)))
            .collect();
        debug!(groups = groups.len(), "cached Slack user group directory");

        *guard = Some(groups.clone());
        Ok(groups)
    }
}

#[async_trait]
impl ThreadSearch for SlackClient {
    async fn search_messages(
        &self,
        query: &str,
        count: usize,
    ) -> jipcy_core::Result<Vec<SearchMatch>> {
        self.search(query, count)
            .await
            .map_err(|e| JipcyError::ThreadSearch(e.to_string()))
    }

    async fn message_at(
        &self,
        channel: &str,
        ts: &str,
    ) -> jipcy_core::Result<Option<ChannelMessage>> {
        self.history_at(channel, ts)
            .await
            .map_err(|e| JipcyError::ThreadSearch(e.to_string()))
    }

    async fn replies(
        &self,
        channel: &str,
        root_ts: &str,
        limit: usize,
    ) -> jipcy_core::Result<Vec<ChannelMessage>> {
        self.thread(channel, root_ts, limit)
            .await
            .map_err(|e| JipcyError::ThreadSearch(e.to_string()))
    }

    async fn display_name(&self, user_id: &str) -> Option<String> {
        match self.user_directory().await {
            Ok(users) => users.get(user_id).cloned(),
            Err(err) => {
                warn!(error = %err, "failed to load Slack user directory");
                None
            }
        }
    }

    async fn group_name(&self, group_id: &str) -> Option<String> {
        match self.group_directory().await {
            Ok(groups) => groups.get(group_id).cloned(),
            Err(err) => {
                warn!(error = %err, "failed to load Slack user group directory");
                None
            }
        }
    }
}

#[async_trait]
impl NotificationTransport for SlackClient {
    async fn post(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        text: &str,
    ) -> jipcy_core::Result<()> {
        self.post_message(channel, thread_ts, text)
            .await
            .map_err(|e| JipcyError::Notification(e.to_string()))
    }
}
