//! Collaborator configuration read from the environment.

use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::Result;

pub const DEFAULT_AZURE_API_VERSION: &str = "2025-01-01-preview";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_SLACK_API_URL: &str = "https://slack.com/api";

fn non_empty<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, name: &'static str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, name).ok_or(ClientError::MissingEnv(name))
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Jira configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraConfig {
    /// Site URL, e.g. `https://example.atlassian.net`
    pub endpoint: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub api_token: String,
    /// Project key the generated queries are scoped to
    pub project_key: Option<String>,
    /// Extra instructions appended to the query-generation prompt
    pub search_hints: Option<String>,
    pub max_results: u32,
}

impl JiraConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(JiraConfig {
            endpoint: required(&lookup, "JIRA_ENDPOINT")?,
            username: required(&lookup, "JIRA_USERNAME")?,
            api_token: required(&lookup, "JIRA_API_TOKEN")?,
            project_key: non_empty(&lookup, "JIRA_PROJECT_KEY"),
            search_hints: non_empty(&lookup, "JIRA_SEARCH_QUERY"),
            max_results: 30,
        })
    }

    /// Browse URL of an issue key
    pub fn browse_url(&self, key: &str) -> String {
        format!("{}/browse/{}", self.endpoint.trim_end_matches('/'), key)
    }
}

/// Slack configuration. Every field is optional: without a user token
/// thread search is disabled, without a bot token notifications are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlackConfig {
    #[serde(skip_serializing)]
    pub user_token: Option<String>,
    #[serde(skip_serializing)]
    pub bot_token: Option<String>,
    /// Channel searches are restricted to, with or without `#`
    pub channel: Option<String>,
    /// Workspace URL used for permalinks
    pub workspace_url: Option<String>,
    pub api_url: String,
}

impl SlackConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(env)
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        SlackConfig {
            user_token: non_empty(&lookup, "SLACK_USER_TOKEN"),
            bot_token: non_empty(&lookup, "SLACK_BOT_TOKEN"),
            channel: non_empty(&lookup, "SLACK_CHANNEL")
                .map(|c| c.trim_start_matches('#').to_string()),
            workspace_url: non_empty(&lookup, "SLACK_WORKSPACE_URL"),
            api_url: DEFAULT_SLACK_API_URL.to_string(),
        }
    }
}

/// Where chat completions are served from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OpenAiBackend {
    OpenAi {
        base_url: String,
        #[serde(skip_serializing)]
        api_key: String,
    },
    Azure {
        endpoint: String,
        api_version: String,
        #[serde(skip_serializing)]
        api_key: String,
    },
}

/// OpenAI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub backend: OpenAiBackend,
    /// Model name; the deployment name on Azure
    pub model: String,
    /// Forwarded to the query-generation prompt
    pub project_key: Option<String>,
    pub search_hints: Option<String>,
}

impl OpenAiConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env)
    }

    /// `AZURE_OPENAI_ENDPOINT` selects Azure; otherwise `OPENAI_API_KEY` is
    /// required.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match non_empty(&lookup, "AZURE_OPENAI_ENDPOINT") {
            Some(endpoint) => OpenAiBackend::Azure {
                endpoint,
                api_version: non_empty(&lookup, "AZURE_OPENAI_API_VERSION")
                    .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
                api_key: required(&lookup, "AZURE_OPENAI_KEY")?,
            },
            None => OpenAiBackend::OpenAi {
                base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
                api_key: required(&lookup, "OPENAI_API_KEY")?,
            },
        };

        Ok(OpenAiConfig {
            backend,
            model: required(&lookup, "OPENAI_MODEL")?,
            project_key: non_empty(&lookup, "JIRA_PROJECT_KEY"),
            search_hints: non_empty(&lookup, "JIRA_SEARCH_QUERY"),
        })
    }
}
