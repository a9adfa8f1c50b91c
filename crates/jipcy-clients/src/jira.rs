//! Jira Cloud REST v3 search.
//!
//! Issues are fetched through `rest/api/3/search/jql` with only the fields
//! the pipeline needs. Descriptions and comment bodies arrive as Atlassian
//! Document Format and are flattened to plain text here.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use jipcy_core::{Candidate, Comment, JipcyError, TrackerSearch};

use crate::config::JiraConfig;
use crate::error::ClientError;
use crate::Result;

const SEARCH_FIELDS: &str = "summary,description,comment";

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<Issue>,
}

#[derive(Debug, Deserialize)]
struct Issue {
    id: String,
    key: String,
    #[serde(default)]
    fields: Fields,
}

#[derive(Debug, Default, Deserialize)]
struct Fields {
    summary: Option<String>,
    description: Option<AdfNode>,
    comment: Option<CommentPage>,
}

#[derive(Debug, Default, Deserialize)]
struct CommentPage {
    #[serde(default)]
    comments: Vec<IssueComment>,
}

#[derive(Debug, Deserialize)]
struct IssueComment {
    body: Option<AdfNode>,
    #[serde(default)]
    created: String,
    author: Option<Author>,
}

#[derive(Debug, Deserialize)]
struct Author {
    #[serde(rename = "displayName", default)]
    display_name: String,
}

/// A node of an Atlassian Document Format tree.
#[derive(Debug, Default, Deserialize)]
struct AdfNode {
    text: Option<String>,
    #[serde(default)]
    content: Vec<AdfNode>,
}

/// Plain text of an ADF document: the text nodes of every top-level block,
/// joined with single spaces. Deeper nesting (lists, tables) is ignored.
fn adf_text(doc: &AdfNode) -> String {
    doc.content
        .iter()
        .flat_map(|block| block.content.iter())
        .filter_map(|inline| inline.text.as_deref())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn to_candidate(issue: Issue, config: &JiraConfig) -> Candidate {
    let fields = issue.fields;
    let comments = fields
        .comment
        .map(|page| page.comments)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|c| {
            let body = c.body.as_ref().map(adf_text).unwrap_or_default();
            if body.is_empty() {
                return None;
            }
            let author = c.author.map(|a| a.display_name).unwrap_or_default();
            Some(Comment::new(author, c.created, body))
        })
        .collect();

    Candidate {
        url: config.browse_url(&issue.key),
        id: issue.id,
        key: issue.key,
        title: fields.summary.unwrap_or_default(),
        description: fields.description.as_ref().map(adf_text).unwrap_or_default(),
        comments,
    }
}

/// Parse a `search/jql` response body into candidates.
pub fn parse_search_response(body: &str, config: &JiraConfig) -> Result<Vec<Candidate>> {
    let response: SearchResponse = serde_json::from_str(body)?;
    Ok(response
        .issues
        .into_iter()
        .map(|issue| to_candidate(issue, config))
        .collect())
}

/// Jira search client
pub struct JiraClient {
    config: JiraConfig,
    http: reqwest::Client,
}

impl JiraClient {
    pub fn new(config: JiraConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("jipcy/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(JiraClient { config, http })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(JiraConfig::from_env()?)
    }

    fn search_url(&self) -> String {
        format!(
            "{}/rest/api/3/search/jql",
            self.config.endpoint.trim_end_matches('/')
        )
    }

    /// Run `jql` and return at most `max_results` candidates. No hits is
    /// an empty list, not an error.
    pub async fn fetch_issues(&self, jql: &str) -> Result<Vec<Candidate>> {
        debug!(jql = %jql, "searching Jira");
        let response = self
            .http
            .get(self.search_url())
            .basic_auth(&self.config.username, Some(&self.config.api_token))
            .query(&[
                ("jql", jql.to_string()),
                ("fields", SEARCH_FIELDS.to_string()),
                ("maxResults", self.config.max_results.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                service: "Jira",
                status: status.as_u16(),
                body,
            });
        }

        let candidates = parse_search_response(&body, &self.config)?;
        info!(jql = %jql, found = candidates.len(), "Jira search finished");
        Ok(candidates)
    }
}

#[async_trait]
impl TrackerSearch for JiraClient {
    async fn search(&self, query: &str) -> jipcy_core::Result<Vec<Candidate>> {
        self.fetch_issues(query)
            .await
            .map_err(|e| JipcyError::Tracker(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JiraConfig {
        JiraConfig {
            endpoint: "https://example.atlassian.net/".to_string(),
            username: "bot".to_string(),
            api_token: "token".to_string(),
            project_key: Some("OPS".to_string()),
            search_hints: None,
            max_results: 30,
        }
    }

    const BODY: &str = r#"{
        "isLast": true,
        "issues": [{
            "id": "10001",
            "key": "OPS-1",
            "fields": {
                "summary": "Login fails with 500",
                "description": {
                    "type": "doc", "version": 1,
                    "content": [
                        {"type": "paragraph", "content": [
                            {"type": "text", "text": "Users see"},
                            {"type": "text", "text": "HTTP 500"}
                        ]},
                        {"type": "paragraph", "content": [
                            {"type": "text", "text": "since 10:00"}
                        ]}
                    ]
                },
                "comment": {
                    "comments": [
                        {
                            "author": {"displayName": "Alice"},
                            "created": "2024-01-01T10:00:00.000+0900",
                            "body": {"type": "doc", "content": [
                                {"type": "paragraph", "content": [{"type": "text", "text": "Restarted the pod"}]}
                            ]}
                        },
                        {
                            "author": {"displayName": "Bob"},
                            "created": "2024-01-01T11:00:00.000+0900",
                            "body": {"type": "doc", "content": [{"type": "rule"}]}
                        }
                    ],
                    "maxResults": 2, "startAt": 0, "total": 2
                }
            }
        }]
    }"#;

    #[test]
    fn test_parse_search_response() {
        let candidates = parse_search_response(BODY, &config()).unwrap();
        assert_eq!(candidates.len(), 1);

        let c = &candidates[0];
        assert_eq!(c.id, "10001");
        assert_eq!(c.key, "OPS-1");
        assert_eq!(c.title, "Login fails with 500");
        assert_eq!(c.description, "Users see HTTP 500 since 10:00");
        assert_eq!(c.url, "https://example.atlassian.net/browse/OPS-1");
        assert_eq!(c.comments.len(), 1, "empty comment bodies are dropped");
        assert_eq!(c.comments[0].author, "Alice");
        assert_eq!(c.comments[0].body, "Restarted the pod");
    }

    #[test]
    fn test_parse_handles_missing_fields() {
        let body = r#"{"issues": [{"id": "1", "key": "OPS-2", "fields": {"summary": null, "description": null}}]}"#;
        let candidates = parse_search_response(body, &config()).unwrap();
        assert_eq!(candidates[0].title, "");
        assert_eq!(candidates[0].description, "");
        assert!(candidates[0].comments.is_empty());
    }

    #[test]
    fn test_parse_empty_result() {
        assert!(parse_search_response(r#"{"issues": []}"#, &config())
            .unwrap()
            .is_empty());
        assert!(parse_search_response("{}", &config()).unwrap().is_empty());
    }

    #[test]
    fn test_search_url() {
        let client = JiraClient::new(config()).unwrap();
        assert_eq!(
            client.search_url(),
            "https://example.atlassian.net/rest/api/3/search/jql"
        );
    }
}
