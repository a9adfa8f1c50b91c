//! OpenAI / Azure OpenAI chat completions.
//!
//! Provides similarity scoring, tracker query generation and summaries. The
//! first two ask for a `json_object` response and decode a single field.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use jipcy_core::{
    EvaluationResult, JipcyError, QueryGenerator, SimilarityOracle, Summarizer,
};

use crate::config::{OpenAiBackend, OpenAiConfig};
use crate::error::ClientError;
use crate::Result;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    /// Ignored by Azure, which routes by deployment.
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SimilarityReply {
    similarity: f64,
}

#[derive(Debug, Deserialize)]
struct QueryReply {
    search_query: String,
}

/// Decode a similarity reply. Non-finite or out-of-range values are
/// rejected.
pub fn parse_similarity(content: &str) -> Result<f64> {
    let reply: SimilarityReply = serde_json::from_str(content)?;
    if !reply.similarity.is_finite() || !(0.0..=1.0).contains(&reply.similarity) {
        return Err(ClientError::UnexpectedResponse(format!(
            "similarity {} outside [0, 1]",
            reply.similarity
        )));
    }
    Ok(reply.similarity)
}

/// Decode a query-generation reply.
pub fn parse_search_query(content: &str) -> Result<String> {
    let reply: QueryReply = serde_json::from_str(content)?;
    let query = reply.search_query.trim();
    if query.is_empty() {
        return Err(ClientError::UnexpectedResponse(
            "empty search_query".to_string(),
        ));
    }
    Ok(query.to_string())
}

fn similarity_prompt(query: &str, content: &str, thread: &str) -> String {
    format!(
        "## Task\n\
         How similar is the past Jira issue below to the issue I am about to file?\n\
         Answer with a JSON object whose `similarity` field is a number between 0 and 1.\n\n\
         ## Issue I want to file\n{}\n\
         ## Past issue\n{}\n\n\
         ## Related Slack threads\n{}",
        query, content, thread
    )
}

fn query_prompt(
    text: &str,
    last_error: Option<&str>,
    project_key: Option<&str>,
    hints: Option<&str>,
) -> String {
    format!(
        "## Task\n\
         Write a Jira JQL query that finds issues related to the request below.\n\
         The project key is: {}\n\
         Use search terms only and no other options, so that results are stable.\n\
         Avoid overly specific queries and use AND sparingly; prefer more results over fewer.\n\
         Alphanumeric tokens such as G0239422 are likely error codes; \
         use them as standalone keywords.\n\
         {}\n\
         Return the query in the `search_query` field of a JSON object.\n\n\
         Last error (may be empty): {}\n\n\
         ## Request\n{}",
        project_key.unwrap_or(""),
        hints.unwrap_or(""),
        last_error.unwrap_or(""),
        text
    )
}

fn summary_prompt(content: &str, thread: &str) -> String {
    format!(
        "## Task\n\
         Summarise the Jira issue below and how it was resolved \
         (usually described in the comments).\n\
         The summary is used to decide whether a new issue needs to be filed, so keep it short and \
         focused on what makes it similar or not.\n\
         If the issue is still unresolved, say so. If something is unclear, say it is unclear.\n\n\
         ## Format\n\
         - Overview of the issue, about 300 characters\n\
         - Resolution, about 300 characters\n\n\
         ## Past issue\n{}\n\n\
         ## Related Slack threads\n{}",
        content, thread
    )
}

/// Chat completions client
pub struct OpenAiClient {
    config: OpenAiConfig,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("jipcy/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(OpenAiClient { config, http })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(OpenAiConfig::from_env()?)
    }

    fn completions_url(&self) -> String {
        match &self.config.backend {
            OpenAiBackend::OpenAi { base_url, .. } => {
                format!("{}/chat/completions", base_url.trim_end_matches('/'))
            }
            OpenAiBackend::Azure {
                endpoint,
                api_version,
                ..
            } => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint.trim_end_matches('/'),
                self.config.model,
                api_version
            ),
        }
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        match &self.config.backend {
            OpenAiBackend::OpenAi { api_key, .. } => {
                let value = HeaderValue::from_str(&format!("Bearer {}", api_key))
                    .map_err(|e| ClientError::Http(e.to_string()))?;
                headers.insert(AUTHORIZATION, value);
            }
            OpenAiBackend::Azure { api_key, .. } => {
                let value =
                    HeaderValue::from_str(api_key).map_err(|e| ClientError::Http(e.to_string()))?;
                headers.insert("api-key", value);
            }
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Send a single user message and return the reply text.
    pub async fn complete(&self, prompt: &str, json_object: bool) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            response_format: json_object.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        debug!(model = %self.config.model, json_object, "chat completion request");

        let response = self
            .http
            .post(self.completions_url())
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                service: "OpenAI",
                status: status.as_u16(),
                body,
            });
        }

        let reply: ChatResponse = response.json().await?;
        reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ClientError::UnexpectedResponse("no choices in reply".to_string()))
    }
}

#[async_trait]
impl SimilarityOracle for OpenAiClient {
    async fn score(&self, query: &str, content: &str, thread: &str) -> jipcy_core::Result<f64> {
        let reply = self
            .complete(&similarity_prompt(query, content, thread), true)
            .await
            .map_err(|e| JipcyError::Scoring(e.to_string()))?;
        parse_similarity(&reply).map_err(|e| JipcyError::Scoring(e.to_string()))
    }
}

#[async_trait]
impl QueryGenerator for OpenAiClient {
    async fn generate_query(
        &self,
        text: &str,
        last_error: Option<&str>,
    ) -> jipcy_core::Result<String> {
        let prompt = query_prompt(
            text,
            last_error,
            self.config.project_key.as_deref(),
            self.config.search_hints.as_deref(),
        );
        let reply = self
            .complete(&prompt, true)
            .await
            .map_err(|e| JipcyError::QueryGeneration(e.to_string()))?;
        parse_search_query(&reply).map_err(|e| JipcyError::QueryGeneration(e.to_string()))
    }
}

#[async_trait]
impl Summarizer for OpenAiClient {
    async fn summarize(&self, result: &EvaluationResult) -> jipcy_core::Result<String> {
        self.complete(&summary_prompt(&result.content, &result.thread), false)
            .await
            .map_err(|e| JipcyError::Summary(e.to_string()))
    }
}
