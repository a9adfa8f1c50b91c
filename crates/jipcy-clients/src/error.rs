//! Error types for jipcy-clients

use thiserror::Error;

/// Errors that can occur talking to Jira, Slack or OpenAI
#[derive(Error, Debug)]
pub enum ClientError {
    /// Required environment variable is missing
    #[error("{0} is not set")]
    MissingEnv(&'static str),

    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-success HTTP status
    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// Slack envelope with `ok: false`
    #[error("Slack API error ({method}): {error}")]
    Slack { method: String, error: String },

    /// Response that parsed but does not carry what was asked for
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Http(err.to_string())
    }
}
