//! jipcy-clients: remote collaborators for the jipcy pipeline
//!
//! HTTP implementations of the traits in `jipcy_core::collaborators`:
//!
//! - [`JiraClient`]: tracker search (`TrackerSearch`)
//! - [`SlackClient`]: thread search and progress posts (`ThreadSearch`,
//!   `NotificationTransport`)
//! - [`OpenAiClient`]: similarity, query generation and summaries
//!   (`SimilarityOracle`, `QueryGenerator`, `Summarizer`)

pub mod config;
pub mod error;
pub mod jira;
pub mod openai;
pub mod slack;

pub use config::{JiraConfig, OpenAiBackend, OpenAiConfig, SlackConfig};
pub use error::ClientError;
pub use jira::JiraClient;
pub use openai::OpenAiClient;
pub use slack::SlackClient;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
