//! jipcy core library
//!
//! The candidate-evaluation pipeline: thread lookup, similarity scoring with
//! bounded retries, rate-limited progress notifications and deterministic
//! top-K selection under a fixed concurrency budget. Remote services are
//! reached only through the traits in [`collaborators`].

pub mod collaborators;
pub mod config;
pub mod domain;
pub mod evaluator;
pub mod fakes;
pub mod format;
pub mod mentions;
pub mod notify;
pub mod obs;
pub mod retry;
pub mod scheduler;
pub mod telemetry;
pub mod thread_finder;
pub mod triage;

pub use collaborators::{
    NotificationTransport, QueryGenerator, SimilarityOracle, Summarizer, ThreadSearch,
    TrackerSearch,
};
pub use config::PipelineConfig;
pub use domain::{
    Candidate, CandidateFailure, ChannelMessage, Comment, EvaluationOutcome, EvaluationResult,
    JipcyError, NotifyTarget, ProgressEvent, Result, SearchMatch, ThreadMessage,
};
pub use evaluator::{Evaluator, EvaluatorConfig};
pub use format::{format_candidate, render_thread};
pub use mentions::{sanitize, sanitize_plain};
pub use notify::{DeliveryStats, NotificationSink, Notifier, NotifyConfig};
pub use retry::{retry_with_policy, Attempt, Attempted, RetryError, RetryPolicy};
pub use scheduler::{select_top, RunContext, RunReport, Scheduler, SchedulerConfig};
pub use telemetry::{init_tracing, LogFormat};
pub use thread_finder::{ThreadFinder, ThreadFinderConfig};
pub use triage::{TriageReport, TriageService};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
