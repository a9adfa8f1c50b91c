//! Domain models for jipcy.
//!
//! Canonical definitions for the pipeline entities:
//! - `Candidate`: Immutable tracker record under evaluation
//! - `ThreadMessage`: Discussion message attached to a candidate
//! - `EvaluationResult`: Per-candidate result slot
//! - `ProgressEvent`: Typed notification emitted by evaluators

pub mod candidate;
pub mod error;
pub mod evaluation;
pub mod progress;
pub mod thread;

pub use candidate::{Candidate, Comment};
pub use error::{JipcyError, Result};
pub use evaluation::{CandidateFailure, EvaluationOutcome, EvaluationResult};
pub use progress::{NotifyTarget, ProgressEvent};
pub use thread::{ChannelMessage, SearchMatch, ThreadMessage};
