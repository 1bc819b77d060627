//! The remote evaluation seam.
//!
//! The core never talks to a transport directly; it hands a serialized
//! [`EvaluationRequest`](crate::graph::EvaluationRequest) to an
//! [`EvaluationBackend`] and observes the job through polling. Transport,
//! authentication and retry policy all live behind this trait.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::EvaluationError;
use crate::graph::EvaluationRequest;

/// Opaque identity of a submitted evaluation. The caller retains it; the
/// core never persists handles between calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle(pub String);

/// Remote lifecycle of a submitted evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Failure,
    Revoked,
    /// A poll deadline elapsed before the backend answered; the handle
    /// remains valid.
    Unknown,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::Failure | JobStatus::Revoked
        )
    }
}

/// One poll observation for one handle.
#[derive(Debug, Clone, PartialEq)]
pub struct JobPoll {
    pub status: JobStatus,
    /// Completed fraction in `[0, 1]`, when the backend reports one.
    pub progress: Option<f64>,
    /// Remote failure message, set when `status` is `Failure`.
    pub error: Option<String>,
}

/// Raw result payload, keyed by output name.
pub type ResultPayload = serde_json::Map<String, Json>;

/// The abstract collaborator that executes evaluation requests.
///
/// `submit` is non-blocking, `poll` is the only suspension point and is
/// batchable over handles, and cancellation is best-effort: cancelling a
/// handle that already reached a terminal status is a no-op.
pub trait EvaluationBackend {
    fn submit(&self, request: &EvaluationRequest) -> Result<JobHandle, EvaluationError>;

    fn poll(
        &self,
        handles: &[JobHandle],
        deadline: Duration,
    ) -> Result<Vec<JobPoll>, EvaluationError>;

    fn cancel(&self, handle: &JobHandle) -> Result<(), EvaluationError>;

    fn fetch(&self, handle: &JobHandle) -> Result<ResultPayload, EvaluationError>;
}

/// Whether client-side progress indications are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    #[default]
    Verbose,
    Quiet,
}

/// Per-run configuration passed alongside a graph.
#[derive(Debug, Clone, Default)]
pub struct EvaluationOptions {
    /// Seed forwarded in the request for backend-side sampling.
    pub seed: Option<u64>,
    pub verbosity: Verbosity,
    /// Per-poll deadline; a library default applies when unset.
    pub poll_deadline: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::JobStatus;

    #[test]
    fn terminal_statuses() {
        assert!(JobStatus::Success.is_terminal());
        assert!(JobStatus::Failure.is_terminal());
        assert!(JobStatus::Revoked.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::Unknown.is_terminal());
    }

    #[test]
    fn statuses_use_screaming_snake_tags() {
        let tag = serde_json::to_string(&JobStatus::Success).unwrap();
        assert_eq!(tag, "\"SUCCESS\"");
        let parsed: JobStatus = serde_json::from_str("\"REVOKED\"").unwrap();
        assert_eq!(parsed, JobStatus::Revoked);
    }
}
