//! Test-only evaluation backend.
//!
//! [`RecordingBackend`] records the latest submitted request, replays a
//! scripted status sequence from `poll`, and serves canned payloads from
//! `fetch`, so integration tests can assert on the exact wire request a
//! graph produces and on how results bind back to typed values.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use qugraph::backend::{EvaluationBackend, JobHandle, JobPoll, JobStatus, ResultPayload};
use qugraph::error::EvaluationError;
use qugraph::graph::EvaluationRequest;
use serde_json::Value as Json;

#[derive(Default)]
struct State {
    last_request: Option<EvaluationRequest>,
    submitted: usize,
    statuses: VecDeque<JobStatus>,
    payload: ResultPayload,
    cancelled: Vec<JobHandle>,
}

/// Evaluation backend that records requests and replays canned results.
#[derive(Default)]
pub struct RecordingBackend {
    state: Mutex<State>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        RecordingBackend::default()
    }

    /// Scripts the statuses returned by successive polls; once the
    /// script is exhausted, every poll reports success.
    pub fn with_statuses(statuses: impl IntoIterator<Item = JobStatus>) -> Self {
        let backend = RecordingBackend::default();
        backend.lock().statuses = statuses.into_iter().collect();
        backend
    }

    /// Registers a fetched entry `{"value": value}` under `name`.
    pub fn insert_output(&self, name: &str, value: Json) {
        self.lock()
            .payload
            .insert(name.to_owned(), serde_json::json!({ "value": value }));
    }

    pub fn recorded_request(&self) -> Option<EvaluationRequest> {
        self.lock().last_request.clone()
    }

    pub fn recorded_request_or_panic(&self) -> EvaluationRequest {
        self.recorded_request()
            .expect("backend should record a submitted request")
    }

    pub fn submission_count(&self) -> usize {
        self.lock().submitted
    }

    pub fn cancelled_handles(&self) -> Vec<JobHandle> {
        self.lock().cancelled.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("backend mutex poisoned")
    }
}

impl EvaluationBackend for RecordingBackend {
    fn submit(&self, request: &EvaluationRequest) -> Result<JobHandle, EvaluationError> {
        let mut state = self.lock();
        state.submitted += 1;
        state.last_request = Some(request.clone());
        Ok(JobHandle(format!("job-{}", state.submitted)))
    }

    fn poll(
        &self,
        handles: &[JobHandle],
        _deadline: Duration,
    ) -> Result<Vec<JobPoll>, EvaluationError> {
        let mut state = self.lock();
        Ok(handles
            .iter()
            .map(|_| {
                let status = state.statuses.pop_front().unwrap_or(JobStatus::Success);
                JobPoll {
                    status,
                    progress: None,
                    error: (status == JobStatus::Failure)
                        .then(|| "scripted failure".to_owned()),
                }
            })
            .collect())
    }

    fn cancel(&self, handle: &JobHandle) -> Result<(), EvaluationError> {
        self.lock().cancelled.push(handle.clone());
        Ok(())
    }

    fn fetch(&self, _handle: &JobHandle) -> Result<ResultPayload, EvaluationError> {
        Ok(self.lock().payload.clone())
    }
}
