//! # LLM Job Service
//!
//! Prompts go to an external service as jobs; the caller submits once and then
//! polls a bounded number of times with a fixed delay.

mod http;

pub use http::HttpJobService;

use log::debug;
use serde::Serialize;
use std::thread;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("job {job_id} still pending after {attempts} polls")]
    Timeout { job_id: String, attempts: u32 },

    #[error("job {job_id} failed: {message}")]
    Job { job_id: String, message: String },

    #[error("job service returned no job id")]
    MissingJobId,

    #[error("{0}")]
    RequestError(#[from] reqwest::Error),
}

/// A prompt submitted as one job.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct JobRequest {
    /// User message
    pub content: String,
    pub model: String,
    pub system_prompt: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum JobStatus {
    Pending,
    Done(String),
    Failed(String),
}

pub trait JobService {
    /// Queues a job and returns its id.
    fn submit(&self, request: &JobRequest) -> Result<String, LlmError>;

    fn poll(&self, job_id: &str) -> Result<JobStatus, LlmError>;
}

/// How often and how long to poll for a job result.
#[derive(Clone, Debug, PartialEq)]
pub struct PollPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: 60,
            interval: Duration::from_secs(2),
        }
    }
}

/// Polls until the job finishes, at most `policy.attempts` times.
///
/// Sleeps `policy.interval` between polls but not after the last one.
pub fn wait_for_result<J: JobService + ?Sized>(
    service: &J,
    job_id: &str,
    policy: &PollPolicy,
) -> Result<String, LlmError> {
    for attempt in 1..=policy.attempts {
        match service.poll(job_id)? {
            JobStatus::Done(result) => return Ok(result),
            JobStatus::Failed(message) => {
                return Err(LlmError::Job {
                    job_id: job_id.to_owned(),
                    message,
                })
            }
            JobStatus::Pending => {
                debug!("Job {job_id} pending ({attempt}/{})", policy.attempts);
                if attempt < policy.attempts {
                    thread::sleep(policy.interval);
                }
            }
        }
    }
    Err(LlmError::Timeout {
        job_id: job_id.to_owned(),
        attempts: policy.attempts,
    })
}

/// Submits a job and waits for its result.
pub fn run_job<J: JobService + ?Sized>(
    service: &J,
    request: &JobRequest,
    policy: &PollPolicy,
) -> Result<String, LlmError> {
    let job_id = service.submit(request)?;
    debug!("Submitted job {job_id} to model {}", request.model);
    wait_for_result(service, &job_id, policy)
}
