//! Long-running remote jobs: submit, then poll to a terminal state.
//!
//! Every heavy operation on the service (conversion, search-context build,
//! PII detection, markup burn) is asynchronous on the server side. The client
//! submits `{ "input": … }` to the job's resource and receives an id, then
//! polls `GET {resource}/{id}` until the job leaves `pending`/`processing`.
//!
//! ## Polling state machine
//!
//! ```text
//!            ┌──────── wait poll_interval ◀───────┐
//!            ▼                                    │
//! submit ─▶ poll ──▶ pending | processing ────────┘
//!            │
//!            ├─────▶ complete  ─▶ Ok(output)
//!            ├─────▶ failed    ─▶ Err(JobFailed)
//!            └─────▶ <other>   ─▶ Err(UnexpectedState)   (no further polls)
//! ```
//!
//! The loop is unbounded in count. Every wait and every request races the
//! run's [`CancellationToken`], so an overall deadline stops polling promptly.
//! A poll that fails at the transport level is fatal for the job: the
//! service's own `state` field is the only retry signal.

use crate::error::RedactError;
use crate::remote::{error_detail, ServiceEndpoint};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// The kinds of long-running job the pipeline submits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Content conversion: merge, OCR, flatten, page extraction.
    Convert,
    /// Search-context (page index) build over a workfile.
    SearchContextBuild,
    /// PII detection over a search context.
    PiiDetect,
    /// Burning a markup layer onto a document.
    MarkupBurn,
}

impl JobKind {
    /// Resource path of this job kind, relative to the service base URL.
    pub fn resource(self) -> &'static str {
        match self {
            JobKind::Convert => "v2/contentConverters",
            JobKind::SearchContextBuild => "v2/searchContexts",
            JobKind::PiiDetect => "v2/piiDetectors",
            JobKind::MarkupBurn => "PCCIS/V1/MarkupBurner",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobKind::Convert => "content conversion",
            JobKind::SearchContextBuild => "search context",
            JobKind::PiiDetect => "PII detection",
            JobKind::MarkupBurn => "markup burn",
        })
    }
}

/// Lifecycle state reported by the service for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Processing,
    Complete,
    Failed,
}

impl JobState {
    /// Parse the wire value. Returns `None` for anything outside the known set.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobState::Pending),
            "processing" => Some(JobState::Processing),
            "complete" => Some(JobState::Complete),
            "failed" => Some(JobState::Failed),
            _ => None,
        }
    }
}

/// A submitted job. Handles are never reused across submissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub kind: JobKind,
    pub id: String,
}

/// One observation of a job's status.
#[derive(Debug, Clone)]
pub struct JobStatus {
    pub state: JobState,
    /// The job's `output` field, `Value::Null` when absent.
    pub output: Value,
    /// Error description assembled from `errorCode` / `errorDetails`.
    pub error: Option<String>,
}

#[derive(Serialize)]
struct Envelope<'a, R: ?Sized> {
    input: &'a R,
}

/// Conversions, detections and burns answer with `processId`; search
/// contexts answer with `contextId`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    #[serde(default)]
    process_id: Option<String>,
    #[serde(default)]
    context_id: Option<String>,
}

impl SubmitResponse {
    fn into_id(self) -> Option<String> {
        self.process_id.or(self.context_id)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    state: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_details: Option<Value>,
}

/// Submits jobs and waits for them to finish.
///
/// Cheap to clone: the HTTP client and the cancellation token are shared.
#[derive(Clone)]
pub struct RemoteJobClient {
    http: reqwest::Client,
    endpoint: ServiceEndpoint,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl RemoteJobClient {
    pub fn new(
        http: reqwest::Client,
        endpoint: ServiceEndpoint,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            http,
            endpoint,
            poll_interval,
            cancel,
        }
    }

    /// Create a job of `kind` from a typed request body.
    pub async fn submit<R>(&self, kind: JobKind, request: &R) -> Result<JobHandle, RedactError>
    where
        R: Serialize + ?Sized,
    {
        let url = self.endpoint.url(kind.resource());
        let send = async {
            let response = self
                .http
                .post(&url)
                .json(&Envelope { input: request })
                .send()
                .await
                .map_err(|e| RedactError::JobSubmitFailed {
                    kind,
                    detail: e.to_string(),
                })?;

            if !response.status().is_success() {
                return Err(RedactError::JobSubmitFailed {
                    kind,
                    detail: error_detail(response).await,
                });
            }

            let body: SubmitResponse =
                response
                    .json()
                    .await
                    .map_err(|e| RedactError::JobSubmitFailed {
                        kind,
                        detail: format!("unreadable submit response: {e}"),
                    })?;
            body.into_id().ok_or_else(|| RedactError::JobSubmitFailed {
                kind,
                detail: "submit response carried no processId or contextId".into(),
            })
        };

        let id = self.guarded(send).await?;
        debug!("Submitted {} job {}", kind, id);
        Ok(JobHandle { kind, id })
    }

    /// Read the current status of a job once.
    pub async fn status(&self, handle: &JobHandle) -> Result<JobStatus, RedactError> {
        let url = self
            .endpoint
            .url(&format!("{}/{}", handle.kind.resource(), handle.id));
        let status_failed = |detail: String| RedactError::StatusCheckFailed {
            kind: handle.kind,
            job_id: handle.id.clone(),
            detail,
        };

        let fetch = async {
            let response = self
                .http
                .get(&url)
                .send()
                .await
                .map_err(|e| status_failed(e.to_string()))?;
            if !response.status().is_success() {
                return Err(status_failed(error_detail(response).await));
            }
            response
                .json::<StatusBody>()
                .await
                .map_err(|e| status_failed(format!("unreadable status response: {e}")))
        };
        let body = self.guarded(fetch).await?;

        let Some(state) = JobState::parse(&body.state) else {
            return Err(RedactError::UnexpectedState {
                kind: handle.kind,
                state: body.state,
            });
        };

        let output = body.output.unwrap_or(Value::Null);
        let error = match state {
            JobState::Failed => Some(failure_detail(
                body.error_code.as_deref(),
                body.error_details.as_ref(),
                &output,
            )),
            _ => None,
        };
        Ok(JobStatus {
            state,
            output,
            error,
        })
    }

    /// Poll `handle` until it reaches a terminal state.
    ///
    /// Returns the job's `output` unchanged on `complete`.
    pub async fn await_completion(&self, handle: &JobHandle) -> Result<Value, RedactError> {
        let mut polls: u64 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(RedactError::Cancelled);
            }

            let status = self.status(handle).await?;
            polls += 1;
            debug!(
                "{} job {}: {:?} (poll {})",
                handle.kind, handle.id, status.state, polls
            );

            match status.state {
                JobState::Complete => {
                    info!("{} job {} complete after {} polls", handle.kind, handle.id, polls);
                    return Ok(status.output);
                }
                JobState::Failed => {
                    return Err(RedactError::JobFailed {
                        kind: handle.kind,
                        detail: status
                            .error
                            .unwrap_or_else(|| "no error detail reported".into()),
                    });
                }
                JobState::Pending | JobState::Processing => {}
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(RedactError::Cancelled),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Submit and wait: the common path for every remote stage.
    pub async fn run<R>(&self, kind: JobKind, request: &R) -> Result<(JobHandle, Value), RedactError>
    where
        R: Serialize + ?Sized,
    {
        let handle = self.submit(kind, request).await?;
        let output = self.await_completion(&handle).await?;
        Ok((handle, output))
    }

    /// GET a JSON document that belongs to a finished job
    /// (e.g. `searchContexts/{id}/records`).
    pub(crate) async fn read_json<T>(
        &self,
        path: &str,
        context: &'static str,
    ) -> Result<T, RedactError>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = self.endpoint.url(path);
        let read = async {
            let response = self.http.get(&url).send().await.map_err(|e| {
                RedactError::FetchFailed {
                    content_id: path.to_string(),
                    detail: e.to_string(),
                }
            })?;
            if !response.status().is_success() {
                return Err(RedactError::FetchFailed {
                    content_id: path.to_string(),
                    detail: error_detail(response).await,
                });
            }
            response
                .json::<T>()
                .await
                .map_err(|e| RedactError::MalformedResponse {
                    context,
                    detail: e.to_string(),
                })
        };
        self.guarded(read).await
    }

    async fn guarded<F, T>(&self, fut: F) -> Result<T, RedactError>
    where
        F: Future<Output = Result<T, RedactError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(RedactError::Cancelled),
            result = fut => result,
        }
    }
}

fn failure_detail(code: Option<&str>, details: Option<&Value>, output: &Value) -> String {
    match (code, details) {
        (Some(code), Some(details)) => format!("{code}: {details}"),
        (Some(code), None) => code.to_string(),
        (None, Some(details)) => details.to_string(),
        (None, None) if !output.is_null() => output.to_string(),
        (None, None) => "no error detail reported".to_string(),
    }
}
