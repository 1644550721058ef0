//! Error types for the docredact library.
//!
//! Every failure in a redaction run is fatal: there is no partial-success
//! mode. A single [`RedactError`] is returned from the orchestrator and from
//! each stage, and the variant tells the caller which boundary failed:
//!
//! * **Remote content** - [`RedactError::UploadFailed`], [`RedactError::FetchFailed`]
//! * **Remote jobs** - [`RedactError::JobSubmitFailed`], [`RedactError::StatusCheckFailed`],
//!   [`RedactError::JobFailed`], [`RedactError::UnexpectedState`]
//! * **Local filesystem** - [`RedactError::IoFailed`], [`RedactError::NoInputs`],
//!   [`RedactError::OutputNameCollision`]
//! * **Run control** - [`RedactError::Cancelled`], [`RedactError::DeadlineExceeded`]

use crate::remote::JobKind;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// All errors returned by the docredact library.
#[derive(Debug, Error)]
pub enum RedactError {
    // ── Content store ─────────────────────────────────────────────────────
    /// Uploading a workfile to the service failed.
    #[error("Workfile upload failed (extension '{extension}'): {detail}")]
    UploadFailed { extension: String, detail: String },

    /// Reading workfile bytes, or a finished job's records, back from the
    /// service failed. `content_id` is the workfile id or the resource path.
    #[error("Retrieving '{content_id}' failed: {detail}")]
    FetchFailed { content_id: String, detail: String },

    // ── Remote jobs ───────────────────────────────────────────────────────
    /// The service refused to create the job.
    #[error("{kind} job creation failed: {detail}")]
    JobSubmitFailed { kind: JobKind, detail: String },

    /// A status poll returned a non-success response or never arrived.
    #[error("Checking status of {kind} job '{job_id}' failed: {detail}")]
    StatusCheckFailed {
        kind: JobKind,
        job_id: String,
        detail: String,
    },

    /// The service reported the job as failed.
    #[error("{kind} job failed: {detail}")]
    JobFailed { kind: JobKind, detail: String },

    /// The service reported a state outside the known set.
    ///
    /// This is a protocol mismatch and is never retried.
    #[error("{kind} job state unexpected: '{state}'")]
    UnexpectedState { kind: JobKind, state: String },

    /// A response body was missing a field the pipeline depends on.
    #[error("Malformed {context} response: {detail}")]
    MalformedResponse {
        context: &'static str,
        detail: String,
    },

    /// A typed request failed validation before it was sent.
    #[error("Invalid {context} request: {detail}")]
    InvalidRequest {
        context: &'static str,
        detail: String,
    },

    // ── Local filesystem ──────────────────────────────────────────────────
    /// Could not read an input or write an output.
    #[error("I/O error on '{path}': {source}")]
    IoFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input directory contained no files.
    #[error("You must have at least one file in '{dir}'")]
    NoInputs { dir: PathBuf },

    /// Two inputs would be written to the same output file.
    #[error("Inputs '{first}' and '{second}' would both be written to '{output}'")]
    OutputNameCollision {
        first: String,
        second: String,
        output: String,
    },

    // ── Run control ───────────────────────────────────────────────────────
    /// The run was cancelled before it completed.
    #[error("Redaction run cancelled")]
    Cancelled,

    /// The run's overall deadline elapsed.
    #[error("Redaction run exceeded its deadline of {budget:?}")]
    DeadlineExceeded { budget: Duration },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RedactError {
    /// True when the failure originated at the remote service rather than
    /// locally.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            RedactError::UploadFailed { .. }
                | RedactError::FetchFailed { .. }
                | RedactError::JobSubmitFailed { .. }
                | RedactError::StatusCheckFailed { .. }
                | RedactError::JobFailed { .. }
                | RedactError::UnexpectedState { .. }
                | RedactError::MalformedResponse { .. }
        )
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RedactError::IoFailed {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_state_names_kind_and_state() {
        let e = RedactError::UnexpectedState {
            kind: JobKind::SearchContextBuild,
            state: "paused".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("search context"), "got: {msg}");
        assert!(msg.contains("'paused'"), "got: {msg}");
    }

    #[test]
    fn job_failed_display() {
        let e = RedactError::JobFailed {
            kind: JobKind::Convert,
            detail: "ConversionFailed".into(),
        };
        assert_eq!(e.to_string(), "content conversion job failed: ConversionFailed");
    }

    #[test]
    fn remote_classification() {
        assert!(RedactError::FetchFailed {
            content_id: "x".into(),
            detail: "HTTP 404".into(),
        }
        .is_remote());
        assert!(!RedactError::Cancelled.is_remote());
        assert!(!RedactError::NoInputs {
            dir: PathBuf::from("input_files"),
        }
        .is_remote());
    }

    #[test]
    fn collision_display() {
        let e = RedactError::OutputNameCollision {
            first: "a.docx".into(),
            second: "a.pdf".into(),
            output: "a.pdf".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("a.docx") && msg.contains("a.pdf"), "got: {msg}");
    }
}
