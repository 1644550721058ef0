//! Client side of the remote document-processing service.
//!
//! Two leaf components talk HTTP; every stage in [`crate::stages`] is built
//! on top of them:
//!
//! 1. [`content`] - upload and download workfiles (opaque binary content)
//! 2. [`jobs`]    - submit long-running jobs and poll them to a terminal state
//!
//! Both take a [`ServiceEndpoint`] and a shared `reqwest::Client` at
//! construction; neither reads process environment.

pub mod content;
pub mod jobs;

pub use content::{content_type_for_extension, ContentId, ContentStore};
pub use jobs::{JobHandle, JobKind, JobState, JobStatus, RemoteJobClient};

use crate::error::RedactError;
use std::fmt;
use std::time::Duration;

/// Base URL of the document-processing service.
///
/// Stored without a trailing slash so resource paths can be joined with a
/// single `/`.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    base: String,
}

impl ServiceEndpoint {
    /// Parse and validate a base URL.
    pub fn new(base: impl AsRef<str>) -> Result<Self, RedactError> {
        let trimmed = base.as_ref().trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(RedactError::InvalidConfig(
                "service base URL must not be empty".into(),
            ));
        }
        let parsed = reqwest::Url::parse(trimmed).map_err(|e| {
            RedactError::InvalidConfig(format!("service base URL '{trimmed}' is invalid: {e}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RedactError::InvalidConfig(format!(
                "service base URL must be http or https, got '{}'",
                parsed.scheme()
            )));
        }
        Ok(Self {
            base: trimmed.to_string(),
        })
    }

    /// Join a resource path onto the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    pub fn as_str(&self) -> &str {
        &self.base
    }
}

impl fmt::Debug for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ServiceEndpoint").field(&self.base).finish()
    }
}

impl fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)
    }
}

/// Build the HTTP client shared by every remote component of a run.
pub fn build_http_client(request_timeout: Duration) -> Result<reqwest::Client, RedactError> {
    reqwest::Client::builder()
        .timeout(request_timeout)
        .build()
        .map_err(|e| RedactError::Internal(format!("Failed to build HTTP client: {e}")))
}

/// Describe a non-success response as `HTTP <status>: <body>`.
///
/// The service reports errors as a JSON body; it is kept verbatim (and
/// shortened) so the operator sees the service's own error code.
pub(crate) async fn error_detail(response: reqwest::Response) -> String {
    const MAX_BODY: usize = 512;
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let body = body.trim();
    if body.is_empty() {
        format!("HTTP {status}")
    } else if body.len() > MAX_BODY {
        let cut = (0..=MAX_BODY)
            .rev()
            .find(|&i| body.is_char_boundary(i))
            .unwrap_or(0);
        format!("HTTP {status}: {}\u{2026}", &body[..cut])
    } else {
        format!("HTTP {status}: {body}")
    }
}
