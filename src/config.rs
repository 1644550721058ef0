//! Configuration for a redaction run.
//!
//! All run behaviour is controlled through [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. The service endpoint is the only required
//! value; everything else has a default matching the service's usual
//! deployment.
//!
//! # Design choice: builder over constructor
//! Most callers change one or two knobs (an input directory, a deadline).
//! The builder lets them set only those and rely on documented defaults.

use crate::error::RedactError;
use crate::progress::ProgressCallback;
use crate::remote::ServiceEndpoint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_INPUT_DIR: &str = "input_files";
pub const DEFAULT_OUTPUT_DIR: &str = "output_files";
pub const DEFAULT_COMBINED_NAME: &str = "__combined.pdf";
pub const DEFAULT_OCR_LANGUAGE: &str = "english";

/// Configuration for one pipeline run.
///
/// # Example
/// ```rust
/// use docredact::PipelineConfig;
/// use std::time::Duration;
///
/// let config = PipelineConfig::builder("http://localhost:3000")
///     .input_dir("scans")
///     .deadline(Duration::from_secs(600))
///     .build()
///     .unwrap();
/// assert_eq!(config.endpoint.as_str(), "http://localhost:3000");
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Base address of the document-processing service.
    pub endpoint: ServiceEndpoint,

    /// Directory whose regular files are redacted. Default: `input_files`.
    pub input_dir: PathBuf,

    /// Directory receiving per-input outputs and the combined output.
    /// Created if missing. Default: `output_files`.
    pub output_dir: PathBuf,

    /// Wait between job status checks. Default: 1 s.
    pub poll_interval: Duration,

    /// Maximum in-flight requests during the upload and split fan-outs.
    /// Default: 8.
    pub concurrency: usize,

    /// Wall-clock budget for the whole run. Default: none.
    ///
    /// When it elapses every in-flight wait is cancelled and the run fails
    /// with [`RedactError::DeadlineExceeded`].
    pub deadline: Option<Duration>,

    /// Per-HTTP-request timeout. Default: 120 s.
    pub request_timeout: Duration,

    /// OCR language passed to both OCR conversions. Default: `english`.
    pub ocr_language: String,

    /// File name of the redacted combined document. Default: `__combined.pdf`.
    pub combined_name: String,

    /// Document the markup layer is burned onto. Default: [`BurnTarget::Merged`].
    pub burn_target: BurnTarget,

    pub progress: Option<ProgressCallback>,
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("endpoint", &self.endpoint)
            .field("input_dir", &self.input_dir)
            .field("output_dir", &self.output_dir)
            .field("poll_interval", &self.poll_interval)
            .field("concurrency", &self.concurrency)
            .field("deadline", &self.deadline)
            .field("request_timeout", &self.request_timeout)
            .field("ocr_language", &self.ocr_language)
            .field("combined_name", &self.combined_name)
            .field("burn_target", &self.burn_target)
            .field(
                "progress",
                &self.progress.as_ref().map(|_| "<dyn PipelineProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder targeting the service at `base_url`.
    pub fn builder(base_url: impl Into<String>) -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            base_url: base_url.into(),
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            poll_interval: Duration::from_secs(1),
            concurrency: 8,
            deadline: None,
            request_timeout: Duration::from_secs(120),
            ocr_language: DEFAULT_OCR_LANGUAGE.to_string(),
            combined_name: DEFAULT_COMBINED_NAME.to_string(),
            burn_target: BurnTarget::default(),
            progress: None,
        }
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    base_url: String,
    input_dir: PathBuf,
    output_dir: PathBuf,
    poll_interval: Duration,
    concurrency: usize,
    deadline: Option<Duration>,
    request_timeout: Duration,
    ocr_language: String,
    combined_name: String,
    burn_target: BurnTarget,
    progress: Option<ProgressCallback>,
}

impl fmt::Debug for PipelineConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfigBuilder")
            .field("base_url", &self.base_url)
            .field("input_dir", &self.input_dir)
            .field("output_dir", &self.output_dir)
            .finish_non_exhaustive()
    }
}

impl PipelineConfigBuilder {
    pub fn input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.input_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    pub fn deadline(mut self, budget: Duration) -> Self {
        self.deadline = Some(budget);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn ocr_language(mut self, language: impl Into<String>) -> Self {
        self.ocr_language = language.into();
        self
    }

    pub fn combined_name(mut self, name: impl Into<String>) -> Self {
        self.combined_name = name.into();
        self
    }

    pub fn burn_target(mut self, target: BurnTarget) -> Self {
        self.burn_target = target;
        self
    }

    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, RedactError> {
        let endpoint = ServiceEndpoint::new(&self.base_url)?;
        if self.concurrency == 0 {
            return Err(RedactError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(RedactError::InvalidConfig(
                "Poll interval must be greater than zero".into(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(RedactError::InvalidConfig(
                "Request timeout must be greater than zero".into(),
            ));
        }
        if self.ocr_language.trim().is_empty() {
            return Err(RedactError::InvalidConfig("OCR language is empty".into()));
        }
        let combined = self.combined_name.trim();
        if combined.is_empty() || combined.contains(['/', '\\']) {
            return Err(RedactError::InvalidConfig(format!(
                "Combined output name must be a plain file name, got '{}'",
                self.combined_name
            )));
        }

        Ok(PipelineConfig {
            endpoint,
            input_dir: self.input_dir,
            output_dir: self.output_dir,
            poll_interval: self.poll_interval,
            concurrency: self.concurrency,
            deadline: self.deadline,
            request_timeout: self.request_timeout,
            ocr_language: self.ocr_language,
            combined_name: self.combined_name,
            burn_target: self.burn_target,
            progress: self.progress,
        })
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which document the markup layer is burned onto.
///
/// | Target | Burned document |
/// |--------|-----------------|
/// | `Merged` | the merged TIFF produced before OCR (default) |
/// | `Searchable` | the OCR'd PDF the entities were detected on |
///
/// Both carry the same page geometry; the subsequent flatten and OCR steps
/// make the result identical in structure either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BurnTarget {
    #[default]
    Merged,
    Searchable,
}

impl std::str::FromStr for BurnTarget {
    type Err = RedactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "merged" => Ok(BurnTarget::Merged),
            "searchable" => Ok(BurnTarget::Searchable),
            other => Err(RedactError::InvalidConfig(format!(
                "Unknown burn target '{other}' (expected 'merged' or 'searchable')"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgressCallback;
    use std::sync::Arc;

    #[test]
    fn defaults() {
        let config = PipelineConfig::builder("http://localhost:3000/").build().unwrap();
        assert_eq!(config.endpoint.as_str(), "http://localhost:3000");
        assert_eq!(config.input_dir, PathBuf::from("input_files"));
        assert_eq!(config.output_dir, PathBuf::from("output_files"));
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.deadline, None);
        assert_eq!(config.ocr_language, "english");
        assert_eq!(config.combined_name, "__combined.pdf");
        assert_eq!(config.burn_target, BurnTarget::Merged);
        assert!(config.progress.is_none());
    }

    #[test]
    fn builder_overrides() {
        let config = PipelineConfig::builder("https://pd.example.com")
            .input_dir("in")
            .output_dir("out")
            .poll_interval(Duration::from_millis(250))
            .concurrency(2)
            .deadline(Duration::from_secs(30))
            .burn_target(BurnTarget::Searchable)
            .progress_callback(Arc::new(NoopProgressCallback))
            .build()
            .unwrap();
        assert_eq!(config.input_dir, PathBuf::from("in"));
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.deadline, Some(Duration::from_secs(30)));
        assert_eq!(config.burn_target, BurnTarget::Searchable);
        assert!(format!("{config:?}").contains("<dyn PipelineProgressCallback>"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad = [
            PipelineConfig::builder("").build(),
            PipelineConfig::builder("ftp://host").build(),
            PipelineConfig::builder("http://h").concurrency(0).build(),
            PipelineConfig::builder("http://h").poll_interval(Duration::ZERO).build(),
            PipelineConfig::builder("http://h").combined_name(" ").build(),
            PipelineConfig::builder("http://h").combined_name("a/b.pdf").build(),
            PipelineConfig::builder("http://h").ocr_language("").build(),
        ];
        for result in bad {
            assert!(matches!(result, Err(RedactError::InvalidConfig(_))));
        }
    }

    #[test]
    fn burn_target_parses() {
        assert_eq!("merged".parse::<BurnTarget>().unwrap(), BurnTarget::Merged);
        assert_eq!("Searchable".parse::<BurnTarget>().unwrap(), BurnTarget::Searchable);
        assert!("flattened".parse::<BurnTarget>().is_err());
    }
}
