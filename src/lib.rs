//! # docredact
//!
//! Redact personally identifiable information from a batch of documents
//! using a remote document-processing service.
//!
//! ## Why this crate?
//!
//! The service exposes every building block (conversion, OCR, search
//! contexts, PII detection, markup burning) as an independent long-running
//! job. Producing a redacted document takes ten of them in a precise order,
//! each consuming the previous one's workfile. This crate sequences those
//! jobs, polls each to completion, and writes the redacted results back to
//! disk, one file per input plus a combined document.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input_files/
//!  │
//!  ├─ 1. Upload   each input, concurrently, and count its pages
//!  ├─ 2. Merge    all inputs into one TIFF, in input order
//!  ├─ 3. OCR      → searchable PDF
//!  ├─ 4. Detect   search context + PII entities
//!  ├─ 5. Redact   entities → markup layer → burn → flatten → OCR
//!  └─ 6. Split    cumulative page ranges → one PDF per input + combined
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docredact::{PipelineConfig, PipelineOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder("http://localhost:3000")
//!         .input_dir("input_files")
//!         .output_dir("output_files")
//!         .build()?;
//!     let output = PipelineOrchestrator::new(config)?.run().await?;
//!     for path in output.written_paths() {
//!         println!("{}", path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docredact` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docredact = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod input;
pub mod orchestrator;
pub mod output;
pub mod progress;
pub mod remote;
pub mod stages;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{BurnTarget, PipelineConfig, PipelineConfigBuilder};
pub use error::RedactError;
pub use input::{InputDocument, InputFile};
pub use orchestrator::PipelineOrchestrator;
pub use output::{RunOutput, RunStats, StageIds};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback, Stage};
pub use remote::{ContentId, ContentStore, JobKind, JobState, RemoteJobClient, ServiceEndpoint};
pub use stages::{compute_page_ranges, PageRange};
