//! Progress-callback trait for pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the run moves through its stages.
//!
//! # Why callbacks instead of channels?
//!
//! Callers can forward events to a terminal spinner, a log sink or a job
//! record without the library knowing how the host application reports
//! progress. The trait is `Send + Sync` because uploads and splits run
//! concurrently.
//!
//! # Example
//!
//! ```rust
//! use docredact::{PipelineConfig, PipelineProgressCallback, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct StageCounter {
//!     finished: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for StageCounter {
//!     fn on_stage_complete(&self, stage: Stage, content_id: &str) {
//!         self.finished.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{stage} → {content_id}");
//!     }
//! }
//!
//! let config = PipelineConfig::builder("http://localhost:3000")
//!     .progress_callback(Arc::new(StageCounter { finished: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// The steps of one run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Upload,
    Merge,
    Ocr,
    SearchContext,
    PiiDetection,
    Markup,
    Burn,
    Flatten,
    FinalOcr,
    Split,
    Combined,
}

impl Stage {
    pub const ALL: [Stage; 11] = [
        Stage::Upload,
        Stage::Merge,
        Stage::Ocr,
        Stage::SearchContext,
        Stage::PiiDetection,
        Stage::Markup,
        Stage::Burn,
        Stage::Flatten,
        Stage::FinalOcr,
        Stage::Split,
        Stage::Combined,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Upload => "upload",
            Stage::Merge => "merge",
            Stage::Ocr => "ocr",
            Stage::SearchContext => "search context",
            Stage::PiiDetection => "PII detection",
            Stage::Markup => "markup",
            Stage::Burn => "burn",
            Stage::Flatten => "flatten",
            Stage::FinalOcr => "final ocr",
            Stage::Split => "split",
            Stage::Combined => "combined output",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Called by the orchestrator as a run progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// `on_input_uploaded` and `on_output_written` are called from concurrent
/// tasks, in completion order. Protect shared mutable state accordingly.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once, after inputs are discovered and before any upload.
    fn on_run_start(&self, total_inputs: usize) {
        let _ = total_inputs;
    }

    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage finishes.
    ///
    /// # Arguments
    /// * `stage`      - the finished stage
    /// * `content_id` - the workfile it produced; empty for stages that
    ///   produce several (upload, split)
    fn on_stage_complete(&self, stage: Stage, content_id: &str) {
        let _ = (stage, content_id);
    }

    /// Called when one input is uploaded and its page count is known.
    ///
    /// # Arguments
    /// * `index`    - 0-based position in the input order
    /// * `filename` - input file name
    /// * `pages`    - discovered page count
    fn on_input_uploaded(&self, index: usize, filename: &str, pages: usize) {
        let _ = (index, filename, pages);
    }

    /// Called after a per-input output is written to disk.
    fn on_output_written(&self, index: usize, total: usize, path: &Path) {
        let _ = (index, total, path);
    }

    /// Called once after the combined output is written.
    fn on_run_complete(&self, outputs_written: usize) {
        let _ = outputs_written;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        stages: Mutex<Vec<Stage>>,
        uploads: AtomicUsize,
        written: AtomicUsize,
    }

    impl PipelineProgressCallback for TrackingCallback {
        fn on_stage_complete(&self, stage: Stage, _content_id: &str) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_input_uploaded(&self, _index: usize, _filename: &str, _pages: usize) {
            self.uploads.fetch_add(1, Ordering::SeqCst);
        }

        fn on_output_written(&self, _index: usize, _total: usize, _path: &Path) {
            self.written.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(2);
        cb.on_stage_start(Stage::Merge);
        cb.on_stage_complete(Stage::Merge, "wf-1");
        cb.on_input_uploaded(0, "a.pdf", 3);
        cb.on_output_written(0, 2, Path::new("out/a.pdf"));
        cb.on_run_complete(2);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_input_uploaded(0, "a.pdf", 3);
        tracker.on_input_uploaded(1, "b.docx", 2);
        tracker.on_stage_complete(Stage::Upload, "");
        tracker.on_stage_complete(Stage::Merge, "m");
        tracker.on_output_written(1, 2, Path::new("b.pdf"));

        assert_eq!(tracker.uploads.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.written.load(Ordering::SeqCst), 1);
        assert_eq!(*tracker.stages.lock().unwrap(), vec![Stage::Upload, Stage::Merge]);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_stage_start(Stage::Burn);
        cb.on_run_complete(0);
    }

    #[test]
    fn stages_display_in_order() {
        let names: Vec<String> = Stage::ALL.iter().map(|s| s.to_string()).collect();
        assert_eq!(names.first().map(String::as_str), Some("upload"));
        assert_eq!(names.last().map(String::as_str), Some("combined output"));
        assert_eq!(Stage::PiiDetection.to_string(), "PII detection");
    }
}
