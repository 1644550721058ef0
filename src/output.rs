//! Result types for a completed run.

use crate::input::InputDocument;
use crate::remote::ContentId;
use crate::stages::SplitOutput;
use serde::Serialize;
use std::path::PathBuf;

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    /// Uploaded inputs, in merge order.
    pub documents: Vec<InputDocument>,
    pub stages: StageIds,
    /// Per-input outputs, in `documents` order.
    pub outputs: Vec<SplitOutput>,
    /// The redacted combined document.
    pub combined_path: PathBuf,
    pub stats: RunStats,
}

impl RunOutput {
    /// Paths of every file the run wrote, combined output last.
    pub fn written_paths(&self) -> Vec<&PathBuf> {
        self.outputs
            .iter()
            .filter_map(|o| o.path.as_ref())
            .chain(std::iter::once(&self.combined_path))
            .collect()
    }
}

/// Workfile produced by each stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageIds {
    pub merged: ContentId,
    pub searchable: ContentId,
    pub search_context: String,
    pub markup: ContentId,
    pub burned: ContentId,
    pub flattened: ContentId,
    pub final_document: ContentId,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub total_inputs: usize,
    pub total_pages: usize,
    pub entities: usize,
    pub marks: usize,
    /// Files written, including the combined output.
    pub files_written: usize,
    pub bytes_written: u64,
    pub elapsed_ms: u64,
}
