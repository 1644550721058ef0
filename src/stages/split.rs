//! Splitting the redacted combined document back into per-input files.
//!
//! ## Why the ranges are computed first
//!
//! Input `i` occupies the pages right after input `i-1` in the merged
//! document, so its range depends on every earlier page count. The ranges are
//! therefore computed sequentially over the fixed input order, and only then
//! are the extractions run concurrently. Each extraction writes into its own
//! input's slot, so completion order never affects which file gets which
//! pages.

use crate::error::RedactError;
use crate::input::InputDocument;
use crate::progress::ProgressCallback;
use crate::remote::{ContentId, ContentStore};
use crate::stages::convert::{ConversionRequest, ConversionStage, DestFormat};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A contiguous, 1-based, inclusive run of pages. May be empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRange {
    start: usize,
    len: usize,
}

impl PageRange {
    pub fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    /// Last page of the range. Equals `start - 1` when empty.
    pub fn end(&self) -> usize {
        (self.start + self.len).saturating_sub(1)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end())
    }
}

/// Cumulative ranges for documents of `page_counts` pages, in order:
/// `[1, p1], [p1+1, p1+p2], …`.
pub fn compute_page_ranges(page_counts: &[usize]) -> Vec<PageRange> {
    let mut next = 1;
    page_counts
        .iter()
        .map(|&pages| {
            let range = PageRange::new(next, pages);
            next += pages;
            range
        })
        .collect()
}

/// Result of splitting out one input.
#[derive(Debug, Clone, Serialize)]
pub struct SplitOutput {
    pub input: String,
    pub range: PageRange,
    /// `None` when the input had no pages and nothing was written.
    pub path: Option<PathBuf>,
    pub bytes: u64,
}

#[derive(Clone)]
pub struct SplitStage {
    conversion: ConversionStage,
    content: ContentStore,
    format: DestFormat,
    concurrency: usize,
    progress: Option<ProgressCallback>,
}

impl SplitStage {
    pub fn new(
        conversion: ConversionStage,
        content: ContentStore,
        format: DestFormat,
        concurrency: usize,
    ) -> Self {
        Self {
            conversion,
            content,
            format,
            concurrency: concurrency.max(1),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Extract each document's pages from `combined` into `output_dir`.
    ///
    /// The returned outputs are in `documents` order. The first failure
    /// aborts the group; files already written stay on disk.
    pub async fn split(
        &self,
        combined: &ContentId,
        documents: &[InputDocument],
        output_dir: &Path,
    ) -> Result<Vec<SplitOutput>, RedactError> {
        let counts: Vec<usize> = documents.iter().map(|d| d.page_count).collect();
        let ranges = compute_page_ranges(&counts);
        let total = documents.len();

        let mut slots: Vec<Option<SplitOutput>> = vec![None; total];
        let finished: Vec<(usize, SplitOutput)> =
            stream::iter(documents.iter().zip(ranges).enumerate().map(
                |(index, (doc, range))| async move {
                    let output = self.extract_one(combined, doc, range, output_dir).await?;
                    if let (Some(cb), Some(path)) = (&self.progress, &output.path) {
                        cb.on_output_written(index, total, path);
                    }
                    Ok::<_, RedactError>((index, output))
                },
            ))
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        for (index, output) in finished {
            slots[index] = Some(output);
        }
        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| {
                    RedactError::Internal(format!("split produced no result for input {index}"))
                })
            })
            .collect()
    }

    async fn extract_one(
        &self,
        combined: &ContentId,
        doc: &InputDocument,
        range: PageRange,
        output_dir: &Path,
    ) -> Result<SplitOutput, RedactError> {
        if range.is_empty() {
            warn!("{} has no pages; no output written", doc.filename);
            return Ok(SplitOutput {
                input: doc.filename.clone(),
                range,
                path: None,
                bytes: 0,
            });
        }

        let request = ConversionRequest::extract(combined, range, self.format)?;
        let extracted = self.conversion.convert(&request).await?;
        let path = output_dir.join(&doc.output_name);
        let bytes = self.content.fetch_to_file(&extracted, &path).await?;
        info!(
            "Wrote pages {} for {} to {}",
            range,
            doc.filename,
            path.display()
        );
        Ok(SplitOutput {
            input: doc.filename.clone(),
            range,
            path: Some(path),
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_are_cumulative() {
        let ranges = compute_page_ranges(&[3, 2]);
        assert_eq!(ranges, vec![PageRange::new(1, 3), PageRange::new(4, 2)]);
        assert_eq!(ranges[0].to_string(), "1-3");
        assert_eq!(ranges[1].to_string(), "4-5");
    }

    #[test]
    fn ranges_cover_total_without_gaps_or_overlaps() {
        let counts = [1, 7, 2, 10, 1, 4];
        let ranges = compute_page_ranges(&counts);
        let total: usize = counts.iter().sum();

        assert_eq!(ranges.first().unwrap().start(), 1);
        assert_eq!(ranges.last().unwrap().end(), total);
        for pair in ranges.windows(2) {
            assert_eq!(pair[1].start(), pair[0].end() + 1);
        }
        assert_eq!(ranges.iter().map(PageRange::len).sum::<usize>(), total);
    }

    #[test]
    fn empty_document_occupies_no_pages() {
        let ranges = compute_page_ranges(&[2, 0, 3]);
        assert!(ranges[1].is_empty());
        assert_eq!(ranges[1].start(), 3);
        assert_eq!(ranges[2], PageRange::new(3, 3));
        assert_eq!(ranges[2].to_string(), "3-5");
    }

    #[test]
    fn no_documents_no_ranges() {
        assert!(compute_page_ranges(&[]).is_empty());
    }
}
