//! Content conversion: one request shape, four uses.
//!
//! Merge, OCR, flatten and page extraction are all the same
//! `contentConverters` job with `{ sources[], dest }`; only the sources and
//! the `dest` options differ. [`ConversionRequest`] has one constructor per
//! use and [`ConversionStage::convert`] runs any of them.

use crate::error::RedactError;
use crate::remote::{ContentId, JobKind, RemoteJobClient};
use crate::stages::split::PageRange;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

/// Destination document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestFormat {
    Pdf,
    Tiff,
}

impl DestFormat {
    /// File extension for documents of this format.
    pub fn extension(self) -> &'static str {
        match self {
            DestFormat::Pdf => "pdf",
            DestFormat::Tiff => "tiff",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionSource {
    pub file_id: ContentId,
    /// Page range such as `"4-5"`; all pages when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrOptions {
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PdfOptions {
    pub ocr: OcrOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionDest {
    pub format: DestFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_options: Option<PdfOptions>,
}

/// Input of a `contentConverters` job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionRequest {
    sources: Vec<ConversionSource>,
    dest: ConversionDest,
}

impl ConversionRequest {
    /// Combine `sources`, in order, into one TIFF.
    pub fn merge(sources: &[ContentId]) -> Result<Self, RedactError> {
        if sources.is_empty() {
            return Err(RedactError::InvalidRequest {
                context: "merge",
                detail: "at least one source document is required".into(),
            });
        }
        Ok(Self {
            sources: sources
                .iter()
                .map(|id| ConversionSource {
                    file_id: id.clone(),
                    pages: None,
                })
                .collect(),
            dest: ConversionDest {
                format: DestFormat::Tiff,
                pdf_options: None,
            },
        })
    }

    /// OCR `source` into a searchable PDF.
    pub fn ocr(source: &ContentId, language: &str) -> Result<Self, RedactError> {
        let language = language.trim();
        if language.is_empty() {
            return Err(RedactError::InvalidRequest {
                context: "OCR",
                detail: "OCR language must not be empty".into(),
            });
        }
        Ok(Self {
            sources: vec![ConversionSource {
                file_id: source.clone(),
                pages: None,
            }],
            dest: ConversionDest {
                format: DestFormat::Pdf,
                pdf_options: Some(PdfOptions {
                    ocr: OcrOptions {
                        language: language.to_string(),
                    },
                }),
            },
        })
    }

    /// Rasterise `source` to TIFF so no text or vector content survives.
    pub fn flatten(source: &ContentId) -> Self {
        Self {
            sources: vec![ConversionSource {
                file_id: source.clone(),
                pages: None,
            }],
            dest: ConversionDest {
                format: DestFormat::Tiff,
                pdf_options: None,
            },
        }
    }

    /// Extract `range` of `source` into a document of `format`.
    pub fn extract(
        source: &ContentId,
        range: PageRange,
        format: DestFormat,
    ) -> Result<Self, RedactError> {
        if range.is_empty() {
            return Err(RedactError::InvalidRequest {
                context: "page extraction",
                detail: format!("page range starting at {} is empty", range.start()),
            });
        }
        Ok(Self {
            sources: vec![ConversionSource {
                file_id: source.clone(),
                pages: Some(range.to_string()),
            }],
            dest: ConversionDest {
                format,
                pdf_options: None,
            },
        })
    }

    pub fn sources(&self) -> &[ConversionSource] {
        &self.sources
    }

    pub fn dest(&self) -> &ConversionDest {
        &self.dest
    }
}

#[derive(Deserialize)]
struct ConversionOutput {
    #[serde(default)]
    results: Vec<ConversionResult>,
}

#[derive(Deserialize)]
struct ConversionResult {
    #[serde(rename = "fileId")]
    file_id: ContentId,
}

/// Runs `contentConverters` jobs.
#[derive(Clone)]
pub struct ConversionStage {
    jobs: RemoteJobClient,
}

impl ConversionStage {
    pub fn new(jobs: RemoteJobClient) -> Self {
        Self { jobs }
    }

    /// Run a conversion and return the first result's content id.
    pub async fn convert(&self, request: &ConversionRequest) -> Result<ContentId, RedactError> {
        let (handle, output) = self.jobs.run(JobKind::Convert, request).await?;
        let id = first_result(output)?;
        info!(
            "Converted {} source(s) to {} as {} (job {})",
            request.sources.len(),
            request.dest.format.extension(),
            id,
            handle.id
        );
        Ok(id)
    }
}

fn first_result(output: Value) -> Result<ContentId, RedactError> {
    let output: ConversionOutput =
        serde_json::from_value(output).map_err(|e| RedactError::MalformedResponse {
            context: "content conversion",
            detail: e.to_string(),
        })?;
    output
        .results
        .into_iter()
        .next()
        .map(|r| r.file_id)
        .ok_or_else(|| RedactError::MalformedResponse {
            context: "content conversion",
            detail: "output has no results".into(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(raw: &[&str]) -> Vec<ContentId> {
        raw.iter().map(|s| ContentId::from(*s)).collect()
    }

    #[test]
    fn merge_request_shape() {
        let req = ConversionRequest::merge(&ids(&["a", "b"])).unwrap();
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "sources": [{ "fileId": "a" }, { "fileId": "b" }],
                "dest": { "format": "tiff" }
            })
        );
    }

    #[test]
    fn merge_requires_a_source() {
        assert!(matches!(
            ConversionRequest::merge(&[]),
            Err(RedactError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn ocr_request_shape() {
        let req = ConversionRequest::ocr(&ContentId::from("m"), "english").unwrap();
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "sources": [{ "fileId": "m" }],
                "dest": { "format": "pdf", "pdfOptions": { "ocr": { "language": "english" } } }
            })
        );
        assert!(ConversionRequest::ocr(&ContentId::from("m"), " ").is_err());
    }

    #[test]
    fn extract_request_carries_page_range() {
        let req =
            ConversionRequest::extract(&ContentId::from("f"), PageRange::new(4, 2), DestFormat::Pdf)
                .unwrap();
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "sources": [{ "fileId": "f", "pages": "4-5" }],
                "dest": { "format": "pdf" }
            })
        );
        assert!(ConversionRequest::extract(
            &ContentId::from("f"),
            PageRange::new(6, 0),
            DestFormat::Pdf
        )
        .is_err());
    }

    #[test]
    fn flatten_targets_tiff() {
        let req = ConversionRequest::flatten(&ContentId::from("burned"));
        assert_eq!(req.dest().format, DestFormat::Tiff);
        assert!(req.dest().pdf_options.is_none());
        assert_eq!(req.sources().len(), 1);
    }

    #[test]
    fn first_result_extraction() {
        let id = first_result(json!({ "results": [{ "fileId": "x1" }, { "fileId": "x2" }] })).unwrap();
        assert_eq!(id.as_str(), "x1");
        assert!(matches!(
            first_result(json!({ "results": [] })),
            Err(RedactError::MalformedResponse { .. })
        ));
        assert!(first_result(Value::Null).is_err());
    }
}
