//! Input discovery and output naming.
//!
//! The input directory is read once. The resulting order (sorted by file
//! name) is the order of the merged document, and therefore the order the
//! split stage uses to assign page ranges; nothing downstream reorders it.

use crate::error::RedactError;
use crate::remote::ContentId;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A file found in the input directory, before upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub path: PathBuf,
    pub filename: String,
    /// Lower-cased last extension; empty when the name has none.
    pub extension: String,
    /// Name of the per-input output file.
    pub output_name: String,
}

/// An uploaded input with its discovered page count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputDocument {
    pub filename: String,
    pub extension: String,
    pub content_id: ContentId,
    pub page_count: usize,
    pub output_name: String,
}

impl InputDocument {
    pub fn new(file: &InputFile, content_id: ContentId, page_count: usize) -> Self {
        Self {
            filename: file.filename.clone(),
            extension: file.extension.clone(),
            content_id,
            page_count,
            output_name: file.output_name.clone(),
        }
    }
}

/// Lower-cased extension of `filename`.
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// `filename` with its extension replaced by `extension`.
pub fn output_name(filename: &str, extension: &str) -> String {
    Path::new(filename)
        .with_extension(extension)
        .to_string_lossy()
        .into_owned()
}

/// List the regular, non-hidden files of `dir`, sorted by name.
///
/// Fails with [`RedactError::NoInputs`] when nothing is found.
pub async fn discover_inputs(
    dir: &Path,
    output_extension: &str,
) -> Result<Vec<InputFile>, RedactError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| RedactError::io(dir, e))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| RedactError::io(dir, e))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| RedactError::io(entry.path(), e))?;
        if !file_type.is_file() {
            continue;
        }
        let filename = entry.file_name().to_string_lossy().into_owned();
        if filename.starts_with('.') {
            debug!("Skipping hidden file {}", filename);
            continue;
        }
        files.push(InputFile {
            path: entry.path(),
            extension: extension_of(&filename),
            output_name: output_name(&filename, output_extension),
            filename,
        });
    }

    if files.is_empty() {
        return Err(RedactError::NoInputs {
            dir: dir.to_path_buf(),
        });
    }
    files.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(files)
}

/// Reject input sets where two files, or a file and the combined output,
/// would be written to the same name.
pub fn check_output_names(files: &[InputFile], combined_name: &str) -> Result<(), RedactError> {
    let mut seen: HashMap<&str, &str> = HashMap::with_capacity(files.len() + 1);
    seen.insert(combined_name, "<combined output>");
    for file in files {
        if let Some(first) = seen.insert(&file.output_name, &file.filename) {
            return Err(RedactError::OutputNameCollision {
                first: first.to_string(),
                second: file.filename.clone(),
                output: file.output_name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> InputFile {
        InputFile {
            path: PathBuf::from(name),
            filename: name.to_string(),
            extension: extension_of(name),
            output_name: output_name(name, "pdf"),
        }
    }

    #[test]
    fn extension_is_lowercased_last_component() {
        assert_eq!(extension_of("Report.DOCX"), "docx");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("README"), "");
    }

    #[test]
    fn output_name_replaces_extension() {
        assert_eq!(output_name("b.docx", "pdf"), "b.pdf");
        assert_eq!(output_name("a.pdf", "pdf"), "a.pdf");
        assert_eq!(output_name("Mail.EML", "pdf"), "Mail.pdf");
        assert_eq!(output_name("notes", "pdf"), "notes.pdf");
    }

    #[test]
    fn collisions_are_detected() {
        let err = check_output_names(&[file("a.docx"), file("a.pdf")], "__combined.pdf").unwrap_err();
        match err {
            RedactError::OutputNameCollision { first, second, output } => {
                assert_eq!(first, "a.docx");
                assert_eq!(second, "a.pdf");
                assert_eq!(output, "a.pdf");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(check_output_names(&[file("__combined.eml")], "__combined.pdf").is_err());
        assert!(check_output_names(&[file("a.pdf"), file("b.docx")], "__combined.pdf").is_ok());
    }

    #[tokio::test]
    async fn discover_sorts_and_skips_hidden_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.docx"), b"b").unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"a").unwrap();
        std::fs::write(dir.path().join(".DS_Store"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let files = discover_inputs(dir.path(), "pdf").await.unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "b.docx"]);
        assert_eq!(files[1].extension, "docx");
        assert_eq!(files[1].output_name, "b.pdf");
    }

    #[tokio::test]
    async fn empty_dir_is_no_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_inputs(dir.path(), "pdf").await.unwrap_err();
        assert!(matches!(err, RedactError::NoInputs { .. }));
    }

    #[tokio::test]
    async fn missing_dir_is_io_failed() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_inputs(&dir.path().join("nope"), "pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, RedactError::IoFailed { .. }));
    }
}
