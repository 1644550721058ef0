//! Workfile storage on the remote service.
//!
//! Content is write-once, read-many. Nothing is cached locally: every
//! [`ContentStore::fetch`] reads from the service again, so callers that need
//! bytes twice keep their own copy.

use crate::error::RedactError;
use crate::remote::{error_detail, ServiceEndpoint};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

const WORKFILE_RESOURCE: &str = "PCCIS/V1/WorkFile";

/// Opaque identifier of content stored on the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Upload content type for a lower-cased file extension.
pub fn content_type_for_extension(extension: &str) -> &'static str {
    match extension {
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "eml" => "text/plain",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(rename = "fileId")]
    file_id: String,
}

/// Uploads and downloads workfiles.
#[derive(Clone)]
pub struct ContentStore {
    http: reqwest::Client,
    endpoint: ServiceEndpoint,
}

impl ContentStore {
    pub fn new(http: reqwest::Client, endpoint: ServiceEndpoint) -> Self {
        Self { http, endpoint }
    }

    /// Upload `body` as a new workfile. One request, no retry.
    pub async fn upload(
        &self,
        body: impl Into<reqwest::Body>,
        extension: &str,
        content_type: &str,
    ) -> Result<ContentId, RedactError> {
        let upload_failed = |detail: String| RedactError::UploadFailed {
            extension: extension.to_string(),
            detail,
        };

        let response = self
            .http
            .post(self.endpoint.url(WORKFILE_RESOURCE))
            .query(&[("FileExtension", extension)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| upload_failed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(upload_failed(error_detail(response).await));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| upload_failed(format!("unreadable upload response: {e}")))?;
        debug!("Uploaded .{} workfile as {}", extension, body.file_id);
        Ok(ContentId(body.file_id))
    }

    /// Stream a local file to the service without buffering it in memory.
    pub async fn upload_file(
        &self,
        path: &Path,
        extension: &str,
    ) -> Result<ContentId, RedactError> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| RedactError::io(path, e))?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        self.upload(body, extension, content_type_for_extension(extension))
            .await
    }

    /// Read a workfile's bytes.
    pub async fn fetch(&self, id: &ContentId) -> Result<Vec<u8>, RedactError> {
        let response = self.get(id).await?;
        let bytes = response.bytes().await.map_err(|e| RedactError::FetchFailed {
            content_id: id.to_string(),
            detail: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }

    /// Stream a workfile to `dest`, returning the number of bytes written.
    ///
    /// Bytes land in `<dest>.part` first and are renamed into place once the
    /// body is complete. The `.part` file is removed if the transfer fails.
    pub async fn fetch_to_file(&self, id: &ContentId, dest: &Path) -> Result<u64, RedactError> {
        let response = self.get(id).await?;

        let mut tmp_name = dest.as_os_str().to_os_string();
        tmp_name.push(".part");
        let tmp_path = std::path::PathBuf::from(tmp_name);

        let result = async {
            let mut file = tokio::fs::File::create(&tmp_path)
                .await
                .map_err(|e| RedactError::io(&tmp_path, e))?;

            let mut written: u64 = 0;
            let mut chunks = response.bytes_stream();
            while let Some(chunk) = chunks.next().await {
                let chunk = chunk.map_err(|e| RedactError::FetchFailed {
                    content_id: id.to_string(),
                    detail: e.to_string(),
                })?;
                file.write_all(&chunk)
                    .await
                    .map_err(|e| RedactError::io(&tmp_path, e))?;
                written += chunk.len() as u64;
            }
            file.flush()
                .await
                .map_err(|e| RedactError::io(&tmp_path, e))?;
            drop(file);

            tokio::fs::rename(&tmp_path, dest)
                .await
                .map_err(|e| RedactError::io(dest, e))?;
            Ok::<_, RedactError>(written)
        }
        .await;

        match result {
            Ok(written) => {
                debug!("Wrote {} bytes of {} to {}", written, id, dest.display());
                Ok(written)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp_path).await;
                Err(e)
            }
        }
    }

    async fn get(&self, id: &ContentId) -> Result<reqwest::Response, RedactError> {
        let url = self
            .endpoint
            .url(&format!("{}/{}", WORKFILE_RESOURCE, id.as_str()));
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| RedactError::FetchFailed {
                content_id: id.to_string(),
                detail: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(RedactError::FetchFailed {
                content_id: id.to_string(),
                detail: error_detail(response).await,
            });
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{header, method, path, path_regex, query_param};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    /// In-memory workfile service: POST stores the body, GET returns it.
    #[derive(Clone, Default)]
    struct Workfiles {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
        next: Arc<AtomicUsize>,
    }

    struct Store(Workfiles);
    struct Load(Workfiles);

    impl Respond for Store {
        fn respond(&self, req: &Request) -> ResponseTemplate {
            let id = format!("wf-{}", self.0.next.fetch_add(1, Ordering::SeqCst));
            self.0
                .files
                .lock()
                .unwrap()
                .insert(id.clone(), req.body.clone());
            ResponseTemplate::new(200).set_body_json(json!({ "fileId": id }))
        }
    }

    impl Respond for Load {
        fn respond(&self, req: &Request) -> ResponseTemplate {
            let id = req.url.path().rsplit('/').next().unwrap_or_default();
            match self.0.files.lock().unwrap().get(id) {
                Some(bytes) => ResponseTemplate::new(200).set_body_bytes(bytes.clone()),
                None => ResponseTemplate::new(404)
                    .set_body_json(json!({ "errorCode": "WorkFileNotFound" })),
            }
        }
    }

    async fn workfile_server() -> MockServer {
        let server = MockServer::start().await;
        let files = Workfiles::default();
        Mock::given(method("POST"))
            .and(path("/PCCIS/V1/WorkFile"))
            .respond_with(Store(files.clone()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/PCCIS/V1/WorkFile/[^/]+$"))
            .respond_with(Load(files))
            .mount(&server)
            .await;
        server
    }

    fn store(server: &MockServer) -> ContentStore {
        ContentStore::new(
            reqwest::Client::new(),
            ServiceEndpoint::new(server.uri()).unwrap(),
        )
    }

    #[test]
    fn content_types_by_extension() {
        assert_eq!(content_type_for_extension("pdf"), "application/pdf");
        assert_eq!(content_type_for_extension("eml"), "text/plain");
        assert!(content_type_for_extension("docx").contains("wordprocessingml"));
        assert_eq!(content_type_for_extension("tiff"), "application/octet-stream");
        assert_eq!(content_type_for_extension(""), "application/octet-stream");
    }

    #[tokio::test]
    async fn upload_then_fetch_is_byte_identical() {
        let server = workfile_server().await;
        let content = store(&server);
        let payload: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();

        let id = content
            .upload(payload.clone(), "pdf", "application/pdf")
            .await
            .unwrap();
        let fetched = content.fetch(&id).await.unwrap();
        assert_eq!(fetched, payload);
    }

    #[tokio::test]
    async fn upload_sends_extension_and_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/PCCIS/V1/WorkFile"))
            .and(query_param("FileExtension", "eml"))
            .and(header("content-type", "text/plain"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "fileId": "wf-eml" })))
            .expect(1)
            .mount(&server)
            .await;

        let id = store(&server)
            .upload(b"Subject: hi\r\n\r\nbody".to_vec(), "eml", "text/plain")
            .await
            .unwrap();
        assert_eq!(id, ContentId::from("wf-eml"));
    }

    #[tokio::test]
    async fn upload_file_streams_from_disk() {
        let server = workfile_server().await;
        let content = store(&server);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memo.docx");
        std::fs::write(&path, b"PK\x03\x04 fake docx").unwrap();

        let id = content.upload_file(&path, "docx").await.unwrap();
        assert_eq!(content.fetch(&id).await.unwrap(), b"PK\x03\x04 fake docx");
    }

    #[tokio::test]
    async fn upload_rejection_is_upload_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/PCCIS/V1/WorkFile"))
            .respond_with(ResponseTemplate::new(500).set_body_string("disk full"))
            .expect(1)
            .mount(&server)
            .await;

        let err = store(&server)
            .upload(vec![1u8, 2, 3], "pdf", "application/pdf")
            .await
            .unwrap_err();
        match err {
            RedactError::UploadFailed { extension, detail } => {
                assert_eq!(extension, "pdf");
                assert!(detail.contains("500") && detail.contains("disk full"), "got: {detail}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_unknown_id_is_fetch_failed() {
        let server = workfile_server().await;
        let err = store(&server)
            .fetch(&ContentId::from("missing"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, RedactError::FetchFailed { ref content_id, .. } if content_id == "missing"),
            "got: {err:?}"
        );
    }

    #[tokio::test]
    async fn fetch_to_file_leaves_no_part_file() {
        let server = workfile_server().await;
        let content = store(&server);
        let id = content
            .upload(b"%PDF-1.7 redacted".to_vec(), "pdf", "application/pdf")
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.pdf");
        let n = content.fetch_to_file(&id, &dest).await.unwrap();

        assert_eq!(n, 17);
        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-1.7 redacted");
        assert!(!dir.path().join("out.pdf.part").exists());
    }

    #[tokio::test]
    async fn failed_fetch_to_file_removes_part_file() {
        let server = workfile_server().await;
        let content = store(&server);
        let id = content
            .upload(b"%PDF-1.7".to_vec(), "pdf", "application/pdf")
            .await
            .unwrap();

        // A directory at the destination makes the final rename fail.
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("taken");
        std::fs::create_dir(&dest).unwrap();
        std::fs::write(dest.join("keep"), b"x").unwrap();

        let err = content.fetch_to_file(&id, &dest).await.unwrap_err();
        assert!(matches!(err, RedactError::IoFailed { .. }), "got: {err:?}");
        assert!(!dir.path().join("taken.part").exists());
        assert!(dest.is_dir());
    }
}
