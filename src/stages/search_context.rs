//! Search contexts: the service's page index over a workfile.
//!
//! Creating a context is a job; its completion carries no page information,
//! so the page count comes from a second read of the context's records.

use crate::error::RedactError;
use crate::remote::{ContentId, JobKind, RemoteJobClient};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

/// Input of a `searchContexts` job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchContextRequest {
    /// Fresh per request; the service de-duplicates contexts on it.
    document_identifier: String,
    file_id: ContentId,
    source: &'static str,
}

impl SearchContextRequest {
    pub fn new(file_id: &ContentId) -> Self {
        Self {
            document_identifier: Uuid::new_v4().to_string(),
            file_id: file_id.clone(),
            source: "workFile",
        }
    }

    pub fn document_identifier(&self) -> &str {
        &self.document_identifier
    }
}

/// A built search context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchContext {
    pub context_id: String,
    pub file_id: ContentId,
}

#[derive(Deserialize)]
struct RecordsResponse {
    #[serde(default)]
    pages: Vec<Value>,
}

#[derive(Clone)]
pub struct SearchContextStage {
    jobs: RemoteJobClient,
}

impl SearchContextStage {
    pub fn new(jobs: RemoteJobClient) -> Self {
        Self { jobs }
    }

    /// Build a search context over `file_id` and wait for it.
    pub async fn create(&self, file_id: &ContentId) -> Result<SearchContext, RedactError> {
        let request = SearchContextRequest::new(file_id);
        let (handle, _) = self.jobs.run(JobKind::SearchContextBuild, &request).await?;
        debug!(
            "Search context {} built for {} (document {})",
            handle.id,
            file_id,
            request.document_identifier()
        );
        Ok(SearchContext {
            context_id: handle.id,
            file_id: file_id.clone(),
        })
    }

    /// Count the pages indexed by a finished context.
    pub async fn page_count(&self, context: &SearchContext) -> Result<usize, RedactError> {
        let path = format!(
            "{}/{}/records?pages=0-",
            JobKind::SearchContextBuild.resource(),
            context.context_id
        );
        let records: RecordsResponse = self.jobs.read_json(&path, "search context records").await?;
        Ok(records.pages.len())
    }

    /// Build a context and read its page count.
    pub async fn discover(&self, file_id: &ContentId) -> Result<(SearchContext, usize), RedactError> {
        let context = self.create(file_id).await?;
        let pages = self.page_count(&context).await?;
        info!("{} has {} pages", file_id, pages);
        Ok((context, pages))
    }
}
