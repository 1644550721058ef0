//! PII detection over a search context.
//!
//! The detector job runs against a search-context id, not a workfile. Its
//! completion carries no entities; they are read from
//! `piiDetectors/{id}/entities` afterwards.

use crate::error::RedactError;
use crate::remote::{JobKind, RemoteJobClient};
use crate::stages::search_context::SearchContext;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Rectangle in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Page dimensions the rectangles are expressed against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageData {
    pub width: f64,
    pub height: f64,
}

/// One group of line rectangles sharing a page frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineGroup {
    #[serde(default)]
    pub lines: Vec<Rect>,
    pub page_data: PageData,
}

/// A detected region of sensitive information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PiiEntity {
    /// 0-based page index in the searched document.
    pub page_index: u32,
    #[serde(default)]
    pub line_groups: Vec<LineGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PiiDetectionRequest {
    context_id: String,
}

impl PiiDetectionRequest {
    pub fn new(context: &SearchContext) -> Self {
        Self {
            context_id: context.context_id.clone(),
        }
    }
}

#[derive(Deserialize)]
struct EntitiesResponse {
    #[serde(default)]
    entities: Vec<PiiEntity>,
}

#[derive(Clone)]
pub struct PiiDetectionStage {
    jobs: RemoteJobClient,
}

impl PiiDetectionStage {
    pub fn new(jobs: RemoteJobClient) -> Self {
        Self { jobs }
    }

    /// Run a detector over `context` and return its entities.
    pub async fn detect(&self, context: &SearchContext) -> Result<Vec<PiiEntity>, RedactError> {
        let request = PiiDetectionRequest::new(context);
        let (handle, _) = self.jobs.run(JobKind::PiiDetect, &request).await?;

        let path = format!("{}/{}/entities", JobKind::PiiDetect.resource(), handle.id);
        let body: EntitiesResponse = self.jobs.read_json(&path, "PII entities").await?;
        info!(
            "PII detector {} found {} entities in context {}",
            handle.id,
            body.entities.len(),
            context.context_id
        );
        Ok(body.entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{ContentId, ServiceEndpoint};
    use serde_json::json;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn entity_wire_format() {
        let e: PiiEntity = serde_json::from_value(json!({
            "pageIndex": 2,
            "text": "555-12-3456",
            "lineGroups": [{
                "lines": [{ "x": 10, "y": 20.5, "width": 100, "height": 12 }],
                "pageData": { "width": 612, "height": 792 }
            }]
        }))
        .unwrap();
        assert_eq!(e.page_index, 2);
        assert_eq!(e.line_groups[0].lines[0].y, 20.5);
        assert_eq!(e.line_groups[0].page_data.height, 792.0);
    }

    #[tokio::test]
    async fn detect_reads_entities_after_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/piiDetectors"))
            .and(body_json(json!({ "input": { "contextId": "ctx-s" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "processId": "pii-1" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/piiDetectors/pii-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "state": "complete" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/piiDetectors/pii-1/entities"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entities": [
                    { "pageIndex": 0, "lineGroups": [{ "lines": [], "pageData": { "width": 1, "height": 1 } }] },
                    { "pageIndex": 4, "lineGroups": [] }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let stage = PiiDetectionStage::new(RemoteJobClient::new(
            reqwest::Client::new(),
            ServiceEndpoint::new(server.uri()).unwrap(),
            Duration::from_millis(5),
            CancellationToken::new(),
        ));
        let ctx = SearchContext {
            context_id: "ctx-s".into(),
            file_id: ContentId::from("searchable"),
        };
        let entities = stage.detect(&ctx).await.unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[1].page_index, 4);
    }
}
