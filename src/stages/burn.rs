//! Burning a markup layer onto a document.

use crate::error::RedactError;
use crate::remote::{ContentId, JobKind, RemoteJobClient};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnRequest {
    document_file_id: ContentId,
    markup_file_id: ContentId,
}

impl BurnRequest {
    pub fn new(document: &ContentId, markup: &ContentId) -> Self {
        Self {
            document_file_id: document.clone(),
            markup_file_id: markup.clone(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BurnOutput {
    document_file_id: ContentId,
}

#[derive(Clone)]
pub struct BurnStage {
    jobs: RemoteJobClient,
}

impl BurnStage {
    pub fn new(jobs: RemoteJobClient) -> Self {
        Self { jobs }
    }

    /// Composite `markup` onto `document`; returns the burned document.
    pub async fn burn(
        &self,
        document: &ContentId,
        markup: &ContentId,
    ) -> Result<ContentId, RedactError> {
        let request = BurnRequest::new(document, markup);
        let (handle, output) = self.jobs.run(JobKind::MarkupBurn, &request).await?;
        let output: BurnOutput =
            serde_json::from_value(output).map_err(|e| RedactError::MalformedResponse {
                context: "markup burn",
                detail: e.to_string(),
            })?;
        info!(
            "Burned markup {} onto {} as {} (job {})",
            markup, document, output.document_file_id, handle.id
        );
        Ok(output.document_file_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::ServiceEndpoint;
    use serde_json::json;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn request_shape() {
        let req = BurnRequest::new(&ContentId::from("doc"), &ContentId::from("mk"));
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({ "documentFileId": "doc", "markupFileId": "mk" })
        );
    }

    #[tokio::test]
    async fn burn_returns_document_file_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/PCCIS/V1/MarkupBurner"))
            .and(body_json(json!({ "input": { "documentFileId": "doc", "markupFileId": "mk" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "processId": "b-1" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/PCCIS/V1/MarkupBurner/b-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "state": "complete",
                "output": { "documentFileId": "burned" }
            })))
            .mount(&server)
            .await;

        let stage = BurnStage::new(RemoteJobClient::new(
            reqwest::Client::new(),
            ServiceEndpoint::new(server.uri()).unwrap(),
            Duration::from_millis(5),
            CancellationToken::new(),
        ));
        let id = stage
            .burn(&ContentId::from("doc"), &ContentId::from("mk"))
            .await
            .unwrap();
        assert_eq!(id.as_str(), "burned");
    }
}
