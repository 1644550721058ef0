//! Markup layer generation: PII entities → redaction rectangles.
//!
//! Purely local: each line rectangle of an entity's first line group becomes
//! one opaque black `RectangleAnnotation`. The whole layer is serialised as a
//! single JSON document and uploaded as a workfile for the burner.

use crate::error::RedactError;
use crate::remote::{ContentId, ContentStore};
use crate::stages::pii::{PageData, PiiEntity, Rect};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

const REDACTION_COLOR: &str = "#000000";
const BORDER_THICKNESS: u32 = 4;
const OPACITY: u32 = 255;

/// One redaction mark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkupMark {
    pub uid: String,
    pub interaction_mode: String,
    /// 1-based page number.
    pub page_number: u32,
    #[serde(rename = "type")]
    pub mark_type: String,
    pub creation_date_time: String,
    pub modification_date_time: String,
    pub data: serde_json::Map<String, serde_json::Value>,
    pub rectangle: Rect,
    pub page_data: PageData,
    pub border_color: String,
    pub border_thickness: u32,
    pub fill_color: String,
    pub opacity: u32,
}

impl MarkupMark {
    fn redaction(page_number: u32, rectangle: Rect, page_data: PageData, stamp: &str) -> Self {
        Self {
            uid: Uuid::new_v4().to_string(),
            interaction_mode: "SelectionDisabled".into(),
            page_number,
            mark_type: "RectangleAnnotation".into(),
            creation_date_time: stamp.to_string(),
            modification_date_time: stamp.to_string(),
            data: serde_json::Map::new(),
            rectangle,
            page_data,
            border_color: REDACTION_COLOR.into(),
            border_thickness: BORDER_THICKNESS,
            fill_color: REDACTION_COLOR.into(),
            opacity: OPACITY,
        }
    }
}

/// A batch of marks, burned onto a document in one job.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarkupLayer {
    pub marks: Vec<MarkupMark>,
}

impl MarkupLayer {
    /// Expand `entities` into marks, all stamped with `created`.
    ///
    /// Fails with `MalformedResponse` when a page index has no 1-based
    /// page number.
    pub fn from_entities(
        entities: &[PiiEntity],
        created: DateTime<Utc>,
    ) -> Result<Self, RedactError> {
        let created = created.to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut marks = Vec::new();
        for entity in entities {
            let Some(group) = entity.line_groups.first() else {
                continue;
            };
            let page_number =
                entity
                    .page_index
                    .checked_add(1)
                    .ok_or_else(|| RedactError::MalformedResponse {
                        context: "PII entities",
                        detail: format!("page index {} out of range", entity.page_index),
                    })?;
            marks.extend(
                group
                    .lines
                    .iter()
                    .map(|rect| MarkupMark::redaction(page_number, *rect, group.page_data, &created)),
            );
        }
        Ok(Self { marks })
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn to_json(&self) -> Result<Vec<u8>, RedactError> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| RedactError::Internal(format!("markup serialisation: {e}")))
    }
}

#[derive(Clone)]
pub struct MarkupStage {
    content: ContentStore,
}

impl MarkupStage {
    pub fn new(content: ContentStore) -> Self {
        Self { content }
    }

    /// Build the layer for `entities` and upload it. Returns the layer's
    /// workfile id and the number of marks.
    pub async fn create_layer(
        &self,
        entities: &[PiiEntity],
    ) -> Result<(ContentId, usize), RedactError> {
        let layer = MarkupLayer::from_entities(entities, Utc::now())?;
        let body = layer.to_json()?;
        let id = self
            .content
            .upload(body, "json", "application/octet-stream")
            .await?;
        info!("Markup layer {} holds {} marks", id, layer.len());
        Ok((id, layer.len()))
    }
}
