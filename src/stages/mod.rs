//! Stage adapters over the remote service.
//!
//! Each submodule wraps exactly one logical remote operation and translates
//! pipeline concepts (content ids, page ranges, entities) into the service's
//! request and response shapes.
//!
//! ## Data Flow
//!
//! ```text
//! convert(merge) ─▶ convert(ocr) ─▶ search_context ─▶ pii ─▶ markup ─▶ burn
//!      ─▶ convert(flatten) ─▶ convert(ocr) ─▶ split
//! ```
//!
//! 1. [`convert`]        - `contentConverters` jobs; merge, OCR, flatten and
//!    page extraction share one request type
//! 2. [`search_context`] - build a page index and read its page count
//! 3. [`pii`]            - detect entities over a search context
//! 4. [`markup`]         - entities → redaction marks, uploaded as one layer;
//!    the only stage with no remote job
//! 5. [`burn`]           - composite the layer onto a document
//! 6. [`split`]          - cumulative page ranges and concurrent extraction

pub mod burn;
pub mod convert;
pub mod markup;
pub mod pii;
pub mod search_context;
pub mod split;

pub use burn::BurnStage;
pub use convert::{ConversionRequest, ConversionStage, DestFormat};
pub use markup::{MarkupLayer, MarkupMark, MarkupStage};
pub use pii::{PiiDetectionStage, PiiEntity};
pub use search_context::{SearchContext, SearchContextStage};
pub use split::{compute_page_ranges, PageRange, SplitOutput, SplitStage};
