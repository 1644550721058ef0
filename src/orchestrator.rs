//! The end-to-end redaction run.
//!
//! ## Stage order
//!
//! ```text
//! inputs ─▶ upload + page count (concurrent, per input)
//!        ─▶ merge (TIFF) ─▶ OCR (PDF) ─▶ search context ─▶ PII detection
//!        ─▶ markup layer ─▶ burn ─▶ flatten (TIFF) ─▶ OCR (PDF)
//!        ─▶ split per input (concurrent) + combined output
//! ```
//!
//! Every stage after the upload fan-out consumes the previous stage's
//! workfile, so they run strictly in sequence. The first failure anywhere
//! aborts the run; outstanding sibling requests are dropped.

use crate::config::{BurnTarget, PipelineConfig};
use crate::error::RedactError;
use crate::input::{check_output_names, discover_inputs, InputDocument, InputFile};
use crate::output::{RunOutput, RunStats, StageIds};
use crate::progress::Stage;
use crate::remote::{build_http_client, ContentId, ContentStore, RemoteJobClient};
use crate::stages::{
    BurnStage, ConversionRequest, ConversionStage, DestFormat, MarkupStage, PiiDetectionStage,
    SearchContextStage, SplitStage,
};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Runs the redaction pipeline described by a [`PipelineConfig`].
///
/// One orchestrator can serve several sequential runs; each run gets its own
/// child of [`PipelineOrchestrator::cancellation_token`].
pub struct PipelineOrchestrator {
    config: PipelineConfig,
    http: reqwest::Client,
    cancel: CancellationToken,
}

/// Stage adapters bound to one run's cancellation token.
struct RunStages {
    content: ContentStore,
    conversion: ConversionStage,
    search: SearchContextStage,
    pii: PiiDetectionStage,
    markup: MarkupStage,
    burn: BurnStage,
}

impl PipelineOrchestrator {
    pub fn new(config: PipelineConfig) -> Result<Self, RedactError> {
        let http = build_http_client(config.request_timeout)?;
        Ok(Self {
            config,
            http,
            cancel: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Cancelling this token aborts the current run with
    /// [`RedactError::Cancelled`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execute one full run.
    pub async fn run(&self) -> Result<RunOutput, RedactError> {
        let run_token = self.cancel.child_token();
        let stages = self.stages(run_token.clone());

        let budget = self.config.deadline;
        let deadline = async move {
            match budget {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        let result = tokio::select! {
            biased;
            _ = run_token.cancelled() => Err(RedactError::Cancelled),
            _ = deadline => {
                run_token.cancel();
                Err(RedactError::DeadlineExceeded { budget: budget.unwrap_or_default() })
            }
            result = self.run_stages(&stages) => result,
        };

        if let Err(ref e) = result {
            warn!("Redaction run failed: {}", e);
        }
        result
    }

    fn stages(&self, cancel: CancellationToken) -> RunStages {
        let endpoint = self.config.endpoint.clone();
        let jobs = RemoteJobClient::new(
            self.http.clone(),
            endpoint.clone(),
            self.config.poll_interval,
            cancel,
        );
        let content = ContentStore::new(self.http.clone(), endpoint);
        RunStages {
            conversion: ConversionStage::new(jobs.clone()),
            search: SearchContextStage::new(jobs.clone()),
            pii: PiiDetectionStage::new(jobs.clone()),
            markup: MarkupStage::new(content.clone()),
            burn: BurnStage::new(jobs),
            content,
        }
    }

    async fn run_stages(&self, stages: &RunStages) -> Result<RunOutput, RedactError> {
        let started = Instant::now();
        let config = &self.config;
        info!("Starting redaction run against {}", config.endpoint);

        // ── Step 1: Discover inputs and plan outputs ─────────────────────
        let files = discover_inputs(&config.input_dir, DestFormat::Pdf.extension()).await?;
        check_output_names(&files, &config.combined_name)?;
        tokio::fs::create_dir_all(&config.output_dir)
            .await
            .map_err(|e| RedactError::io(&config.output_dir, e))?;
        info!("Found {} input files in {}", files.len(), config.input_dir.display());
        if let Some(cb) = &config.progress {
            cb.on_run_start(files.len());
        }

        // ── Step 2: Upload and count pages ───────────────────────────────
        self.stage_start(Stage::Upload);
        let documents = self.upload_inputs(stages, &files).await?;
        let total_pages: usize = documents.iter().map(|d| d.page_count).sum();
        info!("Uploaded {} inputs, {} pages total", documents.len(), total_pages);
        self.stage_complete(Stage::Upload, "");

        // ── Step 3: Merge ────────────────────────────────────────────────
        self.stage_start(Stage::Merge);
        let ids: Vec<ContentId> = documents.iter().map(|d| d.content_id.clone()).collect();
        let merged = stages
            .conversion
            .convert(&ConversionRequest::merge(&ids)?)
            .await?;
        self.stage_complete(Stage::Merge, merged.as_str());

        // ── Step 4: OCR ──────────────────────────────────────────────────
        self.stage_start(Stage::Ocr);
        let searchable = stages
            .conversion
            .convert(&ConversionRequest::ocr(&merged, &config.ocr_language)?)
            .await?;
        self.stage_complete(Stage::Ocr, searchable.as_str());

        // ── Step 5: Search context ───────────────────────────────────────
        self.stage_start(Stage::SearchContext);
        let context = stages.search.create(&searchable).await?;
        self.stage_complete(Stage::SearchContext, &context.context_id);

        // ── Step 6: PII detection ────────────────────────────────────────
        self.stage_start(Stage::PiiDetection);
        let entities = stages.pii.detect(&context).await?;
        self.stage_complete(Stage::PiiDetection, &context.context_id);

        // ── Step 7: Markup layer ─────────────────────────────────────────
        self.stage_start(Stage::Markup);
        let (markup, marks) = stages.markup.create_layer(&entities).await?;
        self.stage_complete(Stage::Markup, markup.as_str());

        // ── Step 8: Burn ─────────────────────────────────────────────────
        self.stage_start(Stage::Burn);
        let target = match config.burn_target {
            BurnTarget::Merged => &merged,
            BurnTarget::Searchable => &searchable,
        };
        let burned = stages.burn.burn(target, &markup).await?;
        self.stage_complete(Stage::Burn, burned.as_str());

        // ── Step 9: Flatten ──────────────────────────────────────────────
        self.stage_start(Stage::Flatten);
        let flattened = stages
            .conversion
            .convert(&ConversionRequest::flatten(&burned))
            .await?;
        self.stage_complete(Stage::Flatten, flattened.as_str());

        // ── Step 10: Final OCR ───────────────────────────────────────────
        self.stage_start(Stage::FinalOcr);
        let final_document = stages
            .conversion
            .convert(&ConversionRequest::ocr(&flattened, &config.ocr_language)?)
            .await?;
        self.stage_complete(Stage::FinalOcr, final_document.as_str());

        // ── Step 11: Split per input ─────────────────────────────────────
        self.stage_start(Stage::Split);
        let outputs = SplitStage::new(
            stages.conversion.clone(),
            stages.content.clone(),
            DestFormat::Pdf,
            config.concurrency,
        )
        .with_progress(config.progress.clone())
        .split(&final_document, &documents, &config.output_dir)
        .await?;
        self.stage_complete(Stage::Split, "");

        // ── Step 12: Combined output ─────────────────────────────────────
        self.stage_start(Stage::Combined);
        let combined_path = config.output_dir.join(&config.combined_name);
        let combined_bytes = stages
            .content
            .fetch_to_file(&final_document, &combined_path)
            .await?;
        self.stage_complete(Stage::Combined, final_document.as_str());

        let files_written = outputs.iter().filter(|o| o.path.is_some()).count() + 1;
        let bytes_written = outputs.iter().map(|o| o.bytes).sum::<u64>() + combined_bytes;
        let stats = RunStats {
            total_inputs: documents.len(),
            total_pages,
            entities: entities.len(),
            marks,
            files_written,
            bytes_written,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            "Redaction run complete: {} files written in {}ms ({} marks)",
            stats.files_written, stats.elapsed_ms, stats.marks
        );
        if let Some(cb) = &config.progress {
            cb.on_run_complete(files_written);
        }

        Ok(RunOutput {
            documents,
            stages: StageIds {
                merged,
                searchable,
                search_context: context.context_id,
                markup,
                burned,
                flattened,
                final_document,
            },
            outputs,
            combined_path,
            stats,
        })
    }

    /// Upload every input and discover its page count, concurrently.
    ///
    /// Results are placed by input index, so the returned order is the
    /// discovery order regardless of which upload finished first.
    async fn upload_inputs(
        &self,
        stages: &RunStages,
        files: &[InputFile],
    ) -> Result<Vec<InputDocument>, RedactError> {
        let progress = self.config.progress.as_ref();
        let finished: Vec<(usize, InputDocument)> =
            stream::iter(files.iter().enumerate().map(|(index, file)| async move {
                let id = stages.content.upload_file(&file.path, &file.extension).await?;
                let (_, pages) = stages.search.discover(&id).await?;
                if pages == 0 {
                    warn!("{} reports zero pages", file.filename);
                }
                info!("Uploaded {} as {} ({} pages)", file.filename, id, pages);
                if let Some(cb) = progress {
                    cb.on_input_uploaded(index, &file.filename, pages);
                }
                Ok::<_, RedactError>((index, InputDocument::new(file, id, pages)))
            }))
            .buffer_unordered(self.config.concurrency)
            .try_collect()
            .await?;

        let mut slots: Vec<Option<InputDocument>> = vec![None; files.len()];
        for (index, document) in finished {
            slots[index] = Some(document);
        }
        slots
            .into_iter()
            .zip(files)
            .map(|(slot, file)| {
                slot.ok_or_else(|| {
                    RedactError::Internal(format!("no upload result for {}", file.filename))
                })
            })
            .collect()
    }

    fn stage_start(&self, stage: Stage) {
        info!("Stage started: {}", stage);
        if let Some(cb) = &self.config.progress {
            cb.on_stage_start(stage);
        }
    }

    fn stage_complete(&self, stage: Stage, content_id: &str) {
        if content_id.is_empty() {
            info!("Stage complete: {}", stage);
        } else {
            info!("Stage complete: {} → {}", stage, content_id);
        }
        if let Some(cb) = &self.config.progress {
            cb.on_stage_complete(stage, content_id);
        }
    }
}
