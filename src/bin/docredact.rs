//! CLI binary for docredact.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use docredact::{
    BurnTarget, PipelineConfig, PipelineOrchestrator, PipelineProgressCallback, ProgressCallback,
    RedactError, RunOutput, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar advancing per stage, with a log line
/// per uploaded input and per written output. Uploads and splits complete
/// out of order, so those lines carry their input index.
struct CliProgressCallback {
    bar: ProgressBar,
    stage_started: AtomicUsize,
    run_started: Instant,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:32.green/238}] {pos:>2}/{len} stages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        let bar = ProgressBar::new(Stage::ALL.len() as u64);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            stage_started: AtomicUsize::new(0),
            run_started: Instant::now(),
        })
    }

    fn millis_since_start(&self) -> usize {
        self.run_started.elapsed().as_millis() as usize
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_inputs: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Redacting {total_inputs} input files…"))
        ));
    }

    fn on_stage_start(&self, stage: Stage) {
        self.stage_started
            .store(self.millis_since_start(), Ordering::SeqCst);
        self.bar.set_prefix(stage.to_string());
        self.bar.set_message("");
    }

    fn on_stage_complete(&self, stage: Stage, content_id: &str) {
        let elapsed_ms = self
            .millis_since_start()
            .saturating_sub(self.stage_started.load(Ordering::SeqCst));
        let id = if content_id.is_empty() {
            String::new()
        } else {
            dim(&format!("→ {content_id}"))
        };
        self.bar.println(format!(
            "  {} {:<16} {}  {}",
            green("✓"),
            stage.as_str(),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
            id,
        ));
        self.bar.inc(1);
    }

    fn on_input_uploaded(&self, index: usize, filename: &str, pages: usize) {
        self.bar.println(format!(
            "    {} #{:<3} {}  {}",
            dim("↑"),
            index + 1,
            filename,
            dim(&format!("{pages} pages")),
        ));
    }

    fn on_output_written(&self, index: usize, total: usize, path: &Path) {
        self.bar.set_message(format!("{}/{}", index + 1, total));
        self.bar.println(format!(
            "    {} #{:<3} {}",
            dim("↓"),
            index + 1,
            path.display()
        ));
    }

    fn on_run_complete(&self, outputs_written: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} files written",
            green("✔"),
            bold(&outputs_written.to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Redact everything in ./input_files into ./output_files
  docredact --server http://localhost:3000

  # Custom directories and a ten-minute budget
  docredact --server http://pas:3000 -i scans -o redacted --deadline 600

  # Burn onto the searchable PDF instead of the merged TIFF
  docredact --server http://localhost:3000 --burn-target searchable

  # JSON run summary on stdout
  docredact --server http://localhost:3000 --json > run.json

SUPPORTED INPUTS:
  Extension   Uploaded as
  ─────────   ──────────────────────────────────────────────────────────────
  pdf         application/pdf
  docx        application/vnd.openxmlformats-officedocument.wordprocessingml.document
  eml         text/plain
  (other)     application/octet-stream

OUTPUTS:
  <input stem>.pdf   redacted pages belonging to each input
  __combined.pdf     all redacted pages, in input order

ENVIRONMENT VARIABLES:
  PD_SERVER_BASE          Base URL of the document-processing service
  DOCREDACT_INPUT_DIR     Input directory (default: input_files)
  DOCREDACT_OUTPUT_DIR    Output directory (default: output_files)
  RUST_LOG                Override log filter (e.g. docredact=debug)
"#;

/// Redact PII from a directory of documents using a document-processing service.
#[derive(Parser, Debug)]
#[command(
    name = "docredact",
    version,
    about = "Redact PII from a directory of documents using a document-processing service",
    long_about = "Uploads every file in the input directory, merges and OCRs them, detects \
personally identifiable information, burns opaque redaction rectangles over it, and writes \
one redacted PDF per input plus a combined PDF.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Base URL of the document-processing service.
    #[arg(long, env = "PD_SERVER_BASE")]
    server: String,

    /// Directory of documents to redact.
    #[arg(short, long, env = "DOCREDACT_INPUT_DIR", default_value = "input_files")]
    input_dir: PathBuf,

    /// Directory receiving redacted outputs (created if missing).
    #[arg(short, long, env = "DOCREDACT_OUTPUT_DIR", default_value = "output_files")]
    output_dir: PathBuf,

    /// Milliseconds between job status checks.
    #[arg(long, env = "DOCREDACT_POLL_MS", default_value_t = 1000,
          value_parser = clap::value_parser!(u64).range(1..))]
    poll_ms: u64,

    /// Maximum concurrent uploads and page extractions.
    #[arg(short, long, env = "DOCREDACT_CONCURRENCY", default_value_t = 8)]
    concurrency: usize,

    /// Overall run deadline in seconds.
    #[arg(long, env = "DOCREDACT_DEADLINE")]
    deadline: Option<u64>,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, env = "DOCREDACT_REQUEST_TIMEOUT", default_value_t = 120)]
    request_timeout: u64,

    /// OCR language passed to the converter.
    #[arg(long, env = "DOCREDACT_OCR_LANGUAGE", default_value = "english")]
    ocr_language: String,

    /// File name of the combined redacted output.
    #[arg(long, env = "DOCREDACT_COMBINED_NAME", default_value = "__combined.pdf")]
    combined_name: String,

    /// Document the markup is burned onto: merged, searchable.
    #[arg(long, env = "DOCREDACT_BURN_TARGET", default_value = "merged")]
    burn_target: BurnTarget,

    /// Print the run summary as JSON on stdout.
    #[arg(long, env = "DOCREDACT_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCREDACT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCREDACT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCREDACT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level stage logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;
    let orchestrator = PipelineOrchestrator::new(config).context("Failed to set up HTTP client")?;

    // Ctrl-C cancels in-flight waits instead of killing the process mid-write.
    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let output = match orchestrator.run().await {
        Ok(output) => output,
        Err(e) => {
            report_failure(&e, &cli.server);
            return Err(anyhow::Error::new(e).context("Redaction failed"));
        }
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&output);
    }

    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder(&cli.server)
        .input_dir(&cli.input_dir)
        .output_dir(&cli.output_dir)
        .poll_interval(Duration::from_millis(cli.poll_ms))
        .concurrency(cli.concurrency)
        .request_timeout(Duration::from_secs(cli.request_timeout))
        .ocr_language(&cli.ocr_language)
        .combined_name(&cli.combined_name)
        .burn_target(cli.burn_target);

    if let Some(secs) = cli.deadline {
        builder = builder.deadline(Duration::from_secs(secs));
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(output: &RunOutput) {
    for written in &output.outputs {
        match &written.path {
            Some(path) => eprintln!(
                "  {} {:<32} pages {:<9} →  {}",
                green("✓"),
                written.input,
                written.range.to_string(),
                bold(&path.display().to_string()),
            ),
            None => eprintln!(
                "  {} {:<32} {}",
                cyan("⚠"),
                written.input,
                dim("no pages, nothing written"),
            ),
        }
    }
    eprintln!(
        "{}  {} inputs  {} pages  {} marks  {}ms  →  {}",
        green("✔"),
        output.stats.total_inputs,
        output.stats.total_pages,
        output.stats.marks,
        output.stats.elapsed_ms,
        bold(&output.combined_path.display().to_string()),
    );
}

fn report_failure(error: &RedactError, server: &str) {
    eprintln!("{} {}", red("✘"), bold("redaction run failed"));
    if error.is_remote() {
        eprintln!(
            "   {}",
            dim(&format!("the service at {server} reported or caused this failure"))
        );
    }
}
