//! CLI binary for edgequake-mindmap.
//!
//! A thin shim over the library crate: `run` maps flags onto
//! `PipelineConfig`, `show` and `graph-only` work on exported snapshots.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edgequake_mindmap::{
    export_graph_only, latest_export, load_export, run_pipeline, PipelineConfig,
    PipelineProgressCallback, ProgressCallback, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

fn truncate(msg: &str, max: usize) -> String {
    if msg.chars().count() > max {
        let head: String = msg.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    } else {
        msg.to_string()
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress for a whole run: a page bar during Stage 1, a spinner for
/// segmentation, then a topic bar during the graph fold.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-page wall-clock start times; pages finish out of order.
    start_times: Mutex<HashMap<usize, Instant>>,
    page_errors: AtomicUsize,
    skipped_topics: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(Self::spinner_style());
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            page_errors: AtomicUsize::new(0),
            skipped_topics: AtomicUsize::new(0),
        })
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS)
    }

    fn counter_style(unit: &str) -> ProgressStyle {
        ProgressStyle::with_template(&format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  \
             [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {unit}  \
             ⏱ {{elapsed_precise}}  {{msg}}"
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS)
    }

    fn activate_counter(&self, prefix: &'static str, unit: &str, total: usize) {
        self.bar.set_style(Self::counter_style(unit));
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_prefix(prefix);
        self.bar.set_message("");
        self.bar.reset_eta();
    }

    fn take_elapsed(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        match stage {
            Stage::Segment => {
                self.bar.set_style(Self::spinner_style());
                self.bar.set_prefix("Segmenting");
                self.bar.set_message("grouping slides into topics…");
            }
            Stage::Export => {
                self.bar.set_style(Self::spinner_style());
                self.bar.set_prefix("Exporting");
                self.bar.set_message("writing snapshot…");
            }
            Stage::Summarize | Stage::Accumulate => {}
        }
    }

    fn on_summarize_start(&self, total_pages: usize) {
        self.activate_counter("Summarising", "slides", total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Summarising {total_pages} slides…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
    }

    fn on_page_complete(&self, page_num: usize, total: usize, summary_len: usize) {
        let secs = self.take_elapsed(page_num);
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{summary_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.take_elapsed(page_num);
        self.page_errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&truncate(error, 80)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_topics_ready(&self, topic_count: usize, fallback: bool) {
        let note = if fallback {
            yellow(" (segmentation failed, using a single topic)")
        } else {
            String::new()
        };
        self.bar.println(format!(
            "{} {}{}",
            cyan("◆"),
            bold(&format!("{topic_count} topics identified")),
            note
        ));
        self.activate_counter("Mapping", "topics", topic_count);
    }

    fn on_topic_merged(&self, index: usize, total: usize, nodes: usize, edges: usize) {
        self.bar.println(format!(
            "  {} Topic {:>3}/{:<3}  {}",
            green("✓"),
            index + 1,
            total,
            dim(&format!("{nodes} nodes, {edges} edges")),
        ));
        self.bar.inc(1);
    }

    fn on_topic_skipped(&self, index: usize, total: usize, reason: &str) {
        self.skipped_topics.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Topic {:>3}/{:<3}  {}",
            yellow("⚠"),
            index + 1,
            total,
            yellow(&truncate(reason, 80)),
        ));
        self.bar.inc(1);
    }

    fn on_pipeline_complete(&self, node_count: usize, edge_count: usize, export_path: &str) {
        self.bar.finish_and_clear();

        let page_errors = self.page_errors.load(Ordering::SeqCst);
        let skipped = self.skipped_topics.load(Ordering::SeqCst);
        let mark = if page_errors == 0 && skipped == 0 {
            green("✔")
        } else {
            yellow("⚠")
        };
        eprintln!(
            "{} Mind map: {} nodes, {} edges  ({} slide errors, {} topics skipped)",
            mark,
            bold(&node_count.to_string()),
            bold(&edge_count.to_string()),
            page_errors,
            skipped,
        );
        if !export_path.is_empty() {
            eprintln!("   {} {}", dim("snapshot →"), bold(export_path));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Build a mind map from a slide deck (snapshot written to ./output)
  mindmap run deck.pdf

  # Use a specific model and print the result as JSON
  mindmap run --provider openai --model gpt-4o --json deck.pdf > result.json

  # Only the first 20 slides, at most 8 concurrent calls
  mindmap run --max-pages 20 --concurrency 8 deck.pdf

  # Summarise the latest snapshot
  mindmap show

  # Extract just the graph from a snapshot
  mindmap graph-only output/system_output_session_1a2b3c4d_20240309_140507.json -o graph.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium; skips auto-download
  PDFIUM_AUTO_CACHE_DIR   Override the default pdfium cache directory
  RUST_LOG                Override the log filter (e.g. edgequake_mindmap=debug)
"#;

/// Turn slide-deck PDFs into mind maps using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "mindmap",
    version,
    about = "Turn slide-deck PDFs into mind maps using Vision LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "MINDMAP_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "MINDMAP_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline on a PDF.
    Run(RunArgs),

    /// Print a summary of an exported snapshot (latest one if omitted).
    Show {
        /// Snapshot file.
        export: Option<PathBuf>,

        /// Directory searched for the latest snapshot.
        #[arg(long, env = "MINDMAP_OUTPUT_DIR", default_value = "output")]
        output_dir: PathBuf,
    },

    /// Write only the graph of a snapshot to a new file.
    GraphOnly {
        /// Snapshot file.
        export: PathBuf,

        /// Destination file.
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Local slide-deck PDF.
    input: PathBuf,

    /// LLM model ID (e.g. gpt-4o, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Page zoom factor when rasterising (1.0 = 72 DPI).
    #[arg(long, env = "MINDMAP_SCALE", default_value_t = 1.0)]
    scale: f32,

    /// Maximum concurrent slide summaries (default: all slides at once).
    #[arg(short, long, env = "MINDMAP_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Only process the first N slides.
    #[arg(long, env = "MINDMAP_MAX_PAGES")]
    max_pages: Option<usize>,

    /// Max LLM output tokens per call.
    #[arg(long, env = "MINDMAP_MAX_TOKENS", default_value_t = 4095)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "MINDMAP_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Extra attempts per LLM call on a backend error.
    #[arg(long, env = "MINDMAP_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "MINDMAP_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Directory for the exported snapshot.
    #[arg(short, long, env = "MINDMAP_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Do not write a snapshot.
    #[arg(long)]
    no_export: bool,

    /// Accept the model's topic assignment as-is.
    #[arg(long)]
    no_repair: bool,

    /// Print the PipelineResult as JSON on stdout.
    #[arg(long, env = "MINDMAP_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "MINDMAP_NO_PROGRESS")]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level logs while it is shown.
    let show_progress = match cli.command {
        Command::Run(ref args) => !cli.quiet && !args.no_progress && !args.json,
        _ => false,
    };
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

    match cli.command {
        Command::Run(ref args) => run(args, cli.quiet, show_progress).await,
        Command::Show {
            ref export,
            ref output_dir,
        } => show(export.clone(), output_dir).await,
        Command::GraphOnly {
            ref export,
            ref output,
        } => graph_only(export, output, cli.quiet).await,
    }
}

async fn run(args: &RunArgs, quiet: bool, show_progress: bool) -> Result<()> {
    ensure_pdfium(quiet)?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };
    let config = build_config(args, progress_cb)?;

    let result = run_pipeline(&args.input, &config)
        .await
        .context("Mind map generation failed")?;

    if args.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialise result")?;
        println!("{json}");
    } else if !quiet && !show_progress {
        let m = &result.metadata;
        eprintln!(
            "Run {}: {} slides, {} topics, {} nodes, {} edges",
            m.run_id, m.page_count, m.topic_count, m.node_count, m.edge_count
        );
        if !m.skipped_topics.is_empty() {
            eprintln!("  {} topics skipped", m.skipped_topics.len());
        }
        if !m.export_path.is_empty() {
            eprintln!("  snapshot: {}", m.export_path);
        }
    }
    Ok(())
}

async fn show(export: Option<PathBuf>, output_dir: &Path) -> Result<()> {
    let path = match export {
        Some(p) => p,
        None => latest_export(output_dir)
            .await
            .context("Failed to list snapshots")?
            .with_context(|| format!("No snapshots found in {}", output_dir.display()))?,
    };
    let snapshot = load_export(&path)
        .await
        .with_context(|| format!("Failed to load {}", path.display()))?;
    print!("{}", snapshot.summary());
    Ok(())
}

async fn graph_only(export: &Path, output: &Path, quiet: bool) -> Result<()> {
    let snapshot = load_export(export)
        .await
        .with_context(|| format!("Failed to load {}", export.display()))?;
    let written = export_graph_only(&snapshot, output)
        .await
        .context("Failed to write graph")?;
    if !quiet {
        eprintln!(
            "{} Graph exported to {}  ({} nodes, {} edges)",
            green("✔"),
            bold(&output.display().to_string()),
            written.metadata.total_nodes,
            written.metadata.total_edges
        );
    }
    Ok(())
}

/// Download pdfium on first use; later runs only check the cache.
fn ensure_pdfium(quiet: bool) -> Result<()> {
    if pdfium_auto::is_pdfium_cached() {
        return Ok(());
    }

    if quiet {
        return tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
            .map(|_| ())
            .context("Failed to download PDFium engine");
    }

    let dl_bar = ProgressBar::new(0);
    dl_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    dl_bar.set_prefix("PDF engine");
    dl_bar.enable_steady_tick(Duration::from_millis(80));

    let bar = dl_bar.clone();
    tokio::task::block_in_place(|| {
        pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
            if let Some(t) = total {
                if bar.length().unwrap_or(0) != t {
                    bar.set_length(t);
                }
            }
            bar.set_position(downloaded);
        }))
    })
    .context("Failed to download PDFium engine")?;

    dl_bar.finish_with_message("ready ✓");
    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(args: &RunArgs, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .render_scale(args.scale)
        .max_tokens(args.max_tokens)
        .temperature(args.temperature)
        .max_retries(args.max_retries)
        .api_timeout_secs(args.api_timeout)
        .output_dir(args.output_dir.clone())
        .export(!args.no_export)
        .repair_topics(!args.no_repair);

    if let Some(n) = args.concurrency {
        builder = builder.concurrency(n);
    }
    if let Some(n) = args.max_pages {
        builder = builder.max_pages(n);
    }
    if let Some(ref model) = args.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
