//! Pipeline driver: the `run_pipeline*` entry points.
//!
//! The driver owns the [`PipelineState`] for the whole run and hands it to
//! each stage in a fixed order:
//!
//! ```text
//! summarize ──▶ segment ──▶ accumulate ──▶ export
//! ```
//!
//! There is no branching between stages. Each stage absorbs its own unit
//! failures; only document-level problems reach the caller as `Err`.

use crate::config::PipelineConfig;
use crate::error::MindmapError;
use crate::export;
use crate::output::PipelineResult;
use crate::pipeline::llm::{Generator, LlmGenerator};
use crate::pipeline::render::{PageRasterizer, PdfiumRasterizer};
use crate::pipeline::{accumulate, input, segment, summarize};
use crate::progress::Stage;
use crate::state::PipelineState;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Model used when a provider is chosen without naming a model.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Turn a slide-deck PDF into a mind map.
///
/// # Errors
/// Returns `Err(MindmapError)` only for fatal errors:
/// - file not found, unreadable, empty or not a PDF
/// - document has zero pages
/// - no LLM provider could be configured
///
/// Failed pages, an unparsable segmentation and dropped graph steps all
/// still produce `Ok`; check `result.metadata` for what succeeded.
pub async fn run_pipeline(
    document_path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<PipelineResult, MindmapError> {
    let path = input::resolve_document(document_path)?;
    let generator = resolve_generator(config).await?;
    let rasterizer = resolve_rasterizer(config);

    let mut state = PipelineState::new(path);
    info!("Starting run {} for {}", state.run_id, state.document_path.display());

    run_stages(&mut state, &rasterizer, &generator, config).await?;
    Ok(PipelineResult::from(state))
}

/// Drive every stage against a caller-created state.
///
/// This is the seam for callers that bring their own collaborators; no
/// input validation or provider resolution happens here.
pub async fn run_stages(
    state: &mut PipelineState,
    rasterizer: &Arc<dyn PageRasterizer>,
    generator: &Arc<dyn Generator>,
    config: &PipelineConfig,
) -> Result<(), MindmapError> {
    let total_start = Instant::now();
    let cb = config.progress_callback.as_ref();

    // ── Stage 1: summarize ───────────────────────────────────────────────
    if let Some(cb) = cb {
        cb.on_stage_start(Stage::Summarize);
    }
    if let Err(e) = summarize::summarize_pages(state, rasterizer, generator, config).await {
        if e.is_fatal() {
            return Err(e);
        }
        warn!("Page summarisation failed, continuing with no summaries: {}", e);
        state.page_summaries.clear();
    }

    // ── Stage 2: segment ─────────────────────────────────────────────────
    if let Some(cb) = cb {
        cb.on_stage_start(Stage::Segment);
    }
    let fallback = segment::segment_topics(state, generator, config).await?;
    if let Some(cb) = cb {
        cb.on_topics_ready(state.topic_count, fallback);
    }

    // ── Stage 3: accumulate ──────────────────────────────────────────────
    if let Some(cb) = cb {
        cb.on_stage_start(Stage::Accumulate);
    }
    accumulate::accumulate_graph(state, generator, config).await;

    // ── Export ───────────────────────────────────────────────────────────
    if config.export {
        if let Some(cb) = cb {
            cb.on_stage_start(Stage::Export);
        }
        export::export_state(state, config).await;
    }

    info!(
        "Run {} finished in {}ms: {} pages, {} topics, {} nodes, {} edges",
        state.run_id,
        total_start.elapsed().as_millis(),
        state.page_count,
        state.topic_count,
        state.graph.nodes.len(),
        state.graph.edges.len()
    );
    if let Some(cb) = cb {
        cb.on_pipeline_complete(
            state.graph.nodes.len(),
            state.graph.edges.len(),
            &state.export_path,
        );
    }
    Ok(())
}

/// Synchronous wrapper around [`run_pipeline`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_pipeline_sync(
    document_path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<PipelineResult, MindmapError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| MindmapError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run_pipeline(document_path, config))
}

/// Run the pipeline over PDF bytes held in memory.
///
/// The bytes are written to a managed [`tempfile`] that is removed when the
/// run returns. The state's `document_path` points at that temp file.
pub async fn run_pipeline_from_bytes(
    bytes: &[u8],
    config: &PipelineConfig,
) -> Result<PipelineResult, MindmapError> {
    let mut tmp = tempfile::Builder::new()
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| MindmapError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| MindmapError::Internal(format!("tempfile write: {e}")))?;
    tmp.flush()
        .map_err(|e| MindmapError::Internal(format!("tempfile flush: {e}")))?;
    run_pipeline(tmp.path(), config).await
}

// ── Collaborator resolution ──────────────────────────────────────────────

async fn resolve_generator(config: &PipelineConfig) -> Result<Arc<dyn Generator>, MindmapError> {
    if let Some(ref generator) = config.generator {
        return Ok(Arc::clone(generator));
    }
    let provider = resolve_provider(config).await?;
    Ok(Arc::new(LlmGenerator::new(provider, config)))
}

fn resolve_rasterizer(config: &PipelineConfig) -> Arc<dyn PageRasterizer> {
    match config.rasterizer {
        Some(ref r) => Arc::clone(r),
        None => Arc::new(PdfiumRasterizer::new(config.max_rendered_pixels)),
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, MindmapError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        MindmapError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with `config.model` or
///    [`DEFAULT_MODEL`].
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when
///    both are set and non-empty.
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Auto-detection** via [`ProviderFactory::from_env`].
async fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, MindmapError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| MindmapError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
