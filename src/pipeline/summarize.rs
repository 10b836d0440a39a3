//! Stage 1, page summarizer: one concurrent generation call per page.
//!
//! Every page becomes an independent Tokio task (render → prompt → generate →
//! clean). The stage waits for all of them to settle, then a pure reducer
//! turns each outcome into a [`PageSummary`]: failures become placeholder
//! records, and the result is sorted by page number no matter which task
//! finished first. A failing page never aborts the others.

use crate::config::PipelineConfig;
use crate::error::{GenerationError, MindmapError, PageError};
use crate::pipeline::llm::{generate_with_policy, Generator, Message};
use crate::pipeline::postprocess;
use crate::pipeline::render::PageRasterizer;
use crate::prompts::{PAGE_SUMMARY_SYSTEM_PROMPT, PAGE_SUMMARY_TASK};
use crate::state::{PageSummary, PipelineState};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Outcome of one page's unit of work.
pub type PageOutcome = (usize, Result<String, PageError>);

/// Run Stage 1 against `state`, filling `page_count` and `page_summaries`.
///
/// # Errors
/// - [`MindmapError::EmptyDocument`] if the document has no pages
/// - whatever the rasterizer returns when it cannot count pages
pub async fn summarize_pages(
    state: &mut PipelineState,
    rasterizer: &Arc<dyn PageRasterizer>,
    generator: &Arc<dyn Generator>,
    config: &PipelineConfig,
) -> Result<(), MindmapError> {
    let total = rasterizer.page_count(&state.document_path).await?;
    if total == 0 {
        error!("Document {} has no pages", state.document_path.display());
        return Err(MindmapError::EmptyDocument {
            path: state.document_path.clone(),
        });
    }

    let page_count = config.max_pages.map_or(total, |cap| total.min(cap));
    if page_count < total {
        info!("Summarising first {} of {} pages", page_count, total);
    }
    state.page_count = page_count;

    if let Some(ref cb) = config.progress_callback {
        cb.on_summarize_start(page_count);
    }

    let start = Instant::now();
    info!("Starting parallel processing of {} pages", page_count);
    let outcomes = fan_out(&state.document_path, page_count, rasterizer, generator, config).await;

    let failed = outcomes.iter().filter(|(_, r)| r.is_err()).count();
    state.page_summaries = collect_summaries(outcomes);
    info!(
        "Summarised {} pages ({} failed) in {}ms",
        state.page_summaries.len(),
        failed,
        start.elapsed().as_millis()
    );
    Ok(())
}

/// Reduce unit outcomes into the page-ordered summary list.
///
/// Failed units become `Error processing page: <cause>` placeholders.
pub fn collect_summaries(outcomes: Vec<PageOutcome>) -> Vec<PageSummary> {
    let mut summaries: Vec<PageSummary> = outcomes
        .into_iter()
        .map(|(page_number, outcome)| match outcome {
            Ok(summary) => PageSummary::new(page_number, summary),
            Err(e) => PageSummary::placeholder(page_number, e),
        })
        .collect();
    summaries.sort_by_key(|p| p.page_number);
    summaries
}

/// Dispatch one task per page and wait for all of them.
///
/// Each unit runs inside its own `tokio::spawn` so a panic is contained to
/// that page and reported as [`PageError::TaskFailed`].
async fn fan_out(
    path: &Path,
    page_count: usize,
    rasterizer: &Arc<dyn PageRasterizer>,
    generator: &Arc<dyn Generator>,
    config: &PipelineConfig,
) -> Vec<PageOutcome> {
    let limit = config.concurrency.unwrap_or(page_count).max(1);

    stream::iter((1..=page_count).map(|page_number| {
        let rasterizer = Arc::clone(rasterizer);
        let generator = Arc::clone(generator);
        let path = path.to_path_buf();
        let config = config.clone();
        async move {
            if let Some(ref cb) = config.progress_callback {
                cb.on_page_start(page_number, page_count);
            }

            let unit_config = config.clone();
            let handle = tokio::spawn(async move {
                summarize_page(&rasterizer, &generator, path, page_number, &unit_config).await
            });
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(PageError::TaskFailed {
                    page: page_number,
                    detail: e.to_string(),
                }),
            };

            match &outcome {
                Ok(summary) => {
                    info!("Successfully processed page {}", page_number);
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_page_complete(page_number, page_count, summary.len());
                    }
                }
                Err(e) => {
                    error!("Error processing page {}: {}", page_number, e);
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_page_error(page_number, page_count, &e.to_string());
                    }
                }
            }
            (page_number, outcome)
        }
    }))
    .buffer_unordered(limit)
    .collect()
    .await
}

/// Summarise a single page: render, prompt, generate, clean.
async fn summarize_page(
    rasterizer: &Arc<dyn PageRasterizer>,
    generator: &Arc<dyn Generator>,
    path: PathBuf,
    page_number: usize,
    config: &PipelineConfig,
) -> Result<String, PageError> {
    let png = rasterizer
        .render_page(&path, page_number, config.render_scale)
        .await?;

    let messages = page_messages(png);
    let label = format!("Page {page_number}");
    let text = generate_with_policy(generator.as_ref(), &messages, config, &label)
        .await
        .map_err(|e| page_error(page_number, e))?;

    Ok(postprocess::clean_summary(&text))
}

/// System instruction, then the slide image, then the task instruction.
pub fn page_messages(png: Vec<u8>) -> Vec<Message> {
    vec![
        Message::system(PAGE_SUMMARY_SYSTEM_PROMPT),
        Message::user_image(png),
        Message::user(PAGE_SUMMARY_TASK),
    ]
}

fn page_error(page: usize, err: GenerationError) -> PageError {
    match err {
        GenerationError::Timeout { secs } => PageError::Timeout { page, secs },
        GenerationError::RetriesExhausted { retries, last } => PageError::GenerationFailed {
            page,
            retries,
            detail: last,
        },
        GenerationError::Backend(detail) => PageError::GenerationFailed {
            page,
            retries: 0,
            detail,
        },
    }
}
