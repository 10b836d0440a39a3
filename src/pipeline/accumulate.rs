//! Stage 3, graph accumulator: fold topics one at a time into one mind map.
//!
//! The fold is strictly sequential because every step's prompt contains the
//! graph produced by the previous step. Topic 0 seeds the graph; every later
//! topic is sent together with the complete current graph and the model must
//! answer with the complete new graph. A successful answer replaces the
//! accumulator; a failed one leaves it untouched and the fold moves on.
//!
//! ```text
//! Graph::default() ──step(t0)──▶ g0 ──step(t1)──▶ g1 ── … ──step(tn-1)──▶ final
//!                     seed           enrich                enrich
//! ```

use crate::config::PipelineConfig;
use crate::error::{GenerationError, ParseError};
use crate::parser::parse_structured_as;
use crate::pipeline::llm::{generate_with_policy, Generator, Message};
use crate::prompts::{
    current_graph_block, enrich_system_prompt, seed_system_prompt, topic_block, ENRICH_TASK,
    SEED_TASK,
};
use crate::state::{Graph, PipelineState, TopicGroup};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a fold step left the graph unchanged.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("unparsable graph: {}", .0.reason)]
    Parse(ParseError),

    #[error("could not serialise current graph: {0}")]
    Serialize(String),
}

/// Result of folding every topic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FoldOutcome {
    pub graph: Graph,
    /// 0-based indices of topics whose step failed.
    pub skipped: Vec<usize>,
}

/// Run Stage 3 against `state`, filling `graph` and setting `graph_complete`.
///
/// `graph_complete` is set whether or not any step succeeded: it means no
/// further graph steps will run.
pub async fn accumulate_graph(
    state: &mut PipelineState,
    generator: &Arc<dyn Generator>,
    config: &PipelineConfig,
) {
    let outcome = fold_topics(&state.topic_groups, generator, config).await;
    state.graph = outcome.graph;
    state.skipped_topics = outcome.skipped;
    state.graph_complete = true;
    info!(
        "Graph complete: {} nodes, {} edges, {} topics skipped",
        state.graph.nodes.len(),
        state.graph.edges.len(),
        state.skipped_topics.len()
    );
}

/// Fold `topics` in order, starting from an empty graph.
pub async fn fold_topics(
    topics: &[TopicGroup],
    generator: &Arc<dyn Generator>,
    config: &PipelineConfig,
) -> FoldOutcome {
    let total = topics.len();
    let mut acc = FoldOutcome::default();

    for (index, topic) in topics.iter().enumerate() {
        info!("Graph step {}/{}: '{}'", index + 1, total, topic.title);
        match graph_step(&acc.graph, topic, index, generator.as_ref(), config).await {
            Ok(next) => {
                acc.graph = next;
                if let Some(ref cb) = config.progress_callback {
                    cb.on_topic_merged(index, total, acc.graph.nodes.len(), acc.graph.edges.len());
                }
            }
            Err(e) => {
                warn!("Skipping topic {} ('{}'): {}", index + 1, topic.title, e);
                if let StepError::Parse(ref p) = e {
                    debug!("Raw graph response for topic {}: {}", index + 1, p.raw);
                }
                acc.skipped.push(index);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_topic_skipped(index, total, &e.to_string());
                }
            }
        }
    }

    acc
}

/// One fold step: `(current graph, topic) → next graph`.
///
/// `index == 0` is the seed step and ignores `current`.
pub async fn graph_step(
    current: &Graph,
    topic: &TopicGroup,
    index: usize,
    generator: &dyn Generator,
    config: &PipelineConfig,
) -> Result<Graph, StepError> {
    let messages = step_messages(current, topic, index)?;
    let label = format!("Topic {}", index + 1);
    let text = generate_with_policy(generator, &messages, config, &label).await?;

    let mut next: Graph = parse_structured_as(&text).map_err(StepError::Parse)?;

    // Restore before sanitizing so new edges into omitted prior nodes survive.
    if index > 0 && config.enforce_monotonic {
        let restored = next.restore_missing(current);
        if restored > 0 {
            warn!("{}: restored {} items the model dropped", label, restored);
        }
    }

    let dropped = next.sanitize();
    if dropped > 0 {
        warn!("{}: removed {} duplicate or dangling graph items", label, dropped);
    }

    if index == 0 {
        let centrals = next.central_nodes().count();
        if centrals != 1 {
            warn!("{}: seed graph has {} central nodes, expected 1", label, centrals);
        }
    }

    Ok(next)
}

/// Seed: system, topic, task. Enrich: system, current graph, topic, task.
pub fn step_messages(
    current: &Graph,
    topic: &TopicGroup,
    index: usize,
) -> Result<Vec<Message>, StepError> {
    if index == 0 {
        return Ok(vec![
            Message::system(seed_system_prompt()),
            Message::user(topic_block(topic)),
            Message::user(SEED_TASK),
        ]);
    }

    let graph_json =
        serde_json::to_string_pretty(current).map_err(|e| StepError::Serialize(e.to_string()))?;
    Ok(vec![
        Message::system(enrich_system_prompt()),
        Message::user(current_graph_block(&graph_json)),
        Message::user(topic_block(topic)),
        Message::user(ENRICH_TASK),
    ])
}
