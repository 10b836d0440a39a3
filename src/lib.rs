//! # edgequake-mindmap
//!
//! Turn a slide-deck PDF into a hierarchical mind map using Vision LLMs.
//!
//! ## Why this crate?
//!
//! Slides are visual: bullet fragments, diagrams and charts that text
//! extraction flattens into noise. This crate rasterises every slide, lets a
//! vision model summarise it, groups the summaries into topics, then grows a
//! single mind-map graph one topic at a time so later topics can attach to
//! concepts introduced earlier.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Summarize   one concurrent VLM call per slide (fan-out / join)
//!  ├─ 2. Segment     one call groups all summaries into topics
//!  ├─ 3. Accumulate  sequential fold: seed graph, then enrich per topic
//!  └─ 4. Export      JSON snapshot of the whole run
//! ```
//!
//! Every stage degrades instead of failing: a broken slide becomes a
//! placeholder summary, unparsable topics fall back to one "Main Content"
//! topic, and an unparsable graph step leaves the graph as it was.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_mindmap::{run_pipeline, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = PipelineConfig::default();
//!     let result = run_pipeline("deck.pdf", &config).await?;
//!     println!(
//!         "{} topics, {} nodes, {} edges",
//!         result.metadata.topic_count, result.metadata.node_count, result.metadata.edge_count
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `mindmap` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod run;
pub mod state;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use error::{GenerationError, MindmapError, PageError, ParseError};
pub use export::{
    export_graph_only, export_state, latest_export, list_exports, load_export, ExportSnapshot,
    GraphExport,
};
pub use output::{PipelineResult, ResultMetadata};
pub use pipeline::llm::{Generator, Message, Role};
pub use pipeline::render::{PageRasterizer, PdfiumRasterizer};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback, Stage};
pub use run::{run_pipeline, run_pipeline_from_bytes, run_pipeline_sync, run_stages};
pub use state::{Edge, Graph, Node, NodeKind, PageSummary, PipelineState, TopicGroup};
