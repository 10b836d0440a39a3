//! Progress-callback trait for pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the run moves through its stages. Page events fire from
//! concurrently running Stage 1 tasks; topic events fire strictly in order.
//!
//! # Example
//!
//! ```rust
//! use edgequake_mindmap::{PipelineConfig, PipelineProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     pages: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, summary_len: usize) {
//!         let done = self.pages.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("Page {}/{} summarised ({} bytes), {} done", page_num, total_pages, summary_len, done);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { pages: AtomicUsize::new(0) });
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(counter as Arc<dyn PipelineProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// The four phases of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Summarize,
    Segment,
    Accumulate,
    Export,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Summarize => "summarize",
            Stage::Segment => "segment",
            Stage::Accumulate => "accumulate",
            Stage::Export => "export",
        };
        f.write_str(name)
    }
}

/// Called by the pipeline as it runs.
///
/// Implementations must be `Send + Sync`: page callbacks are invoked from
/// Tokio tasks running concurrently. All methods default to no-ops.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called when a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called once the page count is known, before any page is dispatched.
    fn on_summarize_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before a page's generation request is sent.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page summary is produced.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, summary_len: usize) {
        let _ = (page_num, total_pages, summary_len);
    }

    /// Called when a page falls back to its placeholder summary.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called after segmentation. `fallback` is true when the single
    /// "Main Content" topic was synthesised.
    fn on_topics_ready(&self, topic_count: usize, fallback: bool) {
        let _ = (topic_count, fallback);
    }

    /// Called after a topic's graph step replaced the accumulator.
    fn on_topic_merged(&self, index: usize, total: usize, nodes: usize, edges: usize) {
        let _ = (index, total, nodes, edges);
    }

    /// Called when a topic's graph step was dropped.
    fn on_topic_skipped(&self, index: usize, total: usize, reason: &str) {
        let _ = (index, total, reason);
    }

    /// Called once at the end of the run. `export_path` is empty if export failed.
    fn on_pipeline_complete(&self, node_count: usize, edge_count: usize, export_path: &str) {
        let _ = (node_count, edge_count, export_path);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        pages_done: AtomicUsize,
        page_errors: AtomicUsize,
        merged: AtomicUsize,
        skipped: AtomicUsize,
    }

    impl PipelineProgressCallback for TrackingCallback {
        fn on_page_complete(&self, _page_num: usize, _total_pages: usize, _summary_len: usize) {
            self.pages_done.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page_num: usize, _total_pages: usize, _error: &str) {
            self.page_errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_topic_merged(&self, _index: usize, _total: usize, _nodes: usize, _edges: usize) {
            self.merged.fetch_add(1, Ordering::SeqCst);
        }

        fn on_topic_skipped(&self, _index: usize, _total: usize, _reason: &str) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage_start(Stage::Summarize);
        cb.on_summarize_start(3);
        cb.on_page_start(1, 3);
        cb.on_page_complete(1, 3, 42);
        cb.on_page_error(2, 3, "timeout");
        cb.on_topics_ready(1, true);
        cb.on_topic_merged(0, 1, 4, 3);
        cb.on_topic_skipped(0, 1, "bad json");
        cb.on_pipeline_complete(4, 3, "");
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_page_complete(1, 2, 10);
        tracker.on_page_error(2, 2, "render failed");
        tracker.on_topic_merged(0, 2, 3, 2);
        tracker.on_topic_skipped(1, 2, "bad json");

        assert_eq!(tracker.pages_done.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.page_errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.merged.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.skipped.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stage_display() {
        assert_eq!(Stage::Accumulate.to_string(), "accumulate");
    }
}
