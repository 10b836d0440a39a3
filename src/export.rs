//! Exporter: persist a finished run as one JSON snapshot, and read it back.
//!
//! Snapshot layout:
//!
//! ```text
//! {
//!   "metadata":           { run_id, created_at, source_file, total_pages,
//!                           total_topics, graph_nodes, graph_edges },
//!   "processing_results": { page_summaries, topics: { topic_names, topic_details },
//!                           final_graph: { nodes, edges }, graph_building_complete }
//! }
//! ```
//!
//! Files are named `system_output_<run_id>_<YYYYmmdd_HHMMSS>.json` and written
//! atomically (temp file + rename). Writing never fails the run: on any error
//! [`export_state`] logs and leaves `export_path` empty.

use crate::config::PipelineConfig;
use crate::error::MindmapError;
use crate::state::{Graph, PageSummary, PipelineState, TopicGroup};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File name prefix shared by every snapshot.
pub const EXPORT_PREFIX: &str = "system_output_";

// ── Snapshot document ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSnapshot {
    pub metadata: ExportMetadata,
    pub processing_results: ProcessingResults,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub run_id: String,
    /// RFC 3339 local time.
    pub created_at: String,
    pub source_file: String,
    pub total_pages: usize,
    pub total_topics: usize,
    pub graph_nodes: usize,
    pub graph_edges: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResults {
    pub page_summaries: Vec<PageSummary>,
    pub topics: TopicsSection,
    pub final_graph: Graph,
    pub graph_building_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicsSection {
    pub topic_names: Vec<String>,
    pub topic_details: Vec<TopicGroup>,
}

impl ExportSnapshot {
    pub fn from_state(state: &PipelineState, created_at: DateTime<Local>) -> Self {
        Self {
            metadata: ExportMetadata {
                run_id: state.run_id.clone(),
                created_at: created_at.to_rfc3339(),
                source_file: state.document_path.display().to_string(),
                total_pages: state.page_count,
                total_topics: state.topic_count,
                graph_nodes: state.graph.nodes.len(),
                graph_edges: state.graph.edges.len(),
            },
            processing_results: ProcessingResults {
                page_summaries: state.page_summaries.clone(),
                topics: TopicsSection {
                    topic_names: state.topic_groups.iter().map(|t| t.title.clone()).collect(),
                    topic_details: state.topic_groups.clone(),
                },
                final_graph: state.graph.clone(),
                graph_building_complete: state.graph_complete,
            },
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.processing_results.final_graph
    }

    /// Human-readable summary, printed by `mindmap show`.
    pub fn summary(&self) -> ExportSummary<'_> {
        ExportSummary(self)
    }
}

/// `system_output_<run_id>_<YYYYmmdd_HHMMSS>.json`
pub fn export_file_name(run_id: &str, at: DateTime<Local>) -> String {
    format!("{EXPORT_PREFIX}{run_id}_{}.json", at.format("%Y%m%d_%H%M%S"))
}

// ── Writing ──────────────────────────────────────────────────────────────

/// Write `state` into `config.output_dir` and record the path in the state.
///
/// Returns the written path, or an empty string if anything went wrong.
pub async fn export_state(state: &mut PipelineState, config: &PipelineConfig) -> String {
    let now = Local::now();
    let snapshot = ExportSnapshot::from_state(state, now);
    let path = config.output_dir.join(export_file_name(&state.run_id, now));

    match write_json_atomic(&path, &snapshot).await {
        Ok(()) => {
            state.export_path = path.display().to_string();
            info!("Exported run {} to {}", state.run_id, state.export_path);
        }
        Err(e) => {
            warn!("Export failed: {}", e);
            state.export_path.clear();
        }
    }
    state.export_path.clone()
}

/// Serialise `value` as pretty JSON and move it into place with a rename.
async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), MindmapError> {
    let write_err = |source| MindmapError::ExportWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let json = serde_json::to_string_pretty(value)
        .map_err(|e| MindmapError::Internal(format!("snapshot serialisation: {e}")))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json).await.map_err(write_err)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }
    Ok(())
}

// ── Reading ──────────────────────────────────────────────────────────────

/// Load a snapshot previously written by [`export_state`].
pub async fn load_export(path: impl AsRef<Path>) -> Result<ExportSnapshot, MindmapError> {
    let path = path.as_ref();
    let load_err = |detail: String| MindmapError::ExportLoadFailed {
        path: path.to_path_buf(),
        detail,
    };
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| load_err(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| load_err(e.to_string()))
}

/// Every `system_output_*.json` in `dir`, newest first by modification time.
///
/// A missing directory yields an empty list.
pub async fn list_exports(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, MindmapError> {
    let dir = dir.as_ref();
    let list_err = |e: std::io::Error| MindmapError::ExportLoadFailed {
        path: dir.to_path_buf(),
        detail: e.to_string(),
    };

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(list_err(e)),
    };

    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(list_err)? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !(name.starts_with(EXPORT_PREFIX) && name.ends_with(".json")) {
            continue;
        }
        let modified = entry
            .metadata()
            .await
            .and_then(|m| m.modified())
            .map_err(list_err)?;
        found.push((modified, entry.path()));
    }

    // Same-second ties fall back to the timestamped name.
    found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
    Ok(found.into_iter().map(|(_, p)| p).collect())
}

/// The most recent snapshot in `dir`, if any.
pub async fn latest_export(dir: impl AsRef<Path>) -> Result<Option<PathBuf>, MindmapError> {
    Ok(list_exports(dir).await?.into_iter().next())
}

// ── Graph-only export ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphExport {
    pub metadata: GraphExportMetadata,
    pub graph: Graph,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphExportMetadata {
    pub exported_at: String,
    pub source_run: String,
    pub total_nodes: usize,
    pub total_edges: usize,
}

/// Write just the final graph of `snapshot` to `path`.
pub async fn export_graph_only(
    snapshot: &ExportSnapshot,
    path: impl AsRef<Path>,
) -> Result<GraphExport, MindmapError> {
    let graph = snapshot.graph().clone();
    let export = GraphExport {
        metadata: GraphExportMetadata {
            exported_at: Local::now().to_rfc3339(),
            source_run: snapshot.metadata.run_id.clone(),
            total_nodes: graph.nodes.len(),
            total_edges: graph.edges.len(),
        },
        graph,
    };
    write_json_atomic(path.as_ref(), &export).await?;
    info!("Graph exported to {}", path.as_ref().display());
    Ok(export)
}

// ── Summary ──────────────────────────────────────────────────────────────

/// Display adapter over an [`ExportSnapshot`].
pub struct ExportSummary<'a>(&'a ExportSnapshot);

const SUMMARY_PREVIEW_CHARS: usize = 100;

impl fmt::Display for ExportSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0.metadata;
        let r = &self.0.processing_results;
        let rule = "=".repeat(60);

        writeln!(f, "{rule}")?;
        writeln!(f, "EXPORTED RUN SUMMARY")?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Run ID:       {}", m.run_id)?;
        writeln!(f, "Created:      {}", m.created_at)?;
        writeln!(f, "Source File:  {}", m.source_file)?;
        writeln!(f, "Total Pages:  {}", m.total_pages)?;
        writeln!(f, "Total Topics: {}", m.total_topics)?;
        writeln!(f, "Graph Nodes:  {}", m.graph_nodes)?;
        writeln!(f, "Graph Edges:  {}", m.graph_edges)?;

        writeln!(f, "\nPAGE SUMMARIES ({} pages):", r.page_summaries.len())?;
        for (i, page) in r.page_summaries.iter().enumerate() {
            writeln!(
                f,
                "  {}. Page {}: {}",
                i + 1,
                page.page_number,
                preview(&page.summary)
            )?;
        }

        writeln!(f, "\nTOPICS ({} topics):", r.topics.topic_details.len())?;
        for (i, topic) in r.topics.topic_details.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, topic.title)?;
            writeln!(f, "     - Slides: {}", topic.slide_range)?;
            writeln!(f, "     - Slide Numbers: {:?}", topic.slide_numbers)?;
            if !topic.summaries.is_empty() {
                writeln!(f, "     - Summaries: {}", topic.summaries.len())?;
            }
        }

        let g = &r.final_graph;
        writeln!(f, "\nFINAL MIND MAP:")?;
        writeln!(f, "  Nodes: {}", g.nodes.len())?;
        writeln!(f, "  Edges: {}", g.edges.len())?;
        writeln!(f, "  Graph Building Complete: {}", r.graph_building_complete)?;

        if !g.nodes.is_empty() {
            writeln!(f, "\n  NODES:")?;
            for (i, node) in g.nodes.iter().enumerate() {
                writeln!(f, "    {}. {}: {}", i + 1, node.id, node.title)?;
            }
        }
        if !g.edges.is_empty() {
            writeln!(f, "\n  EDGES:")?;
            for (i, edge) in g.edges.iter().enumerate() {
                writeln!(
                    f,
                    "    {}. {} --[{}]--> {}",
                    i + 1,
                    edge.source,
                    edge.label,
                    edge.target
                )?;
            }
        }
        Ok(())
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > SUMMARY_PREVIEW_CHARS {
        let head: String = text.chars().take(SUMMARY_PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Edge, Node, NodeKind};
    use chrono::TimeZone;

    fn sample_state() -> PipelineState {
        let mut state = PipelineState::with_run_id("session_abcd1234", "decks/q3.pdf");
        state.page_count = 2;
        state.page_summaries = vec![PageSummary::new(1, "Intro"), PageSummary::new(2, "Numbers")];
        state.topic_count = 1;
        state.topic_groups = vec![TopicGroup {
            title: "Overview".into(),
            slide_numbers: vec![1, 2],
            slide_range: "1-2".into(),
            summaries: vec!["Intro".into(), "Numbers".into()],
        }];
        state.graph = Graph {
            nodes: vec![
                Node {
                    id: "overview".into(),
                    title: "Overview".into(),
                    kind: NodeKind::Central,
                },
                Node {
                    id: "numbers".into(),
                    title: "Numbers".into(),
                    kind: NodeKind::Sub,
                },
            ],
            edges: vec![Edge {
                id: "e1".into(),
                source: "overview".into(),
                target: "numbers".into(),
                label: "covers".into(),
            }],
        };
        state.graph_complete = true;
        state
    }

    #[test]
    fn file_name_embeds_run_id_and_timestamp() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            export_file_name("session_abcd1234", at),
            "system_output_session_abcd1234_20240309_140507.json"
        );
    }

    #[test]
    fn snapshot_uses_artifact_field_names() {
        let snap = ExportSnapshot::from_state(&sample_state(), Local::now());
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["metadata"]["total_pages"], 2);
        assert_eq!(json["metadata"]["graph_edges"], 1);
        assert_eq!(json["processing_results"]["topics"]["topic_names"][0], "Overview");
        assert_eq!(
            json["processing_results"]["topics"]["topic_details"][0]["slides_range"],
            "1-2"
        );
        assert_eq!(json["processing_results"]["final_graph"]["edges"][0]["from"], "overview");
        assert_eq!(json["processing_results"]["graph_building_complete"], true);
    }

    #[tokio::test]
    async fn export_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::builder()
            .output_dir(dir.path().join("nested"))
            .build()
            .unwrap();
        let mut state = sample_state();

        let path = export_state(&mut state, &config).await;
        assert!(!path.is_empty());
        assert_eq!(state.export_path, path);

        let loaded = load_export(&path).await.unwrap();
        assert_eq!(loaded.processing_results.page_summaries, state.page_summaries);
        assert_eq!(loaded.processing_results.topics.topic_details, state.topic_groups);
        assert_eq!(loaded.processing_results.final_graph, state.graph);
    }

    #[tokio::test]
    async fn export_failure_leaves_empty_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let config = PipelineConfig::builder().output_dir(&blocker).build().unwrap();

        let mut state = sample_state();
        let path = export_state(&mut state, &config).await;
        assert!(path.is_empty());
        assert!(state.export_path.is_empty());
    }

    #[tokio::test]
    async fn list_exports_filters_and_handles_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_exports(dir.path().join("absent")).await.unwrap().is_empty());

        std::fs::write(dir.path().join("system_output_a_20240101_000000.json"), "{}").unwrap();
        std::fs::write(dir.path().join("graph_only.json"), "{}").unwrap();
        std::fs::write(dir.path().join("system_output_b.txt"), "{}").unwrap();

        let found = list_exports(dir.path()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(latest_export(dir.path()).await.unwrap(), Some(found[0].clone()));
    }

    #[tokio::test]
    async fn graph_only_export_counts_items() {
        let dir = tempfile::tempdir().unwrap();
        let snap = ExportSnapshot::from_state(&sample_state(), Local::now());
        let out = dir.path().join("graph.json");

        let export = export_graph_only(&snap, &out).await.unwrap();
        assert_eq!(export.metadata.source_run, "session_abcd1234");
        assert_eq!(export.metadata.total_nodes, 2);

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(written["graph"]["nodes"][1]["type"], "sub");
    }

    #[test]
    fn summary_lists_nodes_and_edges() {
        let snap = ExportSnapshot::from_state(&sample_state(), Local::now());
        let text = snap.summary().to_string();
        assert!(text.contains("Run ID:       session_abcd1234"));
        assert!(text.contains("1. Overview"));
        assert!(text.contains("overview --[covers]--> numbers"));
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(150);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), SUMMARY_PREVIEW_CHARS + 3);
    }
}
