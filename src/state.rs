//! The run state threaded through every pipeline stage, and the mind-map
//! graph types it carries.
//!
//! One [`PipelineState`] exists per run. The driver owns it and lends it
//! `&mut` to each stage in turn; no stage keeps a reference after it returns.
//! Serde attributes pin the JSON wire names used by the model prompts and the
//! export artifact (`topic_title`, `slides_range`, `type`, `from`, `to`).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Mutable record shared by all stages of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub run_id: String,
    pub document_path: PathBuf,
    pub page_count: usize,
    pub page_summaries: Vec<PageSummary>,
    pub topic_count: usize,
    pub topic_groups: Vec<TopicGroup>,
    pub graph: Graph,
    pub graph_complete: bool,
    /// Empty unless the exporter wrote an artifact.
    pub export_path: String,
    /// 0-based indices of topics whose graph step was dropped.
    pub skipped_topics: Vec<usize>,
}

impl PipelineState {
    /// Create the initial state for a run: every collection empty, every count zero.
    pub fn new(document_path: impl Into<PathBuf>) -> Self {
        Self::with_run_id(new_run_id(), document_path)
    }

    pub fn with_run_id(run_id: impl Into<String>, document_path: impl Into<PathBuf>) -> Self {
        Self {
            run_id: run_id.into(),
            document_path: document_path.into(),
            page_count: 0,
            page_summaries: Vec::new(),
            topic_count: 0,
            topic_groups: Vec::new(),
            graph: Graph::default(),
            graph_complete: false,
            export_path: String::new(),
            skipped_topics: Vec::new(),
        }
    }
}

/// `session_` followed by the first 8 hex digits of a v4 UUID.
pub fn new_run_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("session_{}", &hex[..8])
}

/// Summary of one page produced by Stage 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    /// 1-based.
    pub page_number: usize,
    pub summary: String,
}

impl PageSummary {
    pub fn new(page_number: usize, summary: impl Into<String>) -> Self {
        Self {
            page_number,
            summary: summary.into(),
        }
    }

    /// Stand-in record for a page whose unit of work failed.
    pub fn placeholder(page_number: usize, cause: impl std::fmt::Display) -> Self {
        Self {
            page_number,
            summary: format!("Error processing page: {cause}"),
        }
    }
}

/// A contiguous, labelled run of slides produced by Stage 2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicGroup {
    #[serde(rename = "topic_title")]
    pub title: String,
    pub slide_numbers: Vec<usize>,
    #[serde(rename = "slides_range", default)]
    pub slide_range: String,
    #[serde(default)]
    pub summaries: Vec<String>,
}

/// Render an ordered list of slide numbers.
///
/// A contiguous list renders as `first-last` (`"4-4"` for one slide). A list
/// with gaps renders its runs comma-separated, so `[1, 2, 3, 5]` is `"1-3,5"`.
pub fn slide_range(slide_numbers: &[usize]) -> String {
    let mut runs: Vec<(usize, usize)> = Vec::new();
    for &n in slide_numbers {
        match runs.last_mut() {
            Some((_, end)) if n == *end + 1 => *end = n,
            _ => runs.push((n, n)),
        }
    }

    match runs.as_slice() {
        [] => String::new(),
        [(first, last)] => format!("{first}-{last}"),
        _ => runs
            .iter()
            .map(|&(a, b)| if a == b { a.to_string() } else { format!("{a}-{b}") })
            .collect::<Vec<_>>()
            .join(","),
    }
}

// ── Graph ────────────────────────────────────────────────────────────────

/// Node kind: a topic hub or one of its concepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Central,
    Sub,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    #[serde(rename = "from")]
    pub source: String,
    #[serde(rename = "to")]
    pub target: String,
    #[serde(default)]
    pub label: String,
}

/// The mind map: `{nodes: [...], edges: [...]}` on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node_ids(&self) -> HashSet<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    pub fn edge_ids(&self) -> HashSet<&str> {
        self.edges.iter().map(|e| e.id.as_str()).collect()
    }

    pub fn central_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.kind == NodeKind::Central)
    }

    /// Make the graph structurally valid.
    ///
    /// Duplicate node or edge ids keep their first occurrence, and edges whose
    /// endpoints are not nodes of this graph are removed. Returns the number
    /// of items dropped.
    pub fn sanitize(&mut self) -> usize {
        let before = self.nodes.len() + self.edges.len();

        let mut seen = HashSet::new();
        self.nodes.retain(|n| seen.insert(n.id.clone()));

        let mut seen = HashSet::new();
        let nodes: HashSet<String> = self.nodes.iter().map(|n| n.id.clone()).collect();
        self.edges.retain(|e| {
            nodes.contains(&e.source) && nodes.contains(&e.target) && seen.insert(e.id.clone())
        });

        before - (self.nodes.len() + self.edges.len())
    }

    /// Re-insert every node and edge of `prior` that is missing from `self`.
    ///
    /// Restored items are appended verbatim in their original order, so ids
    /// present after a fold step are always a superset of those before it.
    /// Returns the number of items restored.
    pub fn restore_missing(&mut self, prior: &Graph) -> usize {
        let mut restored = 0;

        let have: HashSet<String> = self.nodes.iter().map(|n| n.id.clone()).collect();
        for node in prior.nodes.iter().filter(|n| !have.contains(&n.id)) {
            self.nodes.push(node.clone());
            restored += 1;
        }

        let have: HashSet<String> = self.edges.iter().map(|e| e.id.clone()).collect();
        for edge in prior.edges.iter().filter(|e| !have.contains(&e.id)) {
            self.edges.push(edge.clone());
            restored += 1;
        }

        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, kind: NodeKind) -> Node {
        Node {
            id: id.into(),
            title: id.to_uppercase(),
            kind,
        }
    }

    fn edge(id: &str, from: &str, to: &str) -> Edge {
        Edge {
            id: id.into(),
            source: from.into(),
            target: to.into(),
            label: "relates to".into(),
        }
    }

    #[test]
    fn new_state_is_empty() {
        let state = PipelineState::new("deck.pdf");
        assert!(state.run_id.starts_with("session_"));
        assert_eq!(state.run_id.len(), "session_".len() + 8);
        assert_eq!(state.page_count, 0);
        assert!(state.page_summaries.is_empty());
        assert!(state.topic_groups.is_empty());
        assert!(state.graph.is_empty());
        assert!(!state.graph_complete);
        assert!(state.export_path.is_empty());
    }

    #[test]
    fn run_ids_differ() {
        assert_ne!(new_run_id(), new_run_id());
    }

    #[test]
    fn placeholder_mentions_cause() {
        let p = PageSummary::placeholder(3, "boom");
        assert_eq!(p.page_number, 3);
        assert_eq!(p.summary, "Error processing page: boom");
    }

    #[test]
    fn graph_uses_wire_names() {
        let g = Graph {
            nodes: vec![node("n1", NodeKind::Central)],
            edges: vec![],
        };
        let json = serde_json::to_value(&g).unwrap();
        assert_eq!(json["nodes"][0]["type"], "central");

        let parsed: Graph = serde_json::from_str(
            r#"{"nodes":[{"id":"a","title":"A","type":"sub"},{"id":"b","title":"B","type":"central"}],
                "edges":[{"id":"e1","from":"b","to":"a","label":"has"}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.edges[0].source, "b");
        assert_eq!(parsed.edges[0].target, "a");
        assert_eq!(parsed.central_nodes().count(), 1);
    }

    #[test]
    fn topic_group_uses_wire_names() {
        let t: TopicGroup = serde_json::from_str(
            r#"{"topic_title":"Intro","slide_numbers":[1,2],"slides_range":"1-2","summaries":["a","b"]}"#,
        )
        .unwrap();
        assert_eq!(t.title, "Intro");
        assert_eq!(t.slide_range, "1-2");
    }

    #[test]
    fn sanitize_drops_duplicates_and_dangling_edges() {
        let mut g = Graph {
            nodes: vec![
                node("a", NodeKind::Central),
                node("b", NodeKind::Sub),
                node("a", NodeKind::Sub),
            ],
            edges: vec![edge("e1", "a", "b"), edge("e1", "b", "a"), edge("e2", "a", "zz")],
        };
        assert_eq!(g.sanitize(), 3);
        assert_eq!(g.nodes.len(), 2);
        assert_eq!(g.nodes[0].kind, NodeKind::Central);
        assert_eq!(g.edges, vec![edge("e1", "a", "b")]);
    }

    #[test]
    fn restore_missing_makes_superset() {
        let prior = Graph {
            nodes: vec![node("a", NodeKind::Central), node("b", NodeKind::Sub)],
            edges: vec![edge("e1", "a", "b")],
        };
        let mut next = Graph {
            nodes: vec![node("a", NodeKind::Central), node("c", NodeKind::Central)],
            edges: vec![edge("e2", "a", "c")],
        };
        assert_eq!(next.restore_missing(&prior), 2);
        assert!(next.node_ids().is_superset(&prior.node_ids()));
        assert!(next.edge_ids().is_superset(&prior.edge_ids()));
    }

    #[test]
    fn slide_range_formatting() {
        assert_eq!(slide_range(&[1, 2, 3]), "1-3");
        assert_eq!(slide_range(&[4]), "4-4");
        assert_eq!(slide_range(&[]), "");
        assert_eq!(slide_range(&[1, 3]), "1,3");
        assert_eq!(slide_range(&[1, 2, 3, 5, 7, 8]), "1-3,5,7-8");
    }
}
