//! Result types returned by the `run_pipeline*` entry points.

use crate::state::{Graph, PipelineState, TopicGroup};
use serde::{Deserialize, Serialize};

/// What a caller gets back from a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub graph: Graph,
    pub metadata: ResultMetadata,
    pub topic_groups: Vec<TopicGroup>,
}

/// Counts describing what the run actually produced.
///
/// Counts can be lower than the document suggests (failed pages still count
/// as pages; skipped topics still count as topics).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub run_id: String,
    pub page_count: usize,
    pub topic_count: usize,
    pub node_count: usize,
    pub edge_count: usize,
    /// Empty when export was disabled or failed.
    pub export_path: String,
    /// 0-based indices of topics whose graph step was dropped.
    #[serde(default)]
    pub skipped_topics: Vec<usize>,
}

impl From<PipelineState> for PipelineResult {
    fn from(state: PipelineState) -> Self {
        Self {
            metadata: ResultMetadata {
                run_id: state.run_id,
                page_count: state.page_count,
                topic_count: state.topic_count,
                node_count: state.graph.nodes.len(),
                edge_count: state.graph.edges.len(),
                export_path: state.export_path,
                skipped_topics: state.skipped_topics,
            },
            graph: state.graph,
            topic_groups: state.topic_groups,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Node, NodeKind};

    #[test]
    fn result_counts_come_from_graph() {
        let mut state = PipelineState::with_run_id("session_00000000", "a.pdf");
        state.page_count = 3;
        state.topic_count = 1;
        state.graph.nodes.push(Node {
            id: "a".into(),
            title: "A".into(),
            kind: NodeKind::Central,
        });
        state.export_path = "output/x.json".into();

        let result = PipelineResult::from(state);
        assert_eq!(result.metadata.page_count, 3);
        assert_eq!(result.metadata.node_count, 1);
        assert_eq!(result.metadata.edge_count, 0);
        assert_eq!(result.metadata.export_path, "output/x.json");
    }
}
