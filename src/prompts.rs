//! Prompts for every generation call the pipeline makes.
//!
//! Stage 1 sends one page image at a time; Stage 2 sends every summary at
//! once; Stage 3 sends one topic plus, after the first topic, the whole
//! current graph. The JSON shapes described here must stay in sync with the
//! serde wire names in [`crate::state`].

use crate::state::TopicGroup;

// ── Stage 1: page summaries ──────────────────────────────────────────────

/// System prompt for summarising a single slide image.
pub const PAGE_SUMMARY_SYSTEM_PROMPT: &str = r#"You are an expert at analyzing presentation slides and extracting key information.
Your task is to deeply understand the content of this slide and provide a comprehensive summary.
Focus on:
    - Main ideas/topics and concepts
    - Key data points and statistics
    - Important relationships between ideas
    - Visual elements and their significance
    - Any technical details or specifications

Provide a concise, structured summary that captures the ESSENCE ONLY of the slide."#;

/// Task instruction sent after the slide image.
pub const PAGE_SUMMARY_TASK: &str = "Analyze this slide extracted from a presentation or lecture and provide a comprehensive, compact, structured summary that captures the ESSENCE ONLY of the slide.";

// ── Stage 2: topic segmentation ──────────────────────────────────────────

/// System prompt for grouping slide summaries into topics.
pub const SEGMENT_SYSTEM_PROMPT: &str = r#"You are an expert at structuring presentations. You will receive the summary of every slide of a deck, labelled by slide number.

Group the slides into a small number of main topics. Rules:
1. Every slide belongs to exactly one topic.
2. A topic covers a contiguous run of slides, in slide order.
3. Topics are listed in the order they appear in the deck.
4. Topic titles are short (at most 5 words).

Respond ONLY with JSON of this exact shape, with no commentary:
{
  "topics": [
    {
      "topic_title": "Short title",
      "slide_numbers": [1, 2, 3],
      "slides_range": "1-3",
      "summaries": ["summary of slide 1", "summary of slide 2", "summary of slide 3"]
    }
  ]
}"#;

/// Closing instruction after the concatenated summaries.
pub const SEGMENT_TASK: &str = "Segment the slides above into topics and return the JSON object now.";

/// Concatenate page summaries into one labelled block.
pub fn summaries_block<'a>(pages: impl IntoIterator<Item = (usize, &'a str)>) -> String {
    pages
        .into_iter()
        .map(|(n, s)| format!("Page {n}:\n{s}"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ── Stage 3: graph accumulation ──────────────────────────────────────────

/// Graph JSON shape shared by the seed and enrich prompts.
pub const GRAPH_SHAPE: &str = r#"{
  "nodes": [{"id": "unique_id", "title": "Short title", "type": "central" | "sub"}],
  "edges": [{"id": "unique_id", "from": "node_id", "to": "node_id", "label": "short relation"}]
}"#;

/// System prompt for the first topic: build the graph from nothing.
pub fn seed_system_prompt() -> String {
    format!(
        r#"You are an expert at building mind maps from presentation content.

Build the initial mind map for the topic you are given:
- Exactly ONE node of type "central" for the topic itself.
- One node of type "sub" for each key concept of the topic.
- Edges connecting the central node to its concepts, and concepts to each other where relevant.
- Node titles are short (at most 5 words). Edge labels are short relations.
- Every id is unique; every edge references existing node ids.

Respond ONLY with JSON of this exact shape, with no commentary:
{GRAPH_SHAPE}"#
    )
}

/// System prompt for every later topic: extend the supplied graph.
pub fn enrich_system_prompt() -> String {
    format!(
        r#"You are an expert at building mind maps from presentation content.

You are given the CURRENT mind map and a NEW topic. Extend the mind map:
- Keep EVERY existing node and edge exactly as given: same ids, titles, types, labels.
- Add ONE new node of type "central" for the new topic.
- Add "sub" nodes for the key concepts of the new topic, connected to its central node.
- Add AT LEAST ONE edge connecting the new topic to existing content where they relate.
- New ids must not collide with existing ids. Every edge references existing node ids.

Your response MUST be the COMPLETE mind map (all existing nodes and edges plus the new ones).
Respond ONLY with JSON of this exact shape, with no commentary:
{GRAPH_SHAPE}"#
    )
}

/// Describe a topic for the graph prompts.
pub fn topic_block(topic: &TopicGroup) -> String {
    let slides = topic
        .slide_numbers
        .iter()
        .zip(topic.summaries.iter())
        .map(|(n, s)| format!("Slide {n}:\n{s}"))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Topic: {}\nSlides: {}\n\n{}",
        topic.title, topic.slide_range, slides
    )
}

/// Wrap the current graph JSON for the enrich prompt.
pub fn current_graph_block(graph_json: &str) -> String {
    format!("CURRENT mind map:\n{graph_json}")
}

/// Closing instruction for the seed step.
pub const SEED_TASK: &str = "Build the initial mind map for this topic and return the JSON object now.";

/// Closing instruction for the enrich step.
pub const ENRICH_TASK: &str = "Return the COMPLETE updated mind map as a single JSON object now.";
