//! Stage 2, topic segmenter: group every page summary into labelled topics.
//!
//! One generation call sees all summaries at once and answers with
//! `{"topics": [...]}`. Anything that prevents getting usable topics out of
//! that call (backend error, timeout, malformed JSON, wrong shape, no topics)
//! falls back to a single "Main Content" topic spanning every page, so this
//! stage only fails when there is nothing to segment.
//!
//! The model's assignment is reconciled with the pages that actually exist
//! when `repair_topics` is enabled; see [`repair_topics`].

use crate::config::PipelineConfig;
use crate::error::MindmapError;
use crate::parser::parse_structured_as;
use crate::pipeline::llm::{generate_with_policy, Generator, Message};
use crate::prompts::{summaries_block, SEGMENT_SYSTEM_PROMPT, SEGMENT_TASK};
use crate::state::{slide_range, PageSummary, PipelineState, TopicGroup};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Title of the topic synthesised when segmentation fails.
pub const FALLBACK_TOPIC_TITLE: &str = "Main Content";

#[derive(Debug, Deserialize)]
struct TopicsResponse {
    topics: Vec<TopicGroup>,
}

/// Run Stage 2 against `state`, filling `topic_count` and `topic_groups`.
///
/// Returns `true` when the fallback topic was used.
///
/// # Errors
/// [`MindmapError::NoInputData`] if Stage 1 produced no summaries.
pub async fn segment_topics(
    state: &mut PipelineState,
    generator: &Arc<dyn Generator>,
    config: &PipelineConfig,
) -> Result<bool, MindmapError> {
    if state.page_summaries.is_empty() {
        return Err(MindmapError::NoInputData);
    }

    let messages = segment_messages(&state.page_summaries);
    let parsed = match generate_with_policy(generator.as_ref(), &messages, config, "Segmentation").await {
        Ok(text) => match parse_topics(&text) {
            Ok(groups) => Some(groups),
            Err(e) => {
                warn!("Segmentation response unparsable ({}); raw: {}", e.reason, e.raw);
                None
            }
        },
        Err(e) => {
            warn!("Segmentation call failed: {}", e);
            None
        }
    };

    let groups = parsed
        .map(|groups| {
            if config.repair_topics {
                repair_topics(groups, &state.page_summaries)
            } else {
                groups
            }
        })
        .filter(|groups| !groups.is_empty());

    let (groups, fallback) = match groups {
        Some(groups) => (groups, false),
        None => {
            warn!("Falling back to a single '{}' topic", FALLBACK_TOPIC_TITLE);
            (vec![fallback_topic(&state.page_summaries)], true)
        }
    };

    info!("Identified {} topics", groups.len());
    state.topic_count = groups.len();
    state.topic_groups = groups;
    Ok(fallback)
}

/// System instruction, the labelled summaries, then the closing instruction.
pub fn segment_messages(pages: &[PageSummary]) -> Vec<Message> {
    let block = summaries_block(pages.iter().map(|p| (p.page_number, p.summary.as_str())));
    vec![
        Message::system(SEGMENT_SYSTEM_PROMPT),
        Message::user(block),
        Message::user(SEGMENT_TASK),
    ]
}

/// Decode `{"topics": [...]}` from model output.
pub fn parse_topics(text: &str) -> Result<Vec<TopicGroup>, crate::error::ParseError> {
    parse_structured_as::<TopicsResponse>(text).map(|r| r.topics)
}

/// One topic covering every page in order, with range `1-N`.
pub fn fallback_topic(pages: &[PageSummary]) -> TopicGroup {
    TopicGroup {
        title: FALLBACK_TOPIC_TITLE.to_string(),
        slide_numbers: pages.iter().map(|p| p.page_number).collect(),
        slide_range: format!("1-{}", pages.len()),
        summaries: pages.iter().map(|p| p.summary.clone()).collect(),
    }
}

/// Make the topic assignment a partition of the summarised pages.
///
/// - slide numbers that are not summarised pages are dropped
/// - a page claimed by several topics stays with the first one
/// - an unclaimed page joins the topic holding the nearest earlier page,
///   or the first topic if there is none
/// - slide numbers are sorted, summaries are rebuilt from Stage 1 text and
///   `slide_range` is recomputed
/// - topics left with no pages are removed
pub fn repair_topics(groups: Vec<TopicGroup>, pages: &[PageSummary]) -> Vec<TopicGroup> {
    if groups.is_empty() {
        return groups;
    }

    let known: BTreeMap<usize, &str> = pages
        .iter()
        .map(|p| (p.page_number, p.summary.as_str()))
        .collect();

    let mut owner: BTreeMap<usize, usize> = BTreeMap::new();
    let mut dropped = 0usize;
    for (gi, group) in groups.iter().enumerate() {
        for &n in &group.slide_numbers {
            if known.contains_key(&n) && !owner.contains_key(&n) {
                owner.insert(n, gi);
            } else {
                dropped += 1;
            }
        }
    }

    let mut assigned = 0usize;
    for &n in known.keys() {
        if !owner.contains_key(&n) {
            let gi = owner.range(..n).next_back().map(|(_, &g)| g).unwrap_or(0);
            owner.insert(n, gi);
            assigned += 1;
        }
    }

    if dropped > 0 || assigned > 0 {
        warn!(
            "Repaired topic assignment: {} invalid or duplicate slide refs dropped, {} unassigned pages placed",
            dropped, assigned
        );
    }

    groups
        .into_iter()
        .enumerate()
        .filter_map(|(gi, group)| {
            let slide_numbers: Vec<usize> = owner
                .iter()
                .filter(|&(_, &g)| g == gi)
                .map(|(&n, _)| n)
                .collect();
            if slide_numbers.is_empty() {
                return None;
            }
            let summaries = slide_numbers
                .iter()
                .map(|n| known.get(n).copied().unwrap_or_default().to_string())
                .collect();
            let title = match group.title.trim() {
                "" => format!("Topic {}", gi + 1),
                t => t.to_string(),
            };
            Some(TopicGroup {
                title,
                slide_range: slide_range(&slide_numbers),
                slide_numbers,
                summaries,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(n: usize) -> Vec<PageSummary> {
        (1..=n).map(|i| PageSummary::new(i, format!("s{i}"))).collect()
    }

    fn group(title: &str, slides: &[usize]) -> TopicGroup {
        TopicGroup {
            title: title.into(),
            slide_numbers: slides.to_vec(),
            slide_range: String::new(),
            summaries: vec![],
        }
    }

    #[test]
    fn fallback_spans_every_page() {
        let t = fallback_topic(&pages(4));
        assert_eq!(t.title, "Main Content");
        assert_eq!(t.slide_numbers, vec![1, 2, 3, 4]);
        assert_eq!(t.slide_range, "1-4");
        assert_eq!(t.summaries, vec!["s1", "s2", "s3", "s4"]);
    }

    #[test]
    fn parse_topics_accepts_fenced_json() {
        let text = "```json\n{\"topics\":[{\"topic_title\":\"Intro\",\"slide_numbers\":[1,2,3],\"slides_range\":\"1-3\",\"summaries\":[\"a\",\"b\",\"c\"]}]}\n```";
        let topics = parse_topics(text).unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].title, "Intro");
        assert_eq!(topics[0].slide_range, "1-3");
    }

    #[test]
    fn parse_topics_rejects_wrong_shape() {
        assert!(parse_topics(r#"{"sections": []}"#).is_err());
    }

    #[test]
    fn repair_keeps_valid_partition() {
        let repaired = repair_topics(vec![group("A", &[1, 2]), group("B", &[3])], &pages(3));
        assert_eq!(repaired.len(), 2);
        assert_eq!(repaired[0].slide_numbers, vec![1, 2]);
        assert_eq!(repaired[0].summaries, vec!["s1", "s2"]);
        assert_eq!(repaired[1].slide_range, "3-3");
    }

    #[test]
    fn repair_drops_unknown_and_duplicate_pages() {
        let repaired = repair_topics(vec![group("A", &[1, 2, 9]), group("B", &[2, 3])], &pages(3));
        assert_eq!(repaired[0].slide_numbers, vec![1, 2]);
        assert_eq!(repaired[1].slide_numbers, vec![3]);
    }

    #[test]
    fn repair_places_missing_pages_after_nearest_earlier_page() {
        let repaired = repair_topics(vec![group("A", &[2]), group("B", &[4])], &pages(5));
        assert_eq!(repaired[0].slide_numbers, vec![1, 2, 3]);
        assert_eq!(repaired[1].slide_numbers, vec![4, 5]);
    }

    #[test]
    fn repair_range_shows_gaps_in_interleaved_topics() {
        let repaired = repair_topics(vec![group("A", &[1, 3]), group("B", &[2])], &pages(3));
        assert_eq!(repaired[0].slide_range, "1,3");
        assert_eq!(repaired[1].slide_range, "2-2");
    }

    #[test]
    fn repair_removes_empty_topics_and_names_untitled_ones() {
        let repaired = repair_topics(vec![group(" ", &[1, 2]), group("Ghost", &[7])], &pages(2));
        assert_eq!(repaired.len(), 1);
        assert_eq!(repaired[0].title, "Topic 1");
    }

    #[test]
    fn messages_label_pages() {
        let msgs = segment_messages(&pages(2));
        assert_eq!(msgs.len(), 3);
        assert!(msgs[1].text.contains("Page 2:\ns2"));
    }
}
