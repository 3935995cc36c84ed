//! Revalidation of units that gained content after completion
//!
//! When an instructor adds content to a unit a student already finished, the
//! backend lists that unit as needing review. Until the new items are
//! completed, every unit after it is blocked.

use serde::{Deserialize, Serialize};

use crate::content::{ContentGraph, ContentTag, UnitId, UnitNode};

/// Reference to a newly added item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContentRef {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
}

/// Items added since the student completed the unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContent {
    #[serde(default)]
    pub videos: Vec<NewContentRef>,
    #[serde(default)]
    pub documents: Vec<NewContentRef>,
}

/// Server-side completion summary for a flagged unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewCompletion {
    #[serde(default)]
    pub completed: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub percentage: f64,
}

/// One entry of `GET /units-needing-review`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitReview {
    pub unit_id: UnitId,
    #[serde(default)]
    pub unit_order: i64,
    #[serde(default)]
    pub new_content: NewContent,
    #[serde(default)]
    pub completion: ReviewCompletion,
}

/// Response of `GET /progression-status`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionStatus {
    #[serde(default)]
    pub is_blocked: bool,
    #[serde(default)]
    pub total_blocked_progression: u32,
}

/// An item still to be completed before progression resumes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemainingItem {
    pub id: String,
    pub title: String,
    pub kind: ContentTag,
}

impl UnitReview {
    fn new_items(&self) -> impl Iterator<Item = (&NewContentRef, ContentTag)> {
        self.new_content
            .videos
            .iter()
            .map(|r| (r, ContentTag::Video))
            .chain(self.new_content.documents.iter().map(|r| (r, ContentTag::Document)))
    }

    /// New items not yet completed locally. Items missing from the graph count
    /// as remaining.
    pub fn remaining_items(&self, graph: &ContentGraph) -> Vec<RemainingItem> {
        self.new_items()
            .filter(|(r, _)| !graph.item(&r.id).is_some_and(|item| item.is_complete()))
            .map(|(r, kind)| {
                let title = graph
                    .item(&r.id)
                    .map(|item| item.title.clone())
                    .unwrap_or_else(|| r.title.clone());
                RemainingItem { id: r.id.clone(), title, kind }
            })
            .collect()
    }

    /// Whether every newly added item is complete locally
    pub fn is_resolved(&self, graph: &ContentGraph) -> bool {
        self.new_items().next().is_some() && self.remaining_items(graph).is_empty()
    }
}

/// Drop review entries whose new content has since been completed
pub fn outstanding_reviews(graph: &ContentGraph, reviews: &[UnitReview]) -> Vec<UnitReview> {
    reviews.iter().filter(|review| !review.is_resolved(graph)).cloned().collect()
}

/// The earliest flagged unit that precedes `accessing_unit` in course order.
///
/// Returns `None` when nothing blocks access or when the accessed unit is not
/// part of the course.
pub fn blocked_by_unit(
    course_units: &[UnitNode],
    review_list: &[UnitReview],
    accessing_unit: &str,
) -> Option<UnitId> {
    let target = course_units.iter().position(|unit| unit.id == accessing_unit)?;

    course_units[..target]
        .iter()
        .find(|unit| review_list.iter().any(|review| review.unit_id == unit.id))
        .map(|unit| unit.id.clone())
}

/// Server and client disagree about progression; the server wins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionConflict {
    pub blocking_unit: UnitId,
    pub blocking_unit_title: String,
    pub remaining: Vec<RemainingItem>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{RawUnit, RawVideo};

    fn course() -> ContentGraph {
        let unit = |id: &str, order: i64, video_done: bool| RawUnit {
            id: id.into(),
            title: id.to_uppercase(),
            order: Some(order),
            videos: vec![RawVideo {
                id: format!("{id}-v"),
                title: format!("{id} video"),
                is_completed: Some(video_done),
                ..Default::default()
            }],
            ..Default::default()
        };
        ContentGraph::build(&[unit("a", 1, true), unit("b", 2, false), unit("c", 3, false)])
    }

    fn review(unit: &str, video: &str) -> UnitReview {
        UnitReview {
            unit_id: unit.into(),
            new_content: NewContent {
                videos: vec![NewContentRef { id: video.into(), title: String::new() }],
                documents: vec![],
            },
            ..Default::default()
        }
    }

    #[test]
    fn later_units_are_blocked_by_flagged_unit() {
        let graph = course();
        let reviews = vec![review("b", "b-v")];

        assert_eq!(blocked_by_unit(graph.units(), &reviews, "c"), Some("b".into()));
        assert_eq!(blocked_by_unit(graph.units(), &reviews, "b"), None);
        assert_eq!(blocked_by_unit(graph.units(), &reviews, "a"), None);
    }

    #[test]
    fn earliest_flagged_unit_wins() {
        let graph = course();
        let reviews = vec![review("b", "b-v"), review("a", "a-v")];
        assert_eq!(blocked_by_unit(graph.units(), &reviews, "c"), Some("a".into()));
    }

    #[test]
    fn unknown_unit_is_not_blocked() {
        let graph = course();
        assert_eq!(blocked_by_unit(graph.units(), &[review("a", "a-v")], "zzz"), None);
    }

    #[test]
    fn completed_new_content_resolves_review() {
        let graph = course();
        let reviews = vec![review("a", "a-v"), review("b", "b-v")];

        let outstanding = outstanding_reviews(&graph, &reviews);
        assert_eq!(outstanding.len(), 1);
        assert_eq!(outstanding[0].unit_id, "b");
    }

    #[test]
    fn remaining_items_use_local_titles() {
        let graph = course();
        let remaining = review("b", "b-v").remaining_items(&graph);
        assert_eq!(
            remaining,
            vec![RemainingItem {
                id: "b-v".into(),
                title: "b video".into(),
                kind: ContentTag::Video
            }]
        );
    }

    #[test]
    fn review_deserializes() {
        let json = r#"{"unitId":"b","unitOrder":2,"newContent":{"videos":[{"_id":"x","title":"X"}]},
                       "completion":{"completed":0,"total":1,"percentage":0}}"#;
        let review: UnitReview = serde_json::from_str(json).unwrap();
        assert_eq!(review.new_content.videos[0].id, "x");
        assert!(review.new_content.documents.is_empty());
    }
}
