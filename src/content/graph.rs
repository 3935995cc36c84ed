//! Ordering and merging of unit content
//!
//! Everything here is a pure transform of the backend payload and re-runs on
//! every refresh, so identical input always produces identical output.

use super::model::{
    ContentItem, ContentKind, DocumentSignals, QuizGate, QuizSignals, RawDocument, RawUnit,
    RawVideo, UnitNode, VideoSignals,
};

/// Merge a unit's videos, documents and quiz into one ordered sequence.
///
/// Items sort on `arrangedOrder`, then `order`, then `sequence`, falling back
/// to their position in the merged collections. The sort is stable, so equal
/// keys keep videos before documents before the quiz. The quiz, when the unit
/// declares one, always sorts last.
pub fn build_unit_sequence(unit: &RawUnit) -> Vec<ContentItem> {
    let mut items = Vec::with_capacity(unit.videos.len() + unit.reading_materials.len() + 1);

    for video in &unit.videos {
        let index = items.len();
        items.push(video_item(video, index));
    }

    for document in &unit.reading_materials {
        let index = items.len();
        items.push(document_item(document, index));
    }

    if let Some(gate) = quiz_gate(unit) {
        items.push(ContentItem {
            id: gate.quiz_id,
            title: gate.title,
            order: f64::INFINITY,
            original_index: items.len(),
            kind: ContentKind::Quiz(gate.signals),
            malformed: false,
        });
    }

    items.sort_by(|a, b| a.order.total_cmp(&b.order));
    items
}

/// Order a course's units by their declared order, falling back to their
/// position in the payload. Content is never merged across units.
pub fn build_course_sequence(units: &[RawUnit]) -> Vec<UnitNode> {
    let mut nodes: Vec<UnitNode> = units
        .iter()
        .enumerate()
        .map(|(index, unit)| UnitNode {
            id: unit.id.clone(),
            title: unit.title.clone(),
            order: unit.order.unwrap_or(index as i64),
            content: build_unit_sequence(unit),
            quiz_gate: quiz_gate(unit),
        })
        .collect();

    nodes.sort_by_key(|node| node.order);
    nodes
}

fn sort_key(
    arranged: Option<i64>,
    order: Option<i64>,
    sequence: Option<i64>,
    original_index: usize,
) -> f64 {
    arranged.or(order).or(sequence).map_or(original_index as f64, |key| key as f64)
}

fn video_item(raw: &RawVideo, original_index: usize) -> ContentItem {
    let (signals, malformed) = match VideoSignals::from_raw(raw) {
        Ok(signals) => (signals, false),
        Err(error) => {
            tracing::warn!(
                video = %raw.id,
                %error,
                "malformed video signals, treating as incomplete"
            );
            (VideoSignals::default(), true)
        }
    };

    ContentItem {
        id: raw.id.clone(),
        title: raw.title.clone(),
        order: sort_key(raw.arranged_order, raw.order, raw.sequence, original_index),
        original_index,
        kind: ContentKind::Video(signals),
        malformed,
    }
}

fn document_item(raw: &RawDocument, original_index: usize) -> ContentItem {
    let malformed = raw.id.is_empty();
    if malformed {
        tracing::warn!(title = %raw.title, "document without id, treating as incomplete");
    }

    ContentItem {
        id: raw.id.clone(),
        title: raw.title.clone(),
        order: sort_key(raw.arranged_order, raw.order, raw.sequence, original_index),
        original_index,
        kind: ContentKind::Document(DocumentSignals {
            is_read: raw.is_read.unwrap_or(false),
            is_completed: raw.is_completed.unwrap_or(false),
        }),
        malformed,
    }
}

fn quiz_gate(unit: &RawUnit) -> Option<QuizGate> {
    let pool = unit.quiz_pool.as_ref()?;
    let quiz_id = pool.id.clone().unwrap_or_else(|| format!("quiz-{}", unit.id));
    let title =
        if pool.title.is_empty() { format!("{} quiz", unit.title) } else { pool.title.clone() };

    Some(QuizGate { quiz_id, title, signals: QuizSignals::from_raw(pool) })
}

/// A course's units, built and indexed for lookup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentGraph {
    units: Vec<UnitNode>,
}

impl ContentGraph {
    /// Build the graph from the raw course payload
    pub fn build(units: &[RawUnit]) -> Self {
        Self { units: build_course_sequence(units) }
    }

    pub fn units(&self) -> &[UnitNode] {
        &self.units
    }

    pub fn unit(&self, id: &str) -> Option<&UnitNode> {
        self.units.iter().find(|unit| unit.id == id)
    }

    pub(crate) fn unit_mut(&mut self, id: &str) -> Option<&mut UnitNode> {
        self.units.iter_mut().find(|unit| unit.id == id)
    }

    /// Find an item anywhere in the course
    pub fn item(&self, id: &str) -> Option<&ContentItem> {
        self.units.iter().find_map(|unit| unit.item(id))
    }

    /// The unit containing an item
    pub fn unit_of(&self, item_id: &str) -> Option<&UnitNode> {
        self.units.iter().find(|unit| unit.item(item_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::model::{ContentTag, RawQuizPool};
    use pretty_assertions::assert_eq;

    fn video(id: &str, arranged: Option<i64>) -> RawVideo {
        RawVideo { id: id.into(), title: id.into(), arranged_order: arranged, ..Default::default() }
    }

    fn document(id: &str, order: Option<i64>) -> RawDocument {
        RawDocument { id: id.into(), title: id.into(), order, ..Default::default() }
    }

    fn ids(items: &[ContentItem]) -> Vec<&str> {
        items.iter().map(|item| item.id.as_str()).collect()
    }

    #[test]
    fn merges_by_arranged_order() {
        let unit = RawUnit {
            id: "u".into(),
            videos: vec![video("v1", Some(3)), video("v2", Some(1))],
            reading_materials: vec![document("d1", Some(2))],
            ..Default::default()
        };

        assert_eq!(ids(&build_unit_sequence(&unit)), vec!["v2", "d1", "v1"]);
    }

    #[test]
    fn arranged_order_beats_order_and_sequence() {
        let raw = RawVideo {
            id: "v".into(),
            arranged_order: Some(9),
            order: Some(1),
            sequence: Some(0),
            ..Default::default()
        };
        assert_eq!(video_item(&raw, 0).order, 9.0);

        let raw = RawVideo { id: "v".into(), sequence: Some(4), ..Default::default() };
        assert_eq!(video_item(&raw, 7).order, 4.0);
    }

    #[test]
    fn ties_keep_videos_before_documents() {
        let unit = RawUnit {
            id: "u".into(),
            videos: vec![video("v1", Some(1))],
            reading_materials: vec![document("d1", Some(1))],
            ..Default::default()
        };

        assert_eq!(ids(&build_unit_sequence(&unit)), vec!["v1", "d1"]);
    }

    #[test]
    fn missing_order_falls_back_to_original_index() {
        let unit = RawUnit {
            id: "u".into(),
            videos: vec![video("v1", None), video("v2", None)],
            reading_materials: vec![document("d1", None)],
            ..Default::default()
        };

        assert_eq!(ids(&build_unit_sequence(&unit)), vec!["v1", "v2", "d1"]);
    }

    #[test]
    fn quiz_is_always_last() {
        let unit = RawUnit {
            id: "u".into(),
            title: "Unit".into(),
            videos: vec![video("v1", Some(1000))],
            quiz_pool: Some(RawQuizPool::default()),
            ..Default::default()
        };

        let sequence = build_unit_sequence(&unit);
        assert_eq!(ids(&sequence), vec!["v1", "quiz-u"]);
        assert_eq!(sequence[1].tag(), ContentTag::Quiz);
        assert_eq!(sequence[1].title, "Unit quiz");
    }

    #[test]
    fn malformed_video_is_flagged() {
        let unit = RawUnit {
            id: "u".into(),
            videos: vec![RawVideo {
                id: "v".into(),
                duration: Some(-1.0),
                is_completed: Some(true),
                ..Default::default()
            }],
            ..Default::default()
        };

        let sequence = build_unit_sequence(&unit);
        assert!(sequence[0].malformed);
        assert!(!sequence[0].is_complete());
    }

    #[test]
    fn course_sequence_sorts_units() {
        let units = vec![
            RawUnit { id: "b".into(), order: Some(2), ..Default::default() },
            RawUnit { id: "a".into(), order: Some(1), ..Default::default() },
            RawUnit { id: "c".into(), order: None, ..Default::default() },
        ];

        let graph = ContentGraph::build(&units);
        let order: Vec<&str> = graph.units().iter().map(|unit| unit.id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn building_twice_is_identical() {
        let units = vec![RawUnit {
            id: "u".into(),
            videos: vec![video("v1", Some(2)), video("v2", Some(2))],
            reading_materials: vec![document("d1", None)],
            quiz_pool: Some(RawQuizPool { id: Some("q".into()), ..Default::default() }),
            ..Default::default()
        }];

        assert_eq!(ContentGraph::build(&units), ContentGraph::build(&units));
    }

    #[test]
    fn graph_lookups() {
        let units = vec![RawUnit {
            id: "u".into(),
            videos: vec![video("v1", None)],
            ..Default::default()
        }];
        let graph = ContentGraph::build(&units);

        assert_eq!(graph.unit_of("v1").map(|u| u.id.as_str()), Some("u"));
        assert!(graph.item("missing").is_none());
        assert_eq!(graph.unit("u").map(|u| u.content.len()), Some(1));
    }
}
