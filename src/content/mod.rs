//! Course content: raw payloads, typed items and sequence building

pub mod graph;
pub mod model;

pub use graph::{ContentGraph, build_course_sequence, build_unit_sequence};
pub use model::{
    ContentId, ContentItem, ContentKind, ContentTag, DocumentSignals, QuizGate, QuizSignals,
    RawDocument, RawQuizPool, RawUnit, RawVideo, UnitId, UnitNode, ValidationError, VideoSignals,
};
