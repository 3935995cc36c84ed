//! Quiz attempt precedence
//!
//! A unit's quiz gate is decided by its best attempt. A pass always beats a
//! fail, so a late-arriving failed attempt can never re-lock a unit.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::content::{UnitId, UnitNode};

/// One submitted quiz attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub unit_id: UnitId,
    pub passed: bool,
    #[serde(default)]
    pub score_percent: Option<f64>,
    /// Unix timestamp (ms)
    #[serde(default)]
    pub submitted_at: i64,
}

impl QuizAttempt {
    /// Whether this attempt should replace `current` as the unit's result
    fn supersedes(&self, current: &QuizAttempt) -> bool {
        match (self.passed, current.passed) {
            (true, false) => true,
            (false, true) => false,
            _ => self.submitted_at >= current.submitted_at,
        }
    }
}

/// Best quiz result per unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuizResults {
    best: HashMap<UnitId, QuizAttempt>,
}

impl QuizResults {
    /// Seed results from the quiz summaries embedded in the course payload
    pub fn from_units(units: &[UnitNode]) -> Self {
        let mut results = Self::default();
        for unit in units {
            if let Some(gate) = &unit.quiz_gate {
                if gate.signals.attempts_taken > 0 || gate.signals.passed {
                    results.record(QuizAttempt {
                        unit_id: unit.id.clone(),
                        passed: gate.signals.passed,
                        score_percent: gate.signals.score_percent,
                        submitted_at: 0,
                    });
                }
            }
        }
        results
    }

    /// Record an attempt, returning whether it became the unit's result
    pub fn record(&mut self, attempt: QuizAttempt) -> bool {
        match self.best.get(&attempt.unit_id) {
            Some(current) if !attempt.supersedes(current) => false,
            _ => {
                self.best.insert(attempt.unit_id.clone(), attempt);
                true
            }
        }
    }

    /// The authoritative attempt for a unit
    pub fn best(&self, unit_id: &str) -> Option<&QuizAttempt> {
        self.best.get(unit_id)
    }

    /// Whether the unit's quiz has been passed
    pub fn passed(&self, unit_id: &str) -> bool {
        self.best(unit_id).is_some_and(|attempt| attempt.passed)
    }

    pub fn len(&self) -> usize {
        self.best.len()
    }

    pub fn is_empty(&self) -> bool {
        self.best.is_empty()
    }
}

impl FromIterator<QuizAttempt> for QuizResults {
    fn from_iter<I: IntoIterator<Item = QuizAttempt>>(iter: I) -> Self {
        let mut results = Self::default();
        for attempt in iter {
            results.record(attempt);
        }
        results
    }
}

impl Extend<QuizAttempt> for QuizResults {
    fn extend<I: IntoIterator<Item = QuizAttempt>>(&mut self, iter: I) {
        for attempt in iter {
            self.record(attempt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(unit: &str, passed: bool, submitted_at: i64) -> QuizAttempt {
        QuizAttempt { unit_id: unit.into(), passed, score_percent: None, submitted_at }
    }

    #[test]
    fn older_pass_beats_newer_fail() {
        let results: QuizResults =
            [attempt("u", false, 200), attempt("u", true, 100)].into_iter().collect();

        let best = results.best("u").unwrap();
        assert!(best.passed);
        assert_eq!(best.submitted_at, 100);
    }

    #[test]
    fn fail_never_downgrades_pass() {
        let mut results = QuizResults::default();
        assert!(results.record(attempt("u", true, 100)));
        assert!(!results.record(attempt("u", false, 300)));
        assert!(results.passed("u"));
    }

    #[test]
    fn most_recent_wins_among_equals() {
        let attempts =
            [attempt("u", false, 100), attempt("u", false, 300), attempt("u", false, 200)];
        let results: QuizResults = attempts.into_iter().collect();
        assert_eq!(results.best("u").unwrap().submitted_at, 300);

        let results: QuizResults =
            [attempt("u", true, 300), attempt("u", true, 100)].into_iter().collect();
        assert_eq!(results.best("u").unwrap().submitted_at, 300);
    }

    #[test]
    fn unknown_unit_is_not_passed() {
        assert!(!QuizResults::default().passed("nope"));
    }
}
