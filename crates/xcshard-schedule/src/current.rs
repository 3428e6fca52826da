//! Index of the tests that exist right now.
//!
//! The optional "current" stream lists tests without meaningful timings
//! (typically a dump of the test bundles). It gates which historical
//! timings are still valid and which tests need extrapolated durations.

use std::collections::HashSet;

use indexmap::{IndexMap, IndexSet};

use crate::error::ShardError;
use crate::events::{RecordStream, TestEvent, TestEvents};

/// Which tests are known to exist.
#[derive(Debug, Clone, Default)]
pub enum CurrentTests {
    /// No current stream was given: every target and class counts as
    /// existing and nothing is extrapolated.
    #[default]
    Unrestricted,
    /// Tests observed in the current stream.
    Known(KnownTests),
}

/// Classes per relevant target, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct KnownTests {
    classes: IndexMap<String, IndexSet<String>>,
    total_tests: usize,
}

impl KnownTests {
    /// Iterates over targets and their class sets in first-seen order.
    pub fn targets(&self) -> impl Iterator<Item = (&String, &IndexSet<String>)> {
        self.classes.iter()
    }
}

impl CurrentTests {
    /// Indexes the current stream, keeping only `relevant_targets`.
    ///
    /// `None` yields [`CurrentTests::Unrestricted`].
    ///
    /// # Errors
    ///
    /// Propagates stream errors, including a test outside any target.
    pub fn analyze(
        events: Option<RecordStream<'_>>,
        relevant_targets: &HashSet<String>,
    ) -> Result<Self, ShardError> {
        let Some(records) = events else {
            return Ok(Self::Unrestricted);
        };

        let mut known = KnownTests::default();
        for event in TestEvents::new(records) {
            let TestEvent::TestEnd {
                target_name,
                class_name,
                ..
            } = event?
            else {
                continue;
            };
            if !relevant_targets.contains(&target_name) {
                continue;
            }
            known.total_tests += 1;
            known
                .classes
                .entry(target_name)
                .or_default()
                .insert(class_name);
        }
        Ok(Self::Known(known))
    }

    /// Returns true if `target` currently has tests.
    pub fn is_known_target(&self, target: &str) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Known(known) => known.classes.contains_key(target),
        }
    }

    /// Returns true if `class` currently exists in `target`.
    pub fn is_known_class(&self, target: &str, class: &str) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Known(known) => known
                .classes
                .get(target)
                .is_some_and(|classes| classes.contains(class)),
        }
    }

    /// Number of relevant test events in the current stream.
    pub fn total_tests(&self) -> usize {
        match self {
            Self::Unrestricted => 0,
            Self::Known(known) => known.total_tests,
        }
    }
}

#[cfg(test)]
mod tests {
    use xcshard_schemas::StreamRecord;

    use super::*;
    use crate::events::record_stream;

    fn relevant(targets: &[&str]) -> HashSet<String> {
        targets.iter().map(|&t| t.to_owned()).collect()
    }

    #[test]
    fn absent_stream_knows_everything() {
        let current = CurrentTests::analyze(None, &relevant(&["T1"])).unwrap();

        assert!(current.is_known_target("Anything"));
        assert!(current.is_known_class("Anything", "AnyClass"));
        assert_eq!(current.total_tests(), 0);
    }

    #[test]
    fn indexes_relevant_targets_only() {
        let stream = record_stream(vec![
            StreamRecord::target_begin("T1"),
            StreamRecord::test_end("A", "test1", 0.0),
            StreamRecord::test_end("A", "test2", 0.0),
            StreamRecord::test_end("B", "test1", 0.0),
            StreamRecord::target_begin("Other"),
            StreamRecord::test_end("C", "test1", 0.0),
        ]);
        let current =
            CurrentTests::analyze(Some(stream), &relevant(&["T1"])).unwrap();

        assert_eq!(current.total_tests(), 3);
        assert!(current.is_known_target("T1"));
        assert!(!current.is_known_target("Other"));
        assert!(current.is_known_class("T1", "B"));
        assert!(!current.is_known_class("T1", "C"));
        assert!(!current.is_known_class("Other", "C"));

        let CurrentTests::Known(known) = current else {
            panic!("a stream was supplied");
        };
        let classes: Vec<_> = known.targets().next().unwrap().1.iter().collect();
        assert_eq!(classes, ["A", "B"]);
    }

    #[test]
    fn empty_stream_knows_nothing() {
        let current = CurrentTests::analyze(
            Some(record_stream(Vec::new())),
            &relevant(&["T1"]),
        )
        .unwrap();
        assert!(!current.is_known_target("T1"));
        assert_eq!(current.total_tests(), 0);
    }

    #[test]
    fn propagates_stream_errors() {
        let stream =
            record_stream(vec![StreamRecord::test_end("A", "test1", 0.0)]);
        let err = CurrentTests::analyze(Some(stream), &relevant(&["T1"]))
            .unwrap_err();
        assert!(err.is_stream_parsing());
    }
}
