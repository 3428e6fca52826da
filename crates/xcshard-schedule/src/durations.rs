//! Per-class duration aggregation and extrapolation.
//!
//! Historical test events are summed per (target, class) in integer
//! milliseconds. Each event is rounded up on its own, so a class with many
//! short tests is never estimated at zero. When a current stream is
//! available, tests that vanished are dropped and tests without history are
//! given an estimate:
//!
//! ```text
//! new target:  median(all class durations) / class_count   (or 1000 ms)
//! new class:   median(the target's class durations)
//! ```
//!
//! The median is the element at index `len / 2` of the sorted values.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::{debug, debug_span};
use xcshard_schemas::ResultStats;

use crate::current::{CurrentTests, KnownTests};
use crate::error::ShardError;
use crate::events::{RecordStream, TestEvent, TestEvents};

/// Cumulative milliseconds per class of one target.
pub type ClassDurations = IndexMap<String, u64>;

/// Cumulative milliseconds per target and class, in first-seen order.
pub type DurationTable = IndexMap<String, ClassDurations>;

/// Estimate used for a new target when no history exists at all.
pub const DEFAULT_EXTRAPOLATED_DURATION_MS: u64 = 1000;

/// Converts seconds to milliseconds, rounding up.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "value is clamped to be non-negative and test durations are far below u64::MAX ms"
)]
pub fn seconds_to_millis(seconds: f64) -> u64 {
    (seconds * 1000.0).ceil().max(0.0) as u64
}

/// Sum of every duration in the table.
pub fn total_duration(table: &DurationTable) -> u64 {
    table.values().flat_map(IndexMap::values).sum()
}

/// Number of classes across all targets in the table.
pub fn class_count(table: &DurationTable) -> usize {
    table.values().map(IndexMap::len).sum()
}

/// Element at index `len / 2` of the ascending-sorted values.
pub fn median(values: impl IntoIterator<Item = u64>) -> Option<u64> {
    let mut sorted: Vec<u64> = values.into_iter().collect();
    sorted.sort_unstable();
    sorted.get(sorted.len() / 2).copied()
}

/// Builds the duration table from the historical stream.
///
/// Only targets in `relevant_targets` are considered. Every relevant test
/// event bumps `stats.historical_total_tests`, even when the current stream
/// says the test no longer exists. Extrapolation runs afterwards when
/// `current` is [`CurrentTests::Known`].
///
/// # Errors
///
/// Propagates stream errors, including a test outside any target.
pub fn aggregate_durations(
    historical: RecordStream<'_>,
    current: &CurrentTests,
    relevant_targets: &HashSet<String>,
    stats: &mut ResultStats,
) -> Result<DurationTable, ShardError> {
    let _span = debug_span!("aggregate_durations").entered();

    let mut table = DurationTable::new();
    for event in TestEvents::new(historical) {
        let TestEvent::TestEnd {
            target_name,
            class_name,
            duration_seconds,
        } = event?
        else {
            continue;
        };
        if !relevant_targets.contains(&target_name) {
            continue;
        }

        stats.historical_total_tests += 1;
        if !current.is_known_class(&target_name, &class_name) {
            continue;
        }

        *table
            .entry(target_name)
            .or_default()
            .entry(class_name)
            .or_default() += seconds_to_millis(duration_seconds);
    }

    if let CurrentTests::Known(known) = current {
        extrapolate(known, &mut table, stats);
    }

    debug!(
        targets = table.len(),
        classes = class_count(&table),
        historical_total_tests = stats.historical_total_tests,
        "aggregated durations"
    );
    Ok(table)
}

/// Fills in durations for current tests that have no history.
///
/// Medians are taken from the table as it was before any estimate was
/// added.
pub fn extrapolate(
    known: &KnownTests,
    table: &mut DurationTable,
    stats: &mut ResultStats,
) {
    let target_medians: IndexMap<String, u64> = table
        .iter()
        .filter_map(|(target, classes)| {
            median(classes.values().copied()).map(|m| (target.clone(), m))
        })
        .collect();
    let overall_median = median(table.values().flat_map(|c| c.values().copied()));

    for (target, class_set) in known.targets() {
        if let Some(classes) = table.get_mut(target) {
            let target_median = target_medians.get(target).copied().unwrap_or(0);
            for class in class_set {
                if !classes.contains_key(class) {
                    stats.class_extrapolations += 1;
                    classes.insert(class.clone(), target_median);
                }
            }
        } else {
            stats.target_extrapolations += 1;
            let estimate = extrapolated_duration(overall_median, class_set.len());
            debug!(%target, estimate_ms = estimate, "extrapolating new target");
            let classes = table.entry(target.clone()).or_default();
            for class in class_set {
                stats.class_extrapolations += 1;
                classes.insert(class.clone(), estimate);
            }
        }
    }
}

/// Per-class estimate for a target with no history.
fn extrapolated_duration(overall_median: Option<u64>, class_count: usize) -> u64 {
    match overall_median {
        None => DEFAULT_EXTRAPOLATED_DURATION_MS,
        Some(m) => m / (class_count.max(1) as u64),
    }
}
