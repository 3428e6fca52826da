//! Test-runner argument dialects for a shard.
//!
//! - xctool: `-only Target:ClassA,ClassB`
//! - xcodebuild: `-only-testing:Target/Class`, optionally collapsed to
//!   `-only-testing:Target` when the shard runs the whole target and no
//!   other partition holds a different slice of it
//! - xcodebuild skip list: `-skip-testing:Target` and
//!   `-skip-testing:Target/Class` for everything the shard must not run
//!
//! Class lists are sorted so the output does not depend on placement order.

use indexmap::IndexMap;
use itertools::Itertools;

use crate::durations::{ClassDurations, DurationTable};
use crate::result::PartitionResult;

/// Classes per target assigned to one shard.
pub type TestMap = IndexMap<String, Vec<String>>;

/// How a shard's selection is spelled for the test runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArgumentDialect {
    /// `-only Target:Class,...` pairs.
    #[default]
    Xctool,
    /// `-only-testing:` entries.
    Xcodebuild {
        /// Emit `-only-testing:Target` when every class is selected.
        collapse_targets: bool,
    },
    /// `-skip-testing:` entries relative to every partition's tests.
    XcodebuildSkip,
}

impl ArgumentDialect {
    /// Arguments for shard `shard` of partition `partition` in `result`.
    ///
    /// Returns an empty list when the indices are out of range.
    pub fn shard_arguments(
        self,
        result: &PartitionResult,
        partition: usize,
        shard: usize,
    ) -> Vec<String> {
        let Some(assignment) = result
            .partition_sets
            .get(partition)
            .and_then(|shards| shards.get(shard))
        else {
            return Vec::new();
        };
        let test_map = &assignment.test_map;

        match self {
            Self::Xctool => xctool_only_arguments(test_map),
            Self::Xcodebuild {
                collapse_targets: false,
            } => xcodebuild_only_arguments(test_map),
            Self::Xcodebuild {
                collapse_targets: true,
            } => xcodebuild_collapsed_only_arguments(
                test_map,
                &result.partition_tables,
                partition,
            ),
            Self::XcodebuildSkip => {
                xcodebuild_skip_arguments(test_map, &result.test_time_for_partitions)
            }
        }
    }

    /// Arguments for every shard, grouped by partition.
    pub fn all_arguments(self, result: &PartitionResult) -> Vec<Vec<Vec<String>>> {
        result
            .partition_sets
            .iter()
            .enumerate()
            .map(|(partition, shards)| {
                (0..shards.len())
                    .map(|shard| self.shard_arguments(result, partition, shard))
                    .collect()
            })
            .collect()
    }
}

/// `-only Target:ClassA,ClassB` for every target on the shard.
pub fn xctool_only_arguments(test_map: &TestMap) -> Vec<String> {
    test_map
        .iter()
        .flat_map(|(target, classes)| {
            [
                "-only".to_owned(),
                format!("{target}:{}", classes.iter().sorted().join(",")),
            ]
        })
        .collect()
}

/// `-only-testing:Target/Class` for every class on the shard.
pub fn xcodebuild_only_arguments(test_map: &TestMap) -> Vec<String> {
    test_map
        .iter()
        .flat_map(|(target, classes)| {
            classes
                .iter()
                .sorted()
                .map(move |class| format!("-only-testing:{target}/{class}"))
        })
        .collect()
}

/// Like [`xcodebuild_only_arguments`], but a target becomes a single
/// `-only-testing:Target` when the shard holds every class that
/// `partition_tables[partition]` lists for it and no other partition lists
/// a different set of classes for the same target.
pub fn xcodebuild_collapsed_only_arguments(
    test_map: &TestMap,
    partition_tables: &[DurationTable],
    partition: usize,
) -> Vec<String> {
    test_map
        .iter()
        .flat_map(|(target, classes)| {
            let whole_target = partition_tables
                .get(partition)
                .and_then(|table| table.get(target))
                .is_some_and(|all| {
                    all.keys().all(|class| classes.contains(class))
                        && !sibling_slices_target(
                            partition_tables,
                            partition,
                            target,
                            all,
                        )
                });
            if whole_target {
                vec![format!("-only-testing:{target}")]
            } else {
                classes
                    .iter()
                    .sorted()
                    .map(|class| format!("-only-testing:{target}/{class}"))
                    .collect()
            }
        })
        .collect()
}

fn sibling_slices_target(
    partition_tables: &[DurationTable],
    partition: usize,
    target: &str,
    classes: &ClassDurations,
) -> bool {
    partition_tables
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != partition)
        .filter_map(|(_, table)| table.get(target))
        .any(|other| {
            other.len() != classes.len()
                || other.keys().any(|class| !classes.contains_key(class))
        })
}

/// Skips every target in `all_tests` the shard does not touch and every
/// class of a touched target that the shard does not run.
pub fn xcodebuild_skip_arguments(
    test_map: &TestMap,
    all_tests: &DurationTable,
) -> Vec<String> {
    all_tests
        .iter()
        .flat_map(|(target, classes)| match test_map.get(target) {
            None => vec![format!("-skip-testing:{target}")],
            Some(selected) => classes
                .keys()
                .filter(|class| !selected.contains(*class))
                .sorted()
                .map(|class| format!("-skip-testing:{target}/{class}"))
                .collect(),
        })
        .collect()
}
