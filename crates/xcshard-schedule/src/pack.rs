//! Longest-processing-time-first packing of one partition onto shards.
//!
//! Spreading independent units over `k` identical workers to minimize the
//! longest worker is NP-hard. Placing units in descending duration order,
//! each onto the currently least-loaded worker, keeps the makespan within
//! twice the optimum.

use tracing::{debug, debug_span};
use xcshard_schemas::{ShardAssignment, ShardOptions};

use crate::durations::DurationTable;
use crate::error::{ShardError, ShardErrorKind};

/// A group of classes that must land on the same shard.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Unit<'a> {
    target: &'a str,
    classes: Vec<&'a str>,
    duration: u64,
}

/// Flattens the table into units, either per class or per target.
fn collect_units<'a>(table: &'a DurationTable, options: &ShardOptions) -> Vec<Unit<'a>> {
    if options.split_bundles_across_machines {
        table
            .iter()
            .flat_map(|(target, classes)| {
                classes.iter().map(move |(class, &duration)| Unit {
                    target,
                    classes: vec![class.as_str()],
                    duration,
                })
            })
            .collect()
    } else {
        table
            .iter()
            .map(|(target, classes)| Unit {
                target,
                classes: classes.keys().map(String::as_str).collect(),
                duration: classes.values().sum(),
            })
            .collect()
    }
}

/// Packs one partition's tests onto `shard_count` shards.
///
/// Ties between equally loaded shards go to the lowest index, so results
/// are deterministic.
///
/// # Errors
///
/// - [`ShardError::is_not_enough_workers`] when `shard_count` is zero
/// - [`ShardError::is_empty_partition_table`] when `table` is empty
/// - [`ShardError::is_too_many_shards`] when some shards stay empty and
///   `options.allow_fewer_shards` is not set
pub fn compute_single_shards(
    shard_count: usize,
    table: &DurationTable,
    options: &ShardOptions,
) -> Result<Vec<ShardAssignment>, ShardError> {
    let _span = debug_span!("compute_single_shards", shard_count).entered();

    if shard_count == 0 {
        return Err(ShardError::new(ShardErrorKind::NotEnoughWorkers));
    }
    if table.is_empty() {
        return Err(ShardError::new(ShardErrorKind::EmptyPartitionTable));
    }

    let mut units = collect_units(table, options);
    // Stable, so equal durations keep table order.
    units.sort_by(|a, b| b.duration.cmp(&a.duration));

    let mut assignments = vec![ShardAssignment::default(); shard_count];
    for unit in units {
        let shard = assignments
            .iter_mut()
            .min_by_key(|a| a.total_time_ms)
            .expect("shard_count is non-zero");
        shard
            .test_map
            .entry(unit.target.to_owned())
            .or_default()
            .extend(unit.classes.into_iter().map(str::to_owned));
        shard.total_time_ms += unit.duration;
    }

    let empty = assignments.iter().filter(|a| a.is_empty()).count();
    if empty > 0 {
        if !options.allow_fewer_shards {
            return Err(ShardError::new(ShardErrorKind::TooManyShards {
                empty,
                requested: shard_count,
                unit: options.unit_name(),
            }));
        }
        debug!(empty, "dropping empty shards");
        assignments.retain(|a| !a.is_empty());
    }

    Ok(assignments)
}

/// Longest shard time, the quantity the packer approximately minimizes.
pub fn makespan(assignments: &[ShardAssignment]) -> u64 {
    assignments
        .iter()
        .map(|a| a.total_time_ms)
        .max()
        .unwrap_or(0)
}
