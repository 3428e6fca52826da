//! Proportional allocation of workers across partitions.
//!
//! Every partition first gets one reserved shard. The remaining
//! `workers - partitions` shards are spread in proportion to each
//! partition's total duration, rounded down, and capped by the partition's
//! class count. Rounding leaves a few workers over; they are handed out one
//! at a time from a worklist sorted by ascending duration, taking from the
//! back and re-queueing at the front, so spare workers rotate starting from
//! the heaviest partition.

use std::collections::VecDeque;

use tracing::{debug, debug_span, info};
use xcshard_schemas::ShardOptions;

use crate::durations::{DurationTable, class_count, total_duration};
use crate::error::{ShardError, ShardErrorKind};

/// A partition together with the number of shards it was given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionAllocation {
    /// The partition's slice of the duration table.
    pub durations: DurationTable,
    /// Shards allocated to this partition.
    pub shard_count: usize,
    /// Sum of the partition's durations in milliseconds.
    pub partition_time: u64,
    /// Most shards this partition can use.
    pub max_shard_count: usize,
    /// The partition's options.
    pub options: ShardOptions,
}

/// Allocates `worker_count` shards across `partitions`.
///
/// `options` is indexed like `partitions`; missing entries use defaults.
/// The sum of the returned shard counts equals `worker_count` unless
/// `allow_fewer_shards` is set and every partition is already at its cap.
///
/// # Errors
///
/// Returns [`ShardError::is_insufficient_shards`] when workers are left
/// over after every partition reached its cap.
#[expect(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "shard shares are small counts; the floored share is clamped at zero"
)]
pub fn allocate_shards(
    worker_count: usize,
    partitions: Vec<DurationTable>,
    options: &[ShardOptions],
    allow_fewer_shards: bool,
) -> Result<Vec<PartitionAllocation>, ShardError> {
    let _span = debug_span!("allocate_shards", worker_count).entered();

    let total: u64 = partitions.iter().map(total_duration).sum();
    let assignable = worker_count as f64 - partitions.len() as f64;

    let mut used_shards = 0;
    let mut allocations: Vec<PartitionAllocation> = partitions
        .into_iter()
        .enumerate()
        .map(|(index, durations)| {
            let options = options.get(index).copied().unwrap_or_default();
            let partition_time = total_duration(&durations);

            // Classes, even when whole targets are packed: the packer then
            // reports or drops the shards it cannot fill.
            let mut max_shard_count = class_count(&durations).max(1);
            if let Some(cap) = options.max_shard_count {
                max_shard_count = max_shard_count.min(cap);
            }

            let share = if total == 0 {
                0.0
            } else {
                (assignable * partition_time as f64 / total as f64).floor()
            };
            let shard_count =
                ((1.0 + share).max(0.0) as usize).min(max_shard_count);
            used_shards += shard_count;

            debug!(
                index,
                partition_time,
                shard_count,
                max_shard_count,
                "initial allocation"
            );
            PartitionAllocation {
                durations,
                shard_count,
                partition_time,
                max_shard_count,
                options,
            }
        })
        .collect();

    let mut can_grow: Vec<usize> = (0..allocations.len())
        .filter(|&i| allocations[i].shard_count < allocations[i].max_shard_count)
        .collect();
    can_grow.sort_by_key(|&i| allocations[i].partition_time);
    let mut worklist = VecDeque::from(can_grow);

    while used_shards < worker_count {
        let Some(index) = worklist.pop_back() else {
            if allow_fewer_shards {
                info!(
                    requested = worker_count,
                    allocated = used_shards,
                    "every partition is at its cap, using fewer shards"
                );
                break;
            }
            return Err(ShardError::new(ShardErrorKind::InsufficientShards {
                extra: worker_count - used_shards,
            }));
        };

        let allocation = &mut allocations[index];
        allocation.shard_count += 1;
        used_shards += 1;
        if allocation.shard_count < allocation.max_shard_count {
            worklist.push_front(index);
        }
    }

    Ok(allocations)
}
