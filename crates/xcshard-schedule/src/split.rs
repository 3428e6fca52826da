//! Splitting the duration table into declared partitions.
//!
//! A target listed in several partitions is copied into each of them, so
//! its tests run once per partition set.

use indexmap::IndexSet;

use crate::durations::DurationTable;
use crate::error::{ShardError, ShardErrorKind};

/// Returns one duration table per partition, in declaration order.
///
/// # Errors
///
/// Returns [`ShardError::is_empty_partition`] naming the first partition
/// that received no tests.
pub fn split_into_partitions(
    table: &DurationTable,
    partitions: &[IndexSet<String>],
) -> Result<Vec<DurationTable>, ShardError> {
    let mut slices = vec![DurationTable::new(); partitions.len()];
    for (target, classes) in table {
        for (slice, partition) in slices.iter_mut().zip(partitions) {
            if partition.contains(target) {
                slice.insert(target.clone(), classes.clone());
            }
        }
    }

    if let Some(index) = slices.iter().position(DurationTable::is_empty) {
        return Err(ShardError::new(ShardErrorKind::EmptyPartition {
            targets: partitions[index].iter().cloned().collect(),
        }));
    }
    Ok(slices)
}
