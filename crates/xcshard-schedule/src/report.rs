//! Rendering a [`PartitionResult`] for the command line.

use std::io::Write;

use serde::Serialize;
use xcshard_schemas::{PartitionSetData, ReportMetadata, ShardData, ShardingReport};

use crate::args::ArgumentDialect;
use crate::error::{ShardError, ShardErrorKind};
use crate::result::PartitionResult;

/// Builds the full report.
///
/// `partition_names` labels each partition set, usually the raw `-p` value.
/// Shard numbers are 1-based and keep counting across partition sets.
pub fn build_report(
    result: &PartitionResult,
    worker_count: usize,
    partition_names: &[String],
    dialect: ArgumentDialect,
) -> ShardingReport {
    let mut shard_number = 0;
    let partition_set_data = result
        .partition_sets
        .iter()
        .enumerate()
        .map(|(partition, shards)| {
            let ratios = result.test_time_imbalances.partitions.get(partition);
            let partitions = (0..shards.len())
                .map(|shard| {
                    shard_number += 1;
                    ShardData {
                        shard_number,
                        cli_arguments: dialect
                            .shard_arguments(result, partition, shard),
                        partition_imbalance_ratio: ratios
                            .and_then(|r| r.get(shard))
                            .copied()
                            .unwrap_or(1.0),
                    }
                })
                .collect();

            PartitionSetData {
                partition_set: partition_names
                    .get(partition)
                    .cloned()
                    .unwrap_or_default(),
                size: shards.len(),
                imbalance_ratio: result
                    .test_time_imbalances
                    .partition_set
                    .get(partition)
                    .copied()
                    .unwrap_or(1.0),
                partitions,
            }
        })
        .collect();

    ShardingReport {
        metadata: ReportMetadata {
            worker_count,
            partition_set_count: result.partition_sets.len(),
            total_time_in_ms: result.total_test_time,
            stats: result.stats,
        },
        partition_set_data,
    }
}

/// One argument list per shard, grouped by partition set.
pub fn abbreviated_arguments(
    result: &PartitionResult,
    dialect: ArgumentDialect,
) -> Vec<Vec<Vec<String>>> {
    dialect.all_arguments(result)
}

/// Writes `value` as pretty-printed JSON followed by a newline.
///
/// # Errors
///
/// Returns [`ShardError::is_serialization`] if encoding fails and
/// [`ShardError::is_io`] if the trailing newline cannot be written.
pub fn write_json<T: Serialize>(
    value: &T,
    mut output: impl Write,
) -> Result<(), ShardError> {
    serde_json::to_writer_pretty(&mut output, value)
        .map_err(|e| ShardError::new(ShardErrorKind::Serialization(e)))?;
    writeln!(output)?;
    Ok(())
}
