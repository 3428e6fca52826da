//! Final result of a shard computation.

use indexmap::IndexMap;
use xcshard_schemas::{ResultStats, ShardAssignment, TimeImbalances};

use crate::durations::DurationTable;

/// Shards for every declared partition, with diagnostics.
///
/// The imbalance ratios describe the schedule; they are never fed back into
/// it.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionResult {
    /// Counters from reading the streams.
    pub stats: ResultStats,
    /// Shards grouped by partition, in declaration order.
    pub partition_sets: Vec<Vec<ShardAssignment>>,
    /// Sum of every shard's time.
    pub total_test_time: u64,
    /// Load-balance ratios.
    pub test_time_imbalances: TimeImbalances,
    /// Duration table of each partition.
    pub partition_tables: Vec<DurationTable>,
    /// Union of every partition's duration table.
    pub test_time_for_partitions: DurationTable,
}

impl PartitionResult {
    /// Assembles the result from per-partition shards and tables.
    pub fn assemble(
        stats: ResultStats,
        partition_sets: Vec<Vec<ShardAssignment>>,
        partition_tables: Vec<DurationTable>,
    ) -> Self {
        let test_times = shard_times(&partition_sets);
        let total_test_time = test_times.iter().flatten().sum();
        let test_time_imbalances = compute_imbalances(&test_times);

        let mut test_time_for_partitions = DurationTable::new();
        for table in &partition_tables {
            for (target, classes) in table {
                test_time_for_partitions.insert(target.clone(), classes.clone());
            }
        }

        Self {
            stats,
            partition_sets,
            total_test_time,
            test_time_imbalances,
            partition_tables,
            test_time_for_partitions,
        }
    }

    /// Classes per target for every shard, grouped by partition.
    pub fn test_maps(&self) -> Vec<Vec<&IndexMap<String, Vec<String>>>> {
        self.partition_sets
            .iter()
            .map(|shards| shards.iter().map(|s| &s.test_map).collect())
            .collect()
    }

    /// Time of every shard, grouped by partition.
    pub fn test_times(&self) -> Vec<Vec<u64>> {
        shard_times(&self.partition_sets)
    }
}

fn shard_times(partition_sets: &[Vec<ShardAssignment>]) -> Vec<Vec<u64>> {
    partition_sets
        .iter()
        .map(|shards| shards.iter().map(|s| s.total_time_ms).collect())
        .collect()
}

/// Partition-set ratios compare each partition's average shard time with
/// the mean of those averages. Intra-partition ratios compare each shard
/// with its partition's average. A zero reference time reads as perfect
/// balance.
#[expect(
    clippy::cast_precision_loss,
    reason = "ratios are diagnostics; millisecond totals fit comfortably in f64"
)]
fn compute_imbalances(times: &[Vec<u64>]) -> TimeImbalances {
    let averages: Vec<f64> = times
        .iter()
        .map(|shards| ratio(shards.iter().sum::<u64>() as f64, shards.len() as f64))
        .collect();
    let ideal = ratio(averages.iter().sum::<f64>(), times.len() as f64);
    let partition_set = averages.iter().map(|&avg| ratio(avg, ideal)).collect();

    let partitions = times
        .iter()
        .map(|shards| {
            let total = shards.iter().sum::<u64>() as f64;
            shards
                .iter()
                .map(|&time| ratio(time as f64 * shards.len() as f64, total))
                .collect()
        })
        .collect();

    TimeImbalances {
        partition_set,
        partitions,
    }
}

fn ratio(value: f64, reference: f64) -> f64 {
    if reference > 0.0 { value / reference } else { 1.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shard(target: &str, classes: &[&str], total_time_ms: u64) -> ShardAssignment {
        ShardAssignment {
            test_map: [(
                target.to_owned(),
                classes.iter().map(|&c| c.to_owned()).collect(),
            )]
            .into_iter()
            .collect(),
            total_time_ms,
        }
    }

    #[test]
    fn computes_totals_and_imbalances() {
        let result = PartitionResult::assemble(
            ResultStats::default(),
            vec![
                vec![shard("P1", &["TestClass1"], 1000)],
                vec![
                    shard("P2", &["TestClass2"], 4000),
                    shard("P2", &["TestClass3"], 4000),
                ],
            ],
            Vec::new(),
        );

        assert_eq!(result.test_times(), vec![vec![1000], vec![4000, 4000]]);
        assert_eq!(result.total_test_time, 9000);
        assert_eq!(
            result.test_time_imbalances,
            TimeImbalances {
                partition_set: vec![0.4, 1.6],
                partitions: vec![vec![1.0], vec![1.0, 1.0]],
            }
        );
    }

    #[test]
    fn uneven_shards_show_intra_partition_imbalance() {
        let result = PartitionResult::assemble(
            ResultStats::default(),
            vec![vec![shard("T", &["A"], 3000), shard("T", &["B"], 1000)]],
            Vec::new(),
        );
        assert_eq!(
            result.test_time_imbalances.partitions,
            vec![vec![1.5, 0.5]]
        );
        assert_eq!(result.test_time_imbalances.partition_set, vec![1.0]);
    }

    #[test]
    fn zero_time_partitions_are_balanced() {
        let result = PartitionResult::assemble(
            ResultStats::default(),
            vec![
                vec![shard("T", &["A"], 0), shard("T", &["B"], 0)],
                vec![shard("U", &["C"], 0)],
            ],
            Vec::new(),
        );
        let imbalances = &result.test_time_imbalances;
        assert_eq!(imbalances.partition_set, vec![1.0, 1.0]);
        assert_eq!(imbalances.partitions, vec![vec![1.0, 1.0], vec![1.0]]);

        let json = serde_json::to_string(imbalances).unwrap();
        let parsed: TimeImbalances = serde_json::from_str(&json).unwrap();
        assert_eq!(&parsed, imbalances);
    }

    #[test]
    fn merges_partition_tables() {
        let table = |target: &str, class: &str| -> DurationTable {
            [(target.to_owned(), [(class.to_owned(), 1)].into_iter().collect())]
                .into_iter()
                .collect()
        };
        let result = PartitionResult::assemble(
            ResultStats::default(),
            vec![vec![shard("A", &["X"], 1)], vec![shard("B", &["Y"], 1)]],
            vec![table("A", "X"), table("B", "Y")],
        );

        assert_eq!(
            result.test_time_for_partitions.keys().collect::<Vec<_>>(),
            ["A", "B"]
        );
        assert_eq!(result.test_maps()[1][0]["B"], ["Y"]);
    }
}
