//! Sharding results and the JSON report written by the CLI.
//!
//! The in-memory result types ([`ShardAssignment`], [`ResultStats`],
//! [`TimeImbalances`]) are produced by `xcshard-schedule`. The report types
//! ([`ShardingReport`] and friends) are the stable output format consumed by
//! CI scripts that launch one worker per shard.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Counters accumulated while reading the timing streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultStats {
    /// Test events from the historical stream that belong to a partition.
    pub historical_total_tests: usize,
    /// Test events from the current stream that belong to a partition.
    pub current_total_tests: usize,
    /// Classes whose duration was estimated rather than measured.
    pub class_extrapolations: usize,
    /// Targets with no history at all.
    pub target_extrapolations: usize,
}

/// Work assigned to one shard: target → class names, with the summed time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardAssignment {
    /// Classes to run, grouped by target, in placement order.
    pub test_map: IndexMap<String, Vec<String>>,
    /// Expected wall time of this shard in milliseconds.
    pub total_time_ms: u64,
}

impl ShardAssignment {
    /// Returns true when nothing was placed on this shard.
    pub fn is_empty(&self) -> bool {
        self.test_map.is_empty()
    }

    /// Number of classes across all targets on this shard.
    pub fn class_count(&self) -> usize {
        self.test_map.values().map(Vec::len).sum()
    }
}

/// Load-balance diagnostics. Ratios of 1.0 mean perfect balance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeImbalances {
    /// Per partition set: its average shard time over the mean of averages.
    pub partition_set: Vec<f64>,
    /// Per shard, grouped by partition set: shard time over the partition's
    /// average shard time.
    pub partitions: Vec<Vec<f64>>,
}

/// Full JSON report emitted by `xcshard` without `--abbrev`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardingReport {
    /// Run-wide figures.
    pub metadata: ReportMetadata,
    /// One entry per declared partition, in declaration order.
    pub partition_set_data: Vec<PartitionSetData>,
}

/// Run-wide figures at the top of a [`ShardingReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Workers requested on the command line.
    pub worker_count: usize,
    /// Number of declared partitions.
    pub partition_set_count: usize,
    /// Sum of every shard's expected time.
    pub total_time_in_ms: u64,
    /// Stream counters, flattened into this object.
    #[serde(flatten)]
    pub stats: ResultStats,
}

/// Shards of one declared partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionSetData {
    /// The `-p` argument that declared this partition.
    pub partition_set: String,
    /// Number of shards allocated to it.
    pub size: usize,
    /// See [`TimeImbalances::partition_set`].
    pub imbalance_ratio: f64,
    /// Shards in allocation order.
    pub partitions: Vec<ShardData>,
}

/// One worker's entry in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardData {
    /// 1-based shard number, unique across partition sets.
    pub shard_number: usize,
    /// Arguments selecting this shard's tests for the test runner.
    pub cli_arguments: Vec<String>,
    /// See [`TimeImbalances::partitions`].
    pub partition_imbalance_ratio: f64,
}
