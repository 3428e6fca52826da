//! Shard computation: timing aggregation, worker allocation, LPT packing.
//!
//! The pipeline runs leaves first:
//!
//! 1. [`events`] turns raw `json-stream` records into typed test events.
//! 2. [`current`] indexes the optional stream of tests that exist today.
//! 3. [`durations`] sums historical time per (target, class) and
//!    extrapolates tests without history.
//! 4. [`split`] cuts the table into the declared partitions.
//! 5. [`allocate`] spreads the worker budget across partitions.
//! 6. [`pack`] balances each partition's classes over its shards.
//! 7. [`result`] assembles the shards with imbalance diagnostics.
//!
//! [`ShardPlanner`] drives the whole pipeline; [`args`] and [`report`]
//! render its output for the test runner.
//!
//! Everything is synchronous and deterministic: the same inputs always
//! produce the same shards.

pub mod allocate;
pub mod args;
pub mod current;
pub mod durations;
mod error;
pub mod events;
pub mod pack;
pub mod report;
pub mod result;
pub mod split;

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use indexmap::IndexSet;
use tracing::{debug, debug_span, info, warn};
use xcshard_schemas::{ResultStats, ShardOptions, parse_options_list};

pub use crate::allocate::PartitionAllocation;
pub use crate::args::ArgumentDialect;
pub use crate::current::CurrentTests;
pub use crate::durations::DurationTable;
pub use crate::error::ShardError;
use crate::error::ShardErrorKind;
pub use crate::events::{RecordStream, open_json_stream, read_json_stream};
pub use crate::result::PartitionResult;

/// Per-partition duration tables before any worker is allocated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionTimings {
    /// One table per declared partition, in declaration order.
    pub tables: Vec<DurationTable>,
    /// Counters gathered while reading the streams.
    pub stats: ResultStats,
}

/// Computes shards for a fixed worker count and partition layout.
///
/// ```no_run
/// use std::path::Path;
/// use xcshard_schedule::ShardPlanner;
///
/// let planner = ShardPlanner::new(4, [["AppTests", "KitTests"]]);
/// let result = planner
///     .compute_shards_for_files(Path::new("timings.json-stream"), None)
///     .unwrap();
/// assert_eq!(result.partition_sets[0].len(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct ShardPlanner {
    worker_count: usize,
    partitions: Vec<IndexSet<String>>,
    relevant_targets: HashSet<String>,
    options: Vec<ShardOptions>,
    allow_fewer_shards: bool,
}

impl ShardPlanner {
    /// Creates a planner for `worker_count` workers.
    ///
    /// Each item of `partitions` lists the targets of one partition. Every
    /// partition starts with default options.
    pub fn new<P, T, S>(worker_count: usize, partitions: P) -> Self
    where
        P: IntoIterator<Item = T>,
        T: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let partitions: Vec<IndexSet<String>> = partitions
            .into_iter()
            .map(|targets| targets.into_iter().map(Into::into).collect())
            .collect();
        let relevant_targets = partitions.iter().flatten().cloned().collect();
        let options = vec![ShardOptions::default(); partitions.len()];
        Self {
            worker_count,
            partitions,
            relevant_targets,
            options,
            allow_fewer_shards: false,
        }
    }

    /// Sets per-partition options, matched by position.
    ///
    /// Partitions without an entry keep the defaults; surplus entries are
    /// ignored.
    #[must_use]
    pub fn with_options(mut self, options: Vec<ShardOptions>) -> Self {
        if options.len() > self.partitions.len() {
            warn!(
                given = options.len(),
                partitions = self.partitions.len(),
                "more partition options than partitions, ignoring the rest"
            );
        }
        self.options = options;
        self.options
            .resize(self.partitions.len(), ShardOptions::default());
        self
    }

    /// Lets the allocator hand out fewer shards than workers when every
    /// partition is already at its cap.
    #[must_use]
    pub fn with_allow_fewer_shards(mut self, allow: bool) -> Self {
        self.allow_fewer_shards = allow;
        self
    }

    /// The worker budget.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Declared partitions, in order.
    pub fn partitions(&self) -> &[IndexSet<String>] {
        &self.partitions
    }

    /// Options for each declared partition.
    pub fn options(&self) -> &[ShardOptions] {
        &self.options
    }

    /// Reads both streams from disk and computes the shards.
    ///
    /// A missing historical file is read as an empty stream. A missing
    /// current file is treated as if none was given, so every historical
    /// test still counts.
    ///
    /// # Errors
    ///
    /// Any [`ShardError`] raised by the pipeline, plus
    /// [`ShardError::is_io`] and [`ShardError::is_deserialization`] for
    /// unreadable files.
    pub fn compute_shards_for_files(
        &self,
        historical: &Path,
        current: Option<&Path>,
    ) -> Result<PartitionResult, ShardError> {
        let historical = open_json_stream(historical)?;
        let current = match current {
            Some(path) if !path.exists() => {
                warn!(
                    path = %path.display(),
                    "current tests file not found, using historical tests only"
                );
                None
            }
            other => other.map(open_json_stream).transpose()?,
        };
        self.compute_shards_for_events(historical, current)
    }

    /// Computes the shards from in-memory record streams.
    ///
    /// # Errors
    ///
    /// See [`ShardPlanner::test_time_for_partitions`] and
    /// [`ShardPlanner::compute_shards_for_partitions`].
    pub fn compute_shards_for_events(
        &self,
        historical: RecordStream<'_>,
        current: Option<RecordStream<'_>>,
    ) -> Result<PartitionResult, ShardError> {
        let timings = self.test_time_for_partitions(historical, current)?;
        self.compute_shards_for_partitions(timings)
    }

    /// Builds one duration table per partition.
    ///
    /// # Errors
    ///
    /// - [`ShardError::is_stream_parsing`] for a test outside any target
    /// - [`ShardError::is_empty_partition`] when a partition has no tests
    pub fn test_time_for_partitions(
        &self,
        historical: RecordStream<'_>,
        current: Option<RecordStream<'_>>,
    ) -> Result<PartitionTimings, ShardError> {
        let _span = debug_span!("test_time_for_partitions").entered();

        let current = CurrentTests::analyze(current, &self.relevant_targets)?;
        let mut stats = ResultStats {
            current_total_tests: current.total_tests(),
            ..ResultStats::default()
        };
        let table = durations::aggregate_durations(
            historical,
            &current,
            &self.relevant_targets,
            &mut stats,
        )?;
        let tables = split::split_into_partitions(&table, &self.partitions)?;
        Ok(PartitionTimings { tables, stats })
    }

    /// Allocates the worker budget across partition tables.
    ///
    /// # Errors
    ///
    /// Returns [`ShardError::is_insufficient_shards`] when workers remain
    /// after every partition is at its cap.
    pub fn split_machines_proportionally(
        &self,
        tables: Vec<DurationTable>,
    ) -> Result<Vec<PartitionAllocation>, ShardError> {
        allocate::allocate_shards(
            self.worker_count,
            tables,
            &self.options,
            self.allow_fewer_shards,
        )
    }

    /// Allocates workers and packs every partition.
    ///
    /// # Errors
    ///
    /// Allocation errors, and the packer's
    /// [`ShardError::is_not_enough_workers`] and
    /// [`ShardError::is_too_many_shards`].
    pub fn compute_shards_for_partitions(
        &self,
        timings: PartitionTimings,
    ) -> Result<PartitionResult, ShardError> {
        let _span = debug_span!(
            "compute_shards_for_partitions",
            worker_count = self.worker_count
        )
        .entered();

        let PartitionTimings { tables, stats } = timings;
        let allocations = self.split_machines_proportionally(tables)?;

        let mut partition_sets = Vec::with_capacity(allocations.len());
        let mut partition_tables = Vec::with_capacity(allocations.len());
        for allocation in allocations {
            let shards = pack::compute_single_shards(
                allocation.shard_count,
                &allocation.durations,
                &allocation.options,
            )?;
            debug!(
                shards = shards.len(),
                makespan = pack::makespan(&shards),
                "packed partition"
            );
            partition_sets.push(shards);
            partition_tables.push(allocation.durations);
        }

        let result = PartitionResult::assemble(stats, partition_sets, partition_tables);
        info!(
            partitions = result.partition_sets.len(),
            total_test_time = result.total_test_time,
            "computed shards"
        );
        Ok(result)
    }
}

/// Reads a JSON array of per-partition options from `path`.
///
/// # Errors
///
/// [`ShardError::is_io`] if the file cannot be read, and
/// [`ShardError::is_invalid_options`] if it is not an array of option
/// objects or uses an unknown key.
pub fn load_options(path: &Path) -> Result<Vec<ShardOptions>, ShardError> {
    let json = fs::read_to_string(path)?;
    parse_options_list(&json)
        .map_err(|e| ShardError::new(ShardErrorKind::InvalidOptions(e)))
}
