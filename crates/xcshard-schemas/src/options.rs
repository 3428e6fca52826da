//! Per-partition ("metapartition") sharding options.
//!
//! Options are read from a JSON array with one object per declared
//! partition. Missing fields take their defaults; unknown fields are
//! rejected so that a misspelled key never silently changes the schedule.

use serde::{Deserialize, Serialize};

/// Sharding knobs for a single partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShardOptions {
    /// Upper bound on the number of shards this partition may receive.
    pub max_shard_count: Option<usize>,
    /// When true the unit of assignment is a single (target, class) pair.
    /// When false every class of a target lands on the same shard.
    pub split_bundles_across_machines: bool,
    /// Drop empty shards instead of failing when the partition has fewer
    /// assignable units than shards.
    pub allow_fewer_shards: bool,
}

impl Default for ShardOptions {
    fn default() -> Self {
        Self {
            max_shard_count: None,
            split_bundles_across_machines: true,
            allow_fewer_shards: false,
        }
    }
}

impl ShardOptions {
    /// Human-readable name of the unit this configuration assigns.
    pub fn unit_name(&self) -> &'static str {
        if self.split_bundles_across_machines {
            "classes"
        } else {
            "targets"
        }
    }
}

/// Parses a JSON array of options, one entry per partition.
///
/// # Errors
///
/// Returns the `serde_json` error when the document is not an array of
/// option objects or an object carries an unknown key.
pub fn parse_options_list(
    json: &str,
) -> Result<Vec<ShardOptions>, serde_json::Error> {
    serde_json::from_str(json)
}
