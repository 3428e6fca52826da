//! Error types for the xcshard-schedule crate.

use std::backtrace::Backtrace;
use std::fmt;

/// Error type for shard computation.
///
/// Every variant is terminal: a computation either yields a complete
/// `PartitionResult` or fails with one of these. Uses the canonical struct
/// pattern with backtrace capture and `is_xxx()` helper methods.
#[derive(Debug)]
pub struct ShardError {
    kind: ShardErrorKind,
    backtrace: Backtrace,
}

/// Internal error variants. Not exposed publicly; use `is_xxx()` methods.
#[derive(Debug)]
pub(crate) enum ShardErrorKind {
    /// A test finished before any target was announced.
    StreamParsing,
    /// A declared partition ended up with no tests at all.
    EmptyPartition { targets: Vec<String> },
    /// Every partition is at its cap and workers are left over.
    InsufficientShards { extra: usize },
    /// The packer was asked for zero shards.
    NotEnoughWorkers,
    /// The packer was handed an empty duration table.
    EmptyPartitionTable,
    /// Some shards would receive no tests.
    TooManyShards {
        empty: usize,
        requested: usize,
        unit: &'static str,
    },
    /// A line of a `json-stream` file is not a JSON object.
    Deserialization {
        line: usize,
        source: serde_json::Error,
    },
    /// The options file is not an array of known option objects.
    InvalidOptions(serde_json::Error),
    /// The report could not be written as JSON.
    Serialization(serde_json::Error),
    /// I/O error while reading a timings file.
    Io(std::io::Error),
}

impl ShardError {
    /// Creates an error from an error kind, capturing a backtrace.
    pub(crate) fn new(kind: ShardErrorKind) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
        }
    }

    /// Returns true if a test event appeared outside any target.
    pub fn is_stream_parsing(&self) -> bool {
        matches!(self.kind, ShardErrorKind::StreamParsing)
    }

    /// Returns true if a declared partition had no tests.
    pub fn is_empty_partition(&self) -> bool {
        matches!(self.kind, ShardErrorKind::EmptyPartition { .. })
    }

    /// Returns true if the allocator could not place every worker.
    pub fn is_insufficient_shards(&self) -> bool {
        matches!(self.kind, ShardErrorKind::InsufficientShards { .. })
    }

    /// Returns true if zero shards were requested for a partition.
    pub fn is_not_enough_workers(&self) -> bool {
        matches!(self.kind, ShardErrorKind::NotEnoughWorkers)
    }

    /// Returns true if the packer received an empty duration table.
    pub fn is_empty_partition_table(&self) -> bool {
        matches!(self.kind, ShardErrorKind::EmptyPartitionTable)
    }

    /// Returns true if packing left shards without tests.
    pub fn is_too_many_shards(&self) -> bool {
        matches!(self.kind, ShardErrorKind::TooManyShards { .. })
    }

    /// Returns true if a stream line could not be decoded.
    pub fn is_deserialization(&self) -> bool {
        matches!(self.kind, ShardErrorKind::Deserialization { .. })
    }

    /// Returns true if the options file was rejected.
    pub fn is_invalid_options(&self) -> bool {
        matches!(self.kind, ShardErrorKind::InvalidOptions(_))
    }

    /// Returns true if the report could not be serialized.
    pub fn is_serialization(&self) -> bool {
        matches!(self.kind, ShardErrorKind::Serialization(_))
    }

    /// Returns true if this error is due to I/O failure.
    pub fn is_io(&self) -> bool {
        matches!(self.kind, ShardErrorKind::Io(_))
    }

    /// Returns the backtrace captured when this error was created.
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Display for ShardErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShardErrorKind::StreamParsing => {
                write!(f, "No test target defined")
            }
            ShardErrorKind::EmptyPartition { targets } => {
                write!(f, "The following partition has no tests: {targets:?}")
            }
            ShardErrorKind::InsufficientShards { extra } => {
                write!(f, "There are {extra} extra machines")
            }
            ShardErrorKind::NotEnoughWorkers => {
                write!(f, "There are not enough workers provided")
            }
            ShardErrorKind::EmptyPartitionTable => {
                write!(f, "Cannot shard an empty partition")
            }
            ShardErrorKind::TooManyShards {
                empty,
                requested,
                unit,
            } => write!(
                f,
                "Too many shards -- {empty} of {requested} assignments are \
                 empty, because there are not enough test {unit} for that \
                 many shards."
            ),
            ShardErrorKind::Deserialization { line, source } => {
                write!(f, "failed to parse json-stream line {line}: {source}")
            }
            ShardErrorKind::InvalidOptions(err) => {
                write!(f, "invalid partition options: {err}")
            }
            ShardErrorKind::Serialization(err) => {
                write!(f, "failed to serialize report: {err}")
            }
            ShardErrorKind::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl fmt::Display for ShardError {
    /// Formats only the user-facing message. The backtrace is available
    /// through [`ShardError::backtrace`].
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for ShardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ShardErrorKind::Deserialization { source, .. }
            | ShardErrorKind::InvalidOptions(source)
            | ShardErrorKind::Serialization(source) => Some(source),
            ShardErrorKind::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ShardError {
    fn from(err: std::io::Error) -> Self {
        Self::new(ShardErrorKind::Io(err))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn test_empty_partition_message_lists_targets() {
        let err = ShardError::new(ShardErrorKind::EmptyPartition {
            targets: vec!["TestTarget1".into(), "TestTarget2".into()],
        });

        assert!(err.is_empty_partition());
        assert!(!err.is_stream_parsing());
        assert_eq!(
            err.to_string(),
            r#"The following partition has no tests: ["TestTarget1", "TestTarget2"]"#
        );
        assert!(err.source().is_none());
    }

    #[test]
    fn test_insufficient_shards_message() {
        let err =
            ShardError::new(ShardErrorKind::InsufficientShards { extra: 1 });
        assert!(err.is_insufficient_shards());
        assert_eq!(err.to_string(), "There are 1 extra machines");
    }

    #[test]
    fn test_too_many_shards_message() {
        let err = ShardError::new(ShardErrorKind::TooManyShards {
            empty: 1,
            requested: 2,
            unit: "targets",
        });
        assert!(err.is_too_many_shards());
        assert_eq!(
            err.to_string(),
            "Too many shards -- 1 of 2 assignments are empty, because there \
             are not enough test targets for that many shards."
        );
    }

    #[test]
    fn test_deserialization_chains_source() {
        let json_err =
            serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();
        let err = ShardError::new(ShardErrorKind::Deserialization {
            line: 3,
            source: json_err,
        });

        assert!(err.is_deserialization());
        assert!(err.to_string().starts_with("failed to parse json-stream line 3"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_io_from() {
        let io_err =
            std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ShardError::from(io_err);

        assert!(err.is_io());
        assert!(!err.is_deserialization());
        assert!(err.to_string().contains("I/O error"));
        assert!(err.source().is_some());
        let _ = err.backtrace();
    }
}
