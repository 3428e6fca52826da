//! Typed test events over a lazy stream of `json-stream` records.
//!
//! A `begin-ocunit` record sets the current target; every following
//! qualifying `end-test` record belongs to it until the next
//! `begin-ocunit`. Records of any other kind are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, warn};
use xcshard_schemas::StreamRecord;

use crate::error::{ShardError, ShardErrorKind};

/// A single-pass stream of decoded records.
pub type RecordStream<'a> =
    Box<dyn Iterator<Item = Result<StreamRecord, ShardError>> + 'a>;

/// A test event recovered from the record stream.
#[derive(Debug, Clone, PartialEq)]
pub enum TestEvent {
    /// A target starts; subsequent tests belong to it.
    TargetBegin { target_name: String },
    /// A test method of `class_name` in `target_name` finished.
    TestEnd {
        target_name: String,
        class_name: String,
        duration_seconds: f64,
    },
}

/// Iterator adapter turning records into [`TestEvent`]s.
///
/// Yields an error (and should not be polled further) when a test finishes
/// while no target is active.
pub struct TestEvents<I> {
    records: I,
    current_target: Option<String>,
}

impl<I> TestEvents<I> {
    /// Wraps a record iterator.
    pub fn new(records: I) -> Self {
        Self {
            records,
            current_target: None,
        }
    }
}

impl<I> Iterator for TestEvents<I>
where
    I: Iterator<Item = Result<StreamRecord, ShardError>>,
{
    type Item = Result<TestEvent, ShardError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(err) => return Some(Err(err)),
            };

            if record.is_target_begin() {
                let Some(target_name) = record.target_name else {
                    debug!("skipping begin-ocunit record without targetName");
                    self.current_target = None;
                    continue;
                };
                self.current_target = Some(target_name.clone());
                return Some(Ok(TestEvent::TargetBegin { target_name }));
            }

            if !record.is_test_end() {
                continue;
            }

            let Some(target_name) = self.current_target.clone() else {
                return Some(Err(ShardError::new(
                    ShardErrorKind::StreamParsing,
                )));
            };
            let duration_seconds = record.duration_seconds();
            let Some(class_name) = record.class_name else {
                debug!(%target_name, "skipping end-test record without className");
                continue;
            };

            return Some(Ok(TestEvent::TestEnd {
                target_name,
                class_name,
                duration_seconds,
            }));
        }
    }
}

/// Wraps in-memory records as a [`RecordStream`].
pub fn record_stream<'a>(
    records: impl IntoIterator<Item = StreamRecord> + 'a,
) -> RecordStream<'a> {
    Box::new(records.into_iter().map(Ok))
}

/// Lazily decodes newline-delimited JSON records. Blank lines are skipped.
pub fn read_json_stream<'a, R>(reader: R) -> RecordStream<'a>
where
    R: BufRead + 'a,
{
    Box::new(reader.lines().enumerate().filter_map(|(index, line)| {
        let line = match line {
            Ok(line) => line,
            Err(err) => return Some(Err(ShardError::from(err))),
        };
        if line.trim().is_empty() {
            return None;
        }
        Some(serde_json::from_str(&line).map_err(|source| {
            ShardError::new(ShardErrorKind::Deserialization {
                line: index + 1,
                source,
            })
        }))
    }))
}

/// Opens a `json-stream` file for lazy reading.
///
/// A missing file is not fatal: it is logged and read as an empty stream.
///
/// # Errors
///
/// Returns [`ShardError::is_io`] if the file exists but cannot be opened.
pub fn open_json_stream(path: &Path) -> Result<RecordStream<'static>, ShardError> {
    if !path.exists() {
        warn!(path = %path.display(), "timings file not found, treating it as empty");
        return Ok(Box::new(std::iter::empty()));
    }
    let file = File::open(path)?;
    Ok(read_json_stream(BufReader::new(file)))
}
