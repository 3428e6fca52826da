//! Schema definitions for xcshard input and output formats.
//!
//! This crate contains the data structures exchanged at the edges of the
//! sharding pipeline:
//! - **Input**: [`StreamRecord`], one line of an xctool `json-stream` file
//! - **Configuration**: [`ShardOptions`], the per-partition knobs
//! - **Output**: [`ShardAssignment`], [`ResultStats`] and the
//!   [`ShardingReport`] written by the CLI
//!
//! Keeping them in one crate gives the scheduler and the CLI a single
//! serialization contract.

mod options;
mod report;
mod stream_record;
#[cfg(test)]
mod testutil;

#[doc(inline)]
pub use options::*;
#[doc(inline)]
pub use report::*;
#[doc(inline)]
pub use stream_record::*;
