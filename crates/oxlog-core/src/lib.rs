//! Append-only, offset-addressed commit log storage engine.
//!
//! The engine persists opaque binary records in a directory of segment
//! files and addresses them by monotonically assigned `u64` offsets. It is
//! the durable substrate of a per-partition log: single writer, multiple
//! readers, bounded disk usage through segment rollover and prefix
//! truncation.

pub mod config;
pub mod error;
pub mod record;
pub mod storage;

pub use config::{Config, SegmentConfig};
pub use error::{Error, Result};
pub use record::Record;
pub use storage::{CommitLog, Index, Log, LogReader, Segment, Store};
