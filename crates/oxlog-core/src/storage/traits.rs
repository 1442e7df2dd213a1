use std::io;

use crate::error::Result;
use crate::record::Record;
use crate::storage::log::Log;

/// The narrow capability a serving layer consumes.
///
/// Keeping the seam this small lets an RPC adapter (or a replication
/// driver) depend on the log without seeing segments, stores or indexes.
pub trait CommitLog: Send + Sync {
    /// Append a record, returning its assigned offset.
    fn append(&self, record: Record) -> Result<u64>;

    /// Read the record stored at `offset`.
    fn read(&self, offset: u64) -> Result<Record>;

    /// Base offset of the oldest retained segment.
    fn lowest_offset(&self) -> u64;

    /// Offset of the most recently appended record.
    fn highest_offset(&self) -> u64;

    /// Drop every segment whose records all lie below `lowest`.
    fn truncate(&self, lowest: u64) -> Result<()>;

    /// Byte stream over the whole log, for snapshots.
    fn reader(&self) -> Result<Box<dyn io::Read + Send>>;

    /// Close all segments, keeping the data on disk.
    fn close(&self) -> Result<()>;

    /// Close all segments and delete the log directory.
    fn remove(&self) -> Result<()>;
}

impl CommitLog for Log {
    fn append(&self, record: Record) -> Result<u64> {
        Log::append(self, record)
    }

    fn read(&self, offset: u64) -> Result<Record> {
        Log::read(self, offset)
    }

    fn lowest_offset(&self) -> u64 {
        Log::lowest_offset(self)
    }

    fn highest_offset(&self) -> u64 {
        Log::highest_offset(self)
    }

    fn truncate(&self, lowest: u64) -> Result<()> {
        Log::truncate(self, lowest)
    }

    fn reader(&self) -> Result<Box<dyn io::Read + Send>> {
        Ok(Box::new(Log::reader(self)?))
    }

    fn close(&self) -> Result<()> {
        Log::close(self)
    }

    fn remove(&self) -> Result<()> {
        Log::remove(self)
    }
}
