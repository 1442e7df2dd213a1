//! One store + index pair covering a contiguous offset range.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::record::Record;
use crate::storage::index::Index;
use crate::storage::store::Store;

const STORE_SUFFIX: &str = "store";
const INDEX_SUFFIX: &str = "index";

/// An append/read unit owning the offset range `[base_offset, next_offset)`.
///
/// Within the log directory a segment is the file pair
/// `{base_offset}.store` / `{base_offset}.index`.
#[derive(Debug)]
pub struct Segment {
    store: Store,
    index: Index,
    base_offset: u64,
    next_offset: u64,
    config: Config,
}

impl Segment {
    /// Open or create the segment files for `base_offset` under `dir` and
    /// recover `next_offset` from the last index entry: an empty index
    /// means a fresh segment starting at `base_offset`.
    pub fn open(dir: impl AsRef<Path>, base_offset: u64, config: Config) -> Result<Self> {
        let dir = dir.as_ref();
        let store = Store::open(dir.join(format!("{}.{}", base_offset, STORE_SUFFIX)))?;
        let index = Index::open(dir.join(format!("{}.{}", base_offset, INDEX_SUFFIX)), &config)?;

        let next_offset = match index.read(-1) {
            Ok((last_relative, _)) => base_offset + u64::from(last_relative) + 1,
            Err(e) if e.is_eof() => base_offset,
            Err(e) => return Err(e),
        };

        debug!(base_offset, next_offset, "segment opened");

        Ok(Self {
            store,
            index,
            base_offset,
            next_offset,
            config,
        })
    }

    /// Assign the next offset to `record`, encode it, append the frame to
    /// the store and its `(relative offset, position)` entry to the
    /// index. Returns the assigned absolute offset.
    ///
    /// A store append without a matching index entry (index write failed)
    /// leaves unreferenced bytes in the store; they are invisible since
    /// nothing is addressable past the highest index entry.
    pub fn append(&mut self, mut record: Record) -> Result<u64> {
        let cur = self.next_offset;
        record.offset = cur;

        let encoded = record.to_bytes()?;
        let (_, position) = self.store.append(&encoded)?;
        self.index
            .write((cur - self.base_offset) as u32, position)?;

        self.next_offset += 1;
        Ok(cur)
    }

    /// Read the record at absolute offset `offset`. Fails with the EOF
    /// sentinel when the offset falls outside this segment's range.
    pub fn read(&self, offset: u64) -> Result<Record> {
        let relative = offset
            .checked_sub(self.base_offset)
            .ok_or_else(Error::eof)?;
        let (_, position) = self.index.read(relative as i64)?;
        let encoded = self.store.read(position)?;
        Record::from_bytes(&encoded)
    }

    /// True once either file has reached its configured cap. Many small
    /// records exhaust the index; a few huge records exhaust the store.
    /// Either way the log rolls to a fresh segment.
    pub fn is_maxed(&self) -> bool {
        self.store.size() >= self.config.segment.max_store_bytes
            || self.index.size() >= self.config.segment.max_index_bytes
    }

    /// Flush both files without closing; store appends are fsynced and
    /// the index map is synced in place.
    pub fn flush(&self) -> Result<()> {
        self.store.flush()?;
        self.index.flush()
    }

    /// Close index then store, surfacing the first failure.
    pub fn close(self) -> Result<()> {
        self.index.close()?;
        self.store.close()
    }

    /// Close the segment and delete both of its files.
    pub fn remove(self) -> Result<()> {
        let index_path = self.index.path().to_path_buf();
        let store_path = self.store.path().to_path_buf();

        self.close()?;
        fs::remove_file(index_path)?;
        fs::remove_file(store_path)?;
        Ok(())
    }

    /// First absolute offset this segment may hold.
    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    /// Next offset to assign; `next_offset - base_offset` is the record
    /// count.
    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    pub fn store_path(&self) -> PathBuf {
        self.store.path().to_path_buf()
    }

    pub fn index_path(&self) -> PathBuf {
        self.index.path().to_path_buf()
    }

    pub(crate) fn store_reader(&self) -> Result<(fs::File, u64)> {
        self.store.reader()
    }
}
