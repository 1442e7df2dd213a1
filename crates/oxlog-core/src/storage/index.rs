//! Memory-mapped offset index.
//!
//! The index file is a flat array of 12-byte entries: a `u32` big-endian
//! offset relative to the owning segment's base offset, then the `u64`
//! big-endian store position of that record's frame. On open the file is
//! extended to its configured maximum so the whole region can be mapped
//! up front; the in-memory `size` tracks the logical end. Close truncates
//! the file back to `size`, which is how a reopened index knows how many
//! entries are live.
//!
//! No internal locking: only the owning segment touches an index, and
//! only the active segment's index is ever written.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use memmap2::MmapMut;

use crate::config::Config;
use crate::error::{Error, Result};

/// Bytes of the relative-offset field.
pub const OFF_WIDTH: u64 = 4;
/// Bytes of the store-position field.
pub const POS_WIDTH: u64 = 8;
/// Total bytes per entry.
pub const ENT_WIDTH: u64 = OFF_WIDTH + POS_WIDTH;

#[derive(Debug)]
pub struct Index {
    file: File,
    path: PathBuf,
    mmap: MmapMut,
    /// Logical end of the entry array; always a multiple of [`ENT_WIDTH`].
    size: u64,
}

impl Index {
    /// Open or create the index file at `path`, record its current length
    /// as the live size, extend it to `max_index_bytes` and map the full
    /// region read-write.
    pub fn open(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        let size = file.metadata()?.len();
        file.set_len(config.segment.max_index_bytes)?;

        // SAFETY: the file was just opened read-write and stays open for
        // the lifetime of the mapping; this process owns the log
        // directory exclusively, so nothing truncates the file underneath
        // the map before `close` runs.
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        Ok(Self {
            file,
            path,
            mmap,
            size,
        })
    }

    /// Append one entry. Fails with the EOF sentinel when the mapped
    /// region has no room left, which is what flips the owning segment
    /// into the maxed state.
    pub fn write(&mut self, off: u32, pos: u64) -> Result<()> {
        if (self.mmap.len() as u64) < self.size + ENT_WIDTH {
            return Err(Error::eof());
        }

        let at = self.size as usize;
        self.mmap[at..at + OFF_WIDTH as usize].copy_from_slice(&off.to_be_bytes());
        self.mmap[at + OFF_WIDTH as usize..at + ENT_WIDTH as usize]
            .copy_from_slice(&pos.to_be_bytes());
        self.size += ENT_WIDTH;
        Ok(())
    }

    /// Read entry `input`; `-1` means the last entry. Returns the stored
    /// relative offset and store position, or EOF when the entry does not
    /// exist.
    pub fn read(&self, input: i64) -> Result<(u32, u64)> {
        let entries = self.size / ENT_WIDTH;
        if entries == 0 {
            return Err(Error::eof());
        }

        let idx = if input == -1 {
            (entries - 1) as u32
        } else {
            input as u32
        };

        let at = u64::from(idx) * ENT_WIDTH;
        if self.size < at + ENT_WIDTH {
            return Err(Error::eof());
        }

        let at = at as usize;
        let off = u32::from_be_bytes(self.mmap[at..at + OFF_WIDTH as usize].try_into().unwrap());
        let pos = u64::from_be_bytes(
            self.mmap[at + OFF_WIDTH as usize..at + ENT_WIDTH as usize]
                .try_into()
                .unwrap(),
        );
        Ok((off, pos))
    }

    /// Sync the mapped region to the file without truncating; the index
    /// stays writable.
    pub fn flush(&self) -> Result<()> {
        self.mmap.flush()?;
        Ok(())
    }

    /// Sync the map, fsync the file and trim it back to the live size so
    /// the on-disk length equals `entries * 12` for the next open.
    pub fn close(self) -> Result<()> {
        let Index {
            file, mmap, size, ..
        } = self;

        mmap.flush()?;
        file.sync_all()?;
        drop(mmap);
        file.set_len(size)?;
        Ok(())
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
