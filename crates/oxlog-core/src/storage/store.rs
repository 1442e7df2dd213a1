//! Append-only frame store.
//!
//! A store file is a flat sequence of frames, each an 8-byte big-endian
//! length followed by that many payload bytes. Appends go through a
//! buffered writer to keep the syscall count down on small-record
//! workloads; every read flushes the buffer first so freshly appended
//! frames are visible. One mutex serializes all operations.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::Result;

/// Width of the big-endian length prefix on every frame. Part of the
/// on-disk format.
pub const LEN_WIDTH: u64 = 8;

#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    writer: BufWriter<File>,
    /// Separate handle for positional reads; the writer keeps appending.
    reader: File,
    /// File length plus any bytes still sitting in the write buffer.
    size: u64,
}

impl Store {
    /// Open or create the store file at `path`. Existing content is
    /// preserved; the current file length seeds `size`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(&path)?;
        let size = file.metadata()?.len();
        let reader = file.try_clone()?;

        Ok(Self {
            path,
            inner: Mutex::new(Inner {
                writer: BufWriter::new(file),
                reader,
                size,
            }),
        })
    }

    /// Append one framed payload. Returns the total bytes written
    /// (prefix included) and the position of the frame's length prefix,
    /// which is what the index stores.
    pub fn append(&self, payload: &[u8]) -> Result<(u64, u64)> {
        let mut inner = self.inner.lock().unwrap();

        let position = inner.size;
        let mut frame = BytesMut::with_capacity(LEN_WIDTH as usize + payload.len());
        frame.put_u64(payload.len() as u64);
        frame.put_slice(payload);
        inner.writer.write_all(&frame)?;

        let written = LEN_WIDTH + payload.len() as u64;
        inner.size += written;
        Ok((written, position))
    }

    /// Read back the frame whose length prefix starts at `position`.
    /// Fails with `UnexpectedEof` when the position or the payload lies
    /// beyond the end of the file.
    pub fn read(&self, position: u64) -> Result<Bytes> {
        let mut inner = self.inner.lock().unwrap();
        inner.writer.flush()?;

        let mut len_buf = [0u8; LEN_WIDTH as usize];
        inner.reader.read_exact_at(&mut len_buf, position)?;
        let len = u64::from_be_bytes(len_buf);

        let mut payload = vec![0u8; len as usize];
        inner.reader.read_exact_at(&mut payload, position + LEN_WIDTH)?;
        Ok(Bytes::from(payload))
    }

    /// Read at most `buf.len()` raw bytes starting at `offset`, with no
    /// frame decoding. Backs the whole-log byte reader.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let mut inner = self.inner.lock().unwrap();
        inner.writer.flush()?;
        Ok(inner.reader.read_at(buf, offset)?)
    }

    /// Flush buffered appends and fsync the file.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.writer.flush()?;
        inner.writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Flush, fsync and close the file.
    pub fn close(self) -> Result<()> {
        let mut inner = self.inner.into_inner().unwrap();
        inner.writer.flush()?;
        inner.writer.get_ref().sync_all()?;
        Ok(())
    }

    pub fn size(&self) -> u64 {
        self.inner.lock().unwrap().size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot for streaming: flushes, then hands out an independent
    /// file handle together with the flushed size.
    pub(crate) fn reader(&self) -> Result<(File, u64)> {
        let mut inner = self.inner.lock().unwrap();
        inner.writer.flush()?;
        Ok((inner.reader.try_clone()?, inner.size))
    }
}
