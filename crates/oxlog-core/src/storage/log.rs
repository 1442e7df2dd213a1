//! Offset-addressed log over an ordered run of segments.

use std::fs::{self, File};
use std::io::{self, Read};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, info};

use crate::config::{Config, DEFAULT_MAX_BYTES};
use crate::error::{Error, Result};
use crate::record::Record;
use crate::storage::segment::Segment;

/// A single-writer, multi-reader commit log.
///
/// Appends go to the active (last) segment, rolling to a fresh one when
/// the active segment fills either of its files. Reads locate the unique
/// segment whose range contains the offset. One reader/writer lock guards
/// the segment list: `append`, `truncate`, `close`, `remove` and `reset`
/// are writers, everything else is a reader.
///
/// A `Log` owns its directory exclusively; running two instances over the
/// same directory is undefined.
#[derive(Debug)]
pub struct Log {
    dir: PathBuf,
    config: Config,
    /// Ordered by base offset ascending; the last segment is active.
    segments: RwLock<Vec<Segment>>,
}

impl Log {
    /// Open the log at `dir`, creating the directory if needed and
    /// recovering any segments already on disk. Zero size caps fall back
    /// to [`DEFAULT_MAX_BYTES`].
    pub fn new(dir: impl AsRef<Path>, mut config: Config) -> Result<Self> {
        if config.segment.max_store_bytes == 0 {
            config.segment.max_store_bytes = DEFAULT_MAX_BYTES;
        }
        if config.segment.max_index_bytes == 0 {
            config.segment.max_index_bytes = DEFAULT_MAX_BYTES;
        }

        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let log = Self {
            dir,
            config,
            segments: RwLock::new(Vec::new()),
        };
        log.setup()?;
        Ok(log)
    }

    /// Rebuild the segment list from the directory contents. Every
    /// segment contributes two files with the same numeric stem, so the
    /// parsed base offsets are deduplicated before opening.
    fn setup(&self) -> Result<()> {
        let mut base_offsets = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Ok(offset) = stem.parse::<u64>() {
                base_offsets.push(offset);
            }
        }
        base_offsets.sort_unstable();
        base_offsets.dedup();

        let mut segments = self.segments.write().unwrap();
        for &base_offset in &base_offsets {
            segments.push(Segment::open(&self.dir, base_offset, self.config.clone())?);
        }
        if segments.is_empty() {
            segments.push(Segment::open(
                &self.dir,
                self.config.segment.initial_offset,
                self.config.clone(),
            )?);
        }

        info!(
            dir = %self.dir.display(),
            segments = segments.len(),
            next_offset = segments.last().map(Segment::next_offset).unwrap_or(0),
            "log ready"
        );
        Ok(())
    }

    /// Append a record to the active segment and return its assigned
    /// offset. If the segment is maxed afterwards, a fresh segment based
    /// at `offset + 1` becomes active; a failure to roll still returns
    /// the error even though the record itself is durable in the old
    /// segment.
    pub fn append(&self, record: Record) -> Result<u64> {
        let mut segments = self.segments.write().unwrap();
        let active = segments.last_mut().ok_or(Error::Closed)?;

        let offset = active.append(record)?;
        if active.is_maxed() {
            debug!(offset, "active segment maxed, rolling");
            let segment = Segment::open(&self.dir, offset + 1, self.config.clone())?;
            segments.push(segment);
        }
        Ok(offset)
    }

    /// Read the record at `offset` from the segment containing it.
    pub fn read(&self, offset: u64) -> Result<Record> {
        let segments = self.segments.read().unwrap();

        let idx = segments.partition_point(|s| s.base_offset() <= offset);
        let segment = idx
            .checked_sub(1)
            .map(|i| &segments[i])
            .filter(|s| offset < s.next_offset())
            .ok_or(Error::OffsetOutOfRange { offset })?;

        segment.read(offset)
    }

    /// Base offset of the oldest retained segment.
    pub fn lowest_offset(&self) -> u64 {
        let segments = self.segments.read().unwrap();
        segments
            .first()
            .map(Segment::base_offset)
            .unwrap_or(self.config.segment.initial_offset)
    }

    /// Offset of the most recently appended record: the active segment's
    /// `next_offset - 1`, saturating at zero.
    pub fn highest_offset(&self) -> u64 {
        let segments = self.segments.read().unwrap();
        let next = segments.last().map(Segment::next_offset).unwrap_or(0);
        next.saturating_sub(1)
    }

    /// Drop every segment whose records all lie below `lowest`,
    /// reclaiming their disk space. Callers are expected to truncate only
    /// fully consumed prefixes; removing the active segment leaves the
    /// log closed for appends.
    pub fn truncate(&self, lowest: u64) -> Result<()> {
        let mut segments = self.segments.write().unwrap();
        let mut retained = Vec::with_capacity(segments.len());
        for segment in segments.drain(..) {
            if segment.next_offset() <= lowest + 1 {
                debug!(
                    base_offset = segment.base_offset(),
                    "removing truncated segment"
                );
                segment.remove()?;
            } else {
                retained.push(segment);
            }
        }
        *segments = retained;
        Ok(())
    }

    /// Flush every segment's store and index without closing.
    pub fn flush(&self) -> Result<()> {
        let segments = self.segments.read().unwrap();
        for segment in segments.iter() {
            segment.flush()?;
        }
        Ok(())
    }

    /// Close every segment. The data stays on disk; a new `Log` over the
    /// same directory picks it back up.
    pub fn close(&self) -> Result<()> {
        let mut segments = self.segments.write().unwrap();
        for segment in segments.drain(..) {
            segment.close()?;
        }
        Ok(())
    }

    /// Close every segment and delete the log directory.
    pub fn remove(&self) -> Result<()> {
        self.close()?;
        fs::remove_dir_all(&self.dir)?;
        Ok(())
    }

    /// Remove the log and reinitialize an empty one in its place.
    pub fn reset(&self) -> Result<()> {
        self.remove()?;
        fs::create_dir_all(&self.dir)?;
        self.setup()
    }

    /// A reader over the whole log: each segment's store file from
    /// position zero to its size at the time of this call, concatenated
    /// in base offset order. Used for replication snapshots.
    pub fn reader(&self) -> Result<LogReader> {
        let segments = self.segments.read().unwrap();
        let mut parts = Vec::with_capacity(segments.len());
        for segment in segments.iter() {
            let (file, len) = segment.store_reader()?;
            parts.push(StorePart { file, len, pos: 0 });
        }
        Ok(LogReader { parts, current: 0 })
    }
}

/// Byte stream over the concatenated store files of a log.
///
/// Each part tracks its own cursor against an independent file handle, so
/// the stream stays valid while the log keeps appending; it covers
/// exactly the bytes that were flushed when [`Log::reader`] was called.
#[derive(Debug)]
pub struct LogReader {
    parts: Vec<StorePart>,
    current: usize,
}

#[derive(Debug)]
struct StorePart {
    file: File,
    len: u64,
    pos: u64,
}

impl Read for LogReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let Some(part) = self.parts.get_mut(self.current) else {
                return Ok(0);
            };
            let remaining = part.len - part.pos;
            if remaining == 0 {
                self.current += 1;
                continue;
            }

            let want = buf.len().min(remaining as usize);
            let n = part.file.read_at(&mut buf[..want], part.pos)?;
            if n == 0 {
                // File shorter than the snapshot claimed; move on rather
                // than spin.
                self.current += 1;
                continue;
            }
            part.pos += n as u64;
            return Ok(n);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::store::LEN_WIDTH;
    use bytes::Bytes;
    use proptest::prelude::*;

    fn record() -> Record {
        Record::new(Bytes::from_static(b"hello world"))
    }

    /// Config whose store cap holds exactly `records` encoded copies of
    /// the test record per segment.
    fn rollover_config(records: u64) -> Config {
        let encoded_len = record().to_bytes().unwrap().len() as u64;
        Config::new()
            .with_max_store_bytes((LEN_WIDTH + encoded_len) * records)
            .with_max_index_bytes(1024)
    }

    #[test]
    fn test_append_read() {
        let dir = tempfile::tempdir().unwrap();
        let log = Log::new(dir.path(), Config::default()).unwrap();

        let offset = log.append(record()).unwrap();
        assert_eq!(offset, 0);

        let read = log.read(0).unwrap();
        assert_eq!(read.value, record().value);
        assert_eq!(read.offset, 0);

        // A mid-batch flush leaves the log fully readable.
        log.flush().unwrap();
        assert_eq!(log.read(0).unwrap().offset, 0);
    }

    #[test]
    fn test_offset_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let log = Log::new(dir.path(), Config::default()).unwrap();
        log.append(record()).unwrap();

        match log.read(1).unwrap_err() {
            Error::OffsetOutOfRange { offset } => assert_eq!(offset, 1),
            other => panic!("expected OffsetOutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn test_reopen_recovers_offsets() {
        let dir = tempfile::tempdir().unwrap();

        {
            let log = Log::new(dir.path(), Config::default()).unwrap();
            for _ in 0..3 {
                log.append(record()).unwrap();
            }
            assert_eq!(log.lowest_offset(), 0);
            assert_eq!(log.highest_offset(), 2);
            log.close().unwrap();
        }

        let log = Log::new(dir.path(), Config::default()).unwrap();
        assert_eq!(log.lowest_offset(), 0);
        assert_eq!(log.highest_offset(), 2);

        for offset in 0..3 {
            let read = log.read(offset).unwrap();
            assert_eq!(read.offset, offset);
            assert_eq!(read.value, record().value);
        }

        // Appends continue past the recovered high-water mark.
        assert_eq!(log.append(record()).unwrap(), 3);
    }

    #[test]
    fn test_rollover_across_segments() {
        let dir = tempfile::tempdir().unwrap();
        let log = Log::new(dir.path(), rollover_config(3)).unwrap();

        for want in 0..10u64 {
            assert_eq!(log.append(record()).unwrap(), want);
        }

        assert_eq!(log.lowest_offset(), 0);
        assert_eq!(log.highest_offset(), 9);

        for offset in 0..10u64 {
            let read = log.read(offset).unwrap();
            assert_eq!(read.offset, offset);
            assert_eq!(read.value, record().value);
        }

        // Ten records at three per segment leave four segment pairs.
        for base in [0u64, 3, 6, 9] {
            assert!(dir.path().join(format!("{base}.store")).exists());
            assert!(dir.path().join(format!("{base}.index")).exists());
        }
        assert!(!dir.path().join("12.store").exists());
    }

    #[test]
    fn test_truncate() {
        let dir = tempfile::tempdir().unwrap();
        let log = Log::new(dir.path(), rollover_config(3)).unwrap();
        for _ in 0..10 {
            log.append(record()).unwrap();
        }

        log.truncate(5).unwrap();

        assert_eq!(log.lowest_offset(), 6);
        assert_eq!(log.highest_offset(), 9);
        assert!(matches!(
            log.read(4).unwrap_err(),
            Error::OffsetOutOfRange { offset: 4 }
        ));
        assert_eq!(log.read(6).unwrap().value, record().value);

        // Removed segment files are gone from disk.
        assert!(!dir.path().join("0.store").exists());
        assert!(!dir.path().join("3.index").exists());
        assert!(dir.path().join("6.store").exists());
    }

    #[test]
    fn test_reader_streams_whole_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = Log::new(dir.path(), rollover_config(3)).unwrap();
        for _ in 0..7 {
            log.append(record()).unwrap();
        }

        let mut bytes = Vec::new();
        log.reader().unwrap().read_to_end(&mut bytes).unwrap();

        // Walk the concatenated frames back out and check every record
        // survived in order.
        let mut at = 0usize;
        let mut offsets = Vec::new();
        while at < bytes.len() {
            let len =
                u64::from_be_bytes(bytes[at..at + LEN_WIDTH as usize].try_into().unwrap()) as usize;
            at += LEN_WIDTH as usize;
            let decoded = Record::from_bytes(&bytes[at..at + len]).unwrap();
            assert_eq!(decoded.value, record().value);
            offsets.push(decoded.offset);
            at += len;
        }
        assert_eq!(offsets, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn test_reset() {
        let dir = tempfile::tempdir().unwrap();
        let log = Log::new(dir.path(), Config::default()).unwrap();
        for _ in 0..3 {
            log.append(record()).unwrap();
        }

        log.reset().unwrap();

        assert_eq!(log.lowest_offset(), 0);
        assert_eq!(log.highest_offset(), 0);
        assert!(matches!(
            log.read(0).unwrap_err(),
            Error::OffsetOutOfRange { offset: 0 }
        ));
        assert_eq!(log.append(record()).unwrap(), 0);
    }

    #[test]
    fn test_initial_offset() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default().with_initial_offset(16);
        let log = Log::new(dir.path(), config).unwrap();

        assert_eq!(log.append(record()).unwrap(), 16);
        assert_eq!(log.lowest_offset(), 16);
        assert_eq!(log.highest_offset(), 16);
        assert!(dir.path().join("16.store").exists());
    }

    #[test]
    fn test_append_after_close() {
        let dir = tempfile::tempdir().unwrap();
        let log = Log::new(dir.path(), Config::default()).unwrap();
        log.append(record()).unwrap();
        log.close().unwrap();

        assert!(matches!(log.append(record()), Err(Error::Closed)));
    }

    prop_compose! {
        fn arbitrary_payloads()(
            payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..32)
        ) -> Vec<Vec<u8>> {
            payloads
        }
    }

    proptest! {
        /// Offsets are assigned contiguously from zero and every payload
        /// reads back intact, regardless of rollover boundaries.
        #[test]
        fn prop_append_read_round_trip(payloads in arbitrary_payloads()) {
            let dir = tempfile::tempdir().unwrap();
            let log = Log::new(dir.path(), Config::default()).unwrap();

            for (want, payload) in payloads.iter().enumerate() {
                let offset = log
                    .append(Record::new(Bytes::from(payload.clone())))
                    .unwrap();
                prop_assert_eq!(offset, want as u64);
            }

            for (offset, payload) in payloads.iter().enumerate() {
                let read = log.read(offset as u64).unwrap();
                prop_assert_eq!(read.offset, offset as u64);
                prop_assert_eq!(&read.value[..], &payload[..]);
            }

            prop_assert_eq!(log.highest_offset(), payloads.len() as u64 - 1);
        }
    }
}
