use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The requested offset lies outside the log's `[lowest, highest]`
    /// range. Maps to a not-found status at the RPC boundary.
    #[error("offset out of range: {offset}")]
    OffsetOutOfRange { offset: u64 },

    /// The log's segments have been closed or removed.
    #[error("log is closed")]
    Closed,

    #[error("codec error: {0}")]
    Codec(#[from] postcard::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Sentinel for "no more data": an empty index, a full index, or a
    /// position past the end of a store file.
    pub(crate) fn eof() -> Self {
        io::Error::from(io::ErrorKind::UnexpectedEof).into()
    }

    /// True if this error is the end-of-data sentinel.
    pub fn is_eof(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
