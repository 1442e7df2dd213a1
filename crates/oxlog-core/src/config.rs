use serde::{Deserialize, Serialize};

/// Cap applied by [`Log::new`](crate::Log::new) when a segment bound is
/// left at zero. Deliberately small so tests exercise rollover; real
/// deployments set the bounds explicitly.
pub const DEFAULT_MAX_BYTES: u64 = 1024;

/// Configuration for a commit log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub segment: SegmentConfig,
}

/// Per-segment size bounds and the starting offset of a fresh log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// Store file cap in bytes. Zero means [`DEFAULT_MAX_BYTES`].
    pub max_store_bytes: u64,

    /// Index file cap in bytes. Zero means [`DEFAULT_MAX_BYTES`]. Should
    /// be a multiple of the 12-byte entry width.
    pub max_index_bytes: u64,

    /// Base offset of the first segment created in an empty directory.
    pub initial_offset: u64,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_store_bytes(mut self, bytes: u64) -> Self {
        self.segment.max_store_bytes = bytes;
        self
    }

    pub fn with_max_index_bytes(mut self, bytes: u64) -> Self {
        self.segment.max_index_bytes = bytes;
        self
    }

    pub fn with_initial_offset(mut self, offset: u64) -> Self {
        self.segment.initial_offset = offset;
        self
    }
}
