//! On-disk layout and segment lifecycle.
//!
//! Two files per segment, both named by the segment's base offset:
//! a store file of length-prefixed record frames and a memory-mapped
//! index mapping relative offsets to store positions. The [`Log`] composes
//! an ordered run of segments into a single offset-addressed surface.

pub mod index;
pub mod log;
pub mod segment;
pub mod store;
pub mod traits;

pub use index::Index;
pub use log::{Log, LogReader};
pub use segment::Segment;
pub use store::Store;
pub use traits::CommitLog;
