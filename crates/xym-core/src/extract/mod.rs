//! Extraction pipeline for a Symbol data directory.
//!
//! Discovers block and statement files, merges decoded blocks with the
//! statement stream by height, and writes length-prefixed record streams
//! alongside the accumulated state.

mod files;
mod merge;
mod records;

pub use files::{discover_files, ExtractPaths};
pub use merge::{reduce_batch, MergeStats, StreamingMerger};
pub use records::{FileSink, MemorySink, RecordReader, RecordSink, RecordWriter};
