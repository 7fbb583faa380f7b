#![forbid(unsafe_code)]
//! splitscan-io: storage adapters and byte-range readers for file splits.
//!
//! A file split names a byte range `[start, start + length)` of one file.
//! The readers here turn such a range into `RowBatch`es of the requested
//! columns, assigning every line to exactly one split of the file.

pub mod error;
pub mod readers;
pub mod storage;

pub use error::{Error, Result};
pub use readers::{CsvRangeReader, JsonlRangeReader, LineRangeReader};
pub use storage::{FsStorage, MemoryStorage, Storage};
