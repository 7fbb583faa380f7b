//! Storage adapters that file readers pull bytes through.
//!
//! - `fs`: Local filesystem (accepts bare paths and `file://` URIs).
//! - `memory`: HashMap-backed store for tests.

mod fs;
mod memory;

pub use fs::FsStorage;
pub use memory::MemoryStorage;

use crate::error::Result;

/// Byte-addressable object storage.
pub trait Storage: Send + Sync {
    /// Write bytes to a path. Creates parent directories if needed.
    fn write(&self, path: &str, bytes: &[u8]) -> Result<()>;

    /// Read up to `len` bytes starting at `offset`.
    ///
    /// Short reads happen only at end of file; reading at or past the end
    /// returns an empty vector.
    fn read_range(&self, path: &str, offset: u64, len: usize) -> Result<Vec<u8>>;

    /// Size of a path in bytes.
    fn size(&self, path: &str) -> Result<u64>;

    /// Delete a path. Idempotent (no error if path doesn't exist).
    fn delete(&self, path: &str) -> Result<()>;
}
