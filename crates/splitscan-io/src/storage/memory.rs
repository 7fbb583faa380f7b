//! In-memory storage backend for testing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::storage::Storage;

/// Thread-safe in-memory storage using a HashMap.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    data: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.data
            .lock()
            .map_err(|_| Error::Storage("memory storage lock poisoned".into()))
    }

    /// Check if a path exists
    pub fn contains(&self, path: &str) -> bool {
        self.lock().map(|d| d.contains_key(path)).unwrap_or(false)
    }
}

impl Storage for MemoryStorage {
    fn write(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.lock()?.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read_range(&self, path: &str, offset: u64, len: usize) -> Result<Vec<u8>> {
        let data = self.lock()?;
        let bytes = data
            .get(path)
            .ok_or_else(|| Error::Storage(format!("path not found: {}", path)))?;

        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(bytes.len());
        let end = start.saturating_add(len).min(bytes.len());
        Ok(bytes[start..end].to_vec())
    }

    fn size(&self, path: &str) -> Result<u64> {
        let data = self.lock()?;
        let bytes = data
            .get(path)
            .ok_or_else(|| Error::Storage(format!("path not found: {}", path)))?;
        Ok(bytes.len() as u64)
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.lock()?.remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_read_range() {
        let storage = MemoryStorage::new();
        storage.write("t/file.txt", b"hello world").unwrap();

        assert_eq!(storage.read_range("t/file.txt", 6, 5).unwrap(), b"world");
        assert_eq!(storage.read_range("t/file.txt", 6, 500).unwrap(), b"world");
        assert!(storage.read_range("t/file.txt", 50, 5).unwrap().is_empty());
        assert!(storage.read_range("missing", 0, 1).is_err());
    }

    #[test]
    fn test_memory_storage_delete() {
        let storage = MemoryStorage::new();
        storage.write("t/file.txt", b"data").unwrap();
        assert!(storage.contains("t/file.txt"));
        storage.delete("t/file.txt").unwrap();
        assert!(!storage.contains("t/file.txt"));
        assert!(storage.size("t/file.txt").is_err());
    }
}
