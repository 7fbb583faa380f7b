use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use url::Url;

use crate::error::{Error, Result};
use crate::storage::Storage;

/// Local filesystem storage (rooted at the host filesystem).
#[derive(Debug, Clone, Default)]
pub struct FsStorage;

impl FsStorage {
    pub fn new() -> Self {
        Self
    }
}

/// Turn a bare path or a `file://` URI into a local path.
pub(crate) fn resolve_path(path: &str) -> Result<PathBuf> {
    if path.starts_with("file:") {
        let url = Url::parse(path).map_err(|_| Error::Path(path.to_string()))?;
        return url.to_file_path().map_err(|_| Error::Path(path.to_string()));
    }
    if path.contains("://") {
        return Err(Error::Storage(format!(
            "unsupported scheme in '{path}'; only local files are readable"
        )));
    }
    Ok(PathBuf::from(path))
}

impl Storage for FsStorage {
    fn write(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let p = resolve_path(path)?;
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut f = File::create(&p)?;
        f.write_all(bytes)?;
        f.flush()?;
        Ok(())
    }

    fn read_range(&self, path: &str, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut f = File::open(resolve_path(path)?)?;
        f.seek(SeekFrom::Start(offset))?;
        let mut buf = Vec::with_capacity(len);
        f.take(len as u64).read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn size(&self, path: &str) -> Result<u64> {
        Ok(fs::metadata(resolve_path(path)?)?.len())
    }

    fn delete(&self, path: &str) -> Result<()> {
        let p = resolve_path(path)?;
        if Path::new(&p).exists() {
            fs::remove_file(p)?;
        }
        Ok(())
    }
}
