//! Disk I/O for the container file

use crate::error::{ChainFsError, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Open handle on a fixed-size container file
///
/// Held for the lifetime of the engine; closed on drop.
pub struct ContainerFile {
    file: File,
    path: PathBuf,
    size: u64,
}

impl ContainerFile {
    /// Create (or truncate) a container and zero-fill it to `size` bytes
    pub fn create<P: AsRef<Path>>(path: P, size: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        file.set_len(size)?;
        file.sync_all()?;

        Ok(ContainerFile {
            file,
            path: path.as_ref().to_path_buf(),
            size,
        })
    }

    /// Open an existing container that must hold at least `expected_size` bytes
    pub fn open<P: AsRef<Path>>(path: P, expected_size: u64) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let actual = file.metadata()?.len();
        if actual < expected_size {
            return Err(ChainFsError::ContainerSize {
                expected: expected_size,
                actual,
            });
        }

        Ok(ContainerFile {
            file,
            path: path.as_ref().to_path_buf(),
            size: expected_size,
        })
    }

    /// Read exactly `buf.len()` bytes at `offset`
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.check_range(offset, buf.len())?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    /// Write all of `data` at `offset`
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.check_range(offset, data.len())?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        Ok(())
    }

    fn check_range(&self, offset: u64, len: usize) -> Result<()> {
        if offset + len as u64 > self.size {
            return Err(ChainFsError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "access of {} bytes at {} beyond container end {}",
                    len, offset, self.size
                ),
            )));
        }
        Ok(())
    }

    /// Get file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Sync all writes to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}
