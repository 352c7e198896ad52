use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::{DiskError, Result};

/// A byte-addressed backing store standing in for one physical disk.
///
/// The engine holds exactly two of these and performs all I/O through this
/// trait, so tests can run over in-memory stores and production over block
/// device nodes.
pub trait StorageBackend {
    /// Current length of the store in bytes.
    fn len(&mut self) -> Result<u64>;

    /// Grow or shrink the store to `len` bytes.
    fn set_len(&mut self, len: u64) -> Result<()>;

    /// Fill `buf` from the store starting at `offset`.
    ///
    /// Reading past the end of the store is an error, not a short read.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Write `buf` to the store starting at `offset`, extending the store
    /// (zero-filling any gap) if the write lands past the current end.
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()>;

    /// Persist any buffered writes.
    fn flush(&mut self) -> Result<()>;
}

fn end_of(offset: u64, len: usize) -> Result<u64> {
    let len: u64 = len.try_into().map_err(|_| DiskError::OffsetOverflow)?;
    offset.checked_add(len).ok_or(DiskError::OffsetOverflow)
}

/// Growable in-memory backing store.
#[derive(Debug, Clone, Default)]
pub struct MemBackend {
    data: Vec<u8>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn with_len(len: u64) -> Result<Self> {
        let len: usize = len.try_into().map_err(|_| DiskError::OffsetOverflow)?;
        Ok(Self {
            data: vec![0u8; len],
        })
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl StorageBackend for MemBackend {
    fn len(&mut self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        let len: usize = len.try_into().map_err(|_| DiskError::OffsetOverflow)?;
        self.data.resize(len, 0);
        Ok(())
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let end = end_of(offset, buf.len())?;
        if end > self.data.len() as u64 {
            return Err(DiskError::OutOfBounds {
                offset,
                len: buf.len(),
                capacity: self.data.len() as u64,
            });
        }
        let offset = offset as usize;
        buf.copy_from_slice(&self.data[offset..offset + buf.len()]);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        let end = end_of(offset, buf.len())?;
        let end: usize = end.try_into().map_err(|_| DiskError::OffsetOverflow)?;
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        let offset = offset as usize;
        self.data[offset..end].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// File-backed store, used to sit on top of a disk image or a block device
/// node such as `/dev/vdb`.
#[derive(Debug)]
pub struct FileBackend {
    file: File,
    read_only: bool,
}

impl FileBackend {
    /// Create (or truncate) a file of exactly `len` bytes.
    pub fn create<P: AsRef<Path>>(path: P, len: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(len)?;
        Ok(Self {
            file,
            read_only: false,
        })
    }

    /// Open an existing file for read+write access.
    pub fn open_rw<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self {
            file,
            read_only: false,
        })
    }

    /// Open an existing file for read-only access. Mutating operations fail
    /// with [`DiskError::NotSupported`].
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        Ok(Self {
            file,
            read_only: true,
        })
    }
}

impl StorageBackend for FileBackend {
    fn len(&mut self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        if self.read_only {
            return Err(DiskError::NotSupported("read-only backend"));
        }
        self.file.set_len(len)?;
        Ok(())
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let end = end_of(offset, buf.len())?;
        let capacity = self.file.metadata()?.len();
        if end > capacity {
            return Err(DiskError::OutOfBounds {
                offset,
                len: buf.len(),
                capacity,
            });
        }
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        if self.read_only {
            return Err(DiskError::NotSupported("read-only backend"));
        }
        end_of(offset, buf.len())?;
        // Seeking past EOF and writing extends the file; the gap reads back
        // as zeros.
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.read_only {
            return Ok(());
        }
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }
}
