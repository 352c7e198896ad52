use crate::backend::StorageBackend;
use crate::geometry::SECTOR_SIZE;
use crate::{DiskError, Result};

/// Size of one page buffer in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Sectors covered by one full page.
pub const SECTORS_PER_PAGE: u64 = (PAGE_SIZE / SECTOR_SIZE) as u64;

/// An owned, heap-allocated page buffer.
///
/// Pages are the unit of transient buffering inside the engine and the unit
/// request segments point into.
#[derive(Clone)]
pub struct Page(Box<[u8; PAGE_SIZE]>);

impl Page {
    pub fn new() -> Self {
        Self(Box::new([0u8; PAGE_SIZE]))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.0[..]
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page").finish_non_exhaustive()
    }
}

/// Validate a `(offset, len)` access into one page: positive, whole sectors,
/// inside the page.
pub(crate) fn check_page_access(offset: usize, len: usize) -> Result<()> {
    if len == 0 || len % SECTOR_SIZE != 0 || offset % SECTOR_SIZE != 0 {
        return Err(DiskError::Misaligned { offset, len });
    }
    match offset.checked_add(len) {
        Some(end) if end <= PAGE_SIZE => Ok(()),
        _ => Err(DiskError::Misaligned { offset, len }),
    }
}

fn byte_offset(sector: u64) -> Result<u64> {
    sector
        .checked_mul(SECTOR_SIZE as u64)
        .ok_or(DiskError::OffsetOverflow)
}

/// Fill bytes `[offset, offset + len)` of `page` from device sector `sector`
/// onward. Blocks until the backing store completes.
pub fn read_page<B: StorageBackend>(
    dev: &mut B,
    sector: u64,
    page: &mut Page,
    offset: usize,
    len: usize,
) -> Result<()> {
    check_page_access(offset, len)?;
    let pos = byte_offset(sector)?;
    dev.read_at(pos, &mut page.as_bytes_mut()[offset..offset + len])
}

/// Write bytes `[offset, offset + len)` of `page` to device sector `sector`
/// onward. Blocks until the backing store completes.
pub fn write_page<B: StorageBackend>(
    dev: &mut B,
    sector: u64,
    page: &Page,
    offset: usize,
    len: usize,
) -> Result<()> {
    check_page_access(offset, len)?;
    let pos = byte_offset(sector)?;
    dev.write_at(pos, &page.as_bytes()[offset..offset + len])
}

/// Read `buf.len()` bytes starting at `sector` into a caller-owned buffer,
/// staging through a transient page. `buf` must be a positive multiple of the
/// sector size.
pub fn read_payload<B: StorageBackend>(dev: &mut B, sector: u64, buf: &mut [u8]) -> Result<()> {
    if buf.is_empty() || buf.len() % SECTOR_SIZE != 0 {
        return Err(DiskError::Misaligned {
            offset: 0,
            len: buf.len(),
        });
    }
    let mut page = Page::new();
    let mut sector = sector;
    for chunk in buf.chunks_mut(PAGE_SIZE) {
        read_page(dev, sector, &mut page, 0, chunk.len())?;
        chunk.copy_from_slice(&page.as_bytes()[..chunk.len()]);
        sector += (chunk.len() / SECTOR_SIZE) as u64;
    }
    Ok(())
}

/// Write a caller-owned buffer to `sector` onward through a transient page.
/// `buf` must be a positive multiple of the sector size.
pub fn write_payload<B: StorageBackend>(dev: &mut B, sector: u64, buf: &[u8]) -> Result<()> {
    if buf.is_empty() || buf.len() % SECTOR_SIZE != 0 {
        return Err(DiskError::Misaligned {
            offset: 0,
            len: buf.len(),
        });
    }
    let mut page = Page::new();
    let mut sector = sector;
    for chunk in buf.chunks(PAGE_SIZE) {
        page.as_bytes_mut()[..chunk.len()].copy_from_slice(chunk);
        write_page(dev, sector, &page, 0, chunk.len())?;
        sector += (chunk.len() / SECTOR_SIZE) as u64;
    }
    Ok(())
}
