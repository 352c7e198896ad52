use tracing::{debug, info, trace};

use crate::backend::StorageBackend;
use crate::crc::{sector_crc, CrcSlab};
use crate::geometry::{Geometry, CRC_PER_SECTOR, SECTOR_SIZE};
use crate::page::{check_page_access, read_page, write_page, Page, PAGE_SIZE, SECTORS_PER_PAGE};
use crate::verify::verify_and_repair;
use crate::{DiskError, Result};

/// A two-disk mirrored volume with per-sector CRC32 verification.
///
/// Every logical sector is written to both backing stores; every read is
/// verified against the CRC region of both stores, and a sector corrupt on
/// exactly one store is repaired from the surviving copy before the read
/// completes. A sector corrupt on both stores fails the whole request and
/// persists nothing.
pub struct MirrorVolume<B> {
    devs: [B; 2],
    geometry: Geometry,
}

impl<B: StorageBackend> MirrorVolume<B> {
    /// Take ownership of the two backing stores. Each must hold at least
    /// `geometry.total_bytes()` (data region + CRC region).
    pub fn open(mut dev0: B, mut dev1: B, geometry: Geometry) -> Result<Self> {
        let required = geometry.total_bytes();
        for dev in [&mut dev0, &mut dev1] {
            let actual = dev.len()?;
            if actual < required {
                return Err(DiskError::TooSmall { required, actual });
            }
        }
        debug!(
            logical_sectors = geometry.logical_sectors(),
            crc_sectors = geometry.crc_sectors(),
            "mirrored volume opened"
        );
        Ok(Self {
            devs: [dev0, dev1],
            geometry,
        })
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn capacity_sectors(&self) -> u64 {
        self.geometry.logical_sectors()
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.geometry.logical_bytes()
    }

    /// Read path for one segment: fill `out[offset..offset + len)` with
    /// verified bytes starting at logical `sector`.
    ///
    /// Both copies are staged into engine-owned pages so the caller's page
    /// is never touched by unverified bytes; single-sided corruption is
    /// repaired on the owning store (and only there) before the copy-out.
    pub fn read_segment(
        &mut self,
        sector: u64,
        out: &mut Page,
        offset: usize,
        len: usize,
    ) -> Result<()> {
        check_page_access(offset, len)?;
        let count = len / SECTOR_SIZE;
        let geometry = self.geometry;
        geometry.check_range(sector, count as u64)?;
        trace!(sector, count, "read segment");

        let [dev0, dev1] = &mut self.devs;

        let mut p0 = Page::new();
        let mut p1 = Page::new();
        read_page(dev0, sector, &mut p0, 0, len)?;
        read_page(dev1, sector, &mut p1, 0, len)?;

        let mut slab0 = CrcSlab::load_span(dev0, &geometry, sector, count as u64)?;
        let mut slab1 = CrcSlab::load_span(dev1, &geometry, sector, count as u64)?;

        let outcome = verify_and_repair(sector, count, &mut p0, &mut p1, &mut slab0, &mut slab1)?;

        // Only after the full range classified clean: persist repairs to the
        // repaired store alone.
        if outcome.repaired[0] {
            write_page(dev0, sector, &p0, 0, len)?;
            slab0.store(dev0)?;
        }
        if outcome.repaired[1] {
            write_page(dev1, sector, &p1, 0, len)?;
            slab1.store(dev1)?;
        }

        out.as_bytes_mut()[offset..offset + len].copy_from_slice(&p0.as_bytes()[..len]);
        Ok(())
    }

    /// Write path for one segment: persist `src[offset..offset + len)` at
    /// logical `sector` on both stores and refresh the covered CRC slots.
    ///
    /// The payload goes straight from the caller's page to both devices; the
    /// CRC slab is loaded from device 0, every covered slot recomputed from
    /// the bytes just persisted, and the slab stored to both devices.
    pub fn write_segment(
        &mut self,
        sector: u64,
        src: &Page,
        offset: usize,
        len: usize,
    ) -> Result<()> {
        check_page_access(offset, len)?;
        let count = len / SECTOR_SIZE;
        let geometry = self.geometry;
        geometry.check_range(sector, count as u64)?;
        trace!(sector, count, "write segment");

        let [dev0, dev1] = &mut self.devs;

        write_page(dev0, sector, src, offset, len)?;
        write_page(dev1, sector, src, offset, len)?;

        let mut slab = CrcSlab::load_span(dev0, &geometry, sector, count as u64)?;
        for i in 0..count {
            let at = offset + i * SECTOR_SIZE;
            let crc = sector_crc(&src.as_bytes()[at..at + SECTOR_SIZE]);
            slab.set(sector + i as u64, crc);
        }
        slab.store(dev0)?;
        slab.store(dev1)?;
        Ok(())
    }

    /// Read a caller buffer's worth of sectors, page-sized chunk at a time.
    /// `buf` must be a positive multiple of the sector size.
    pub fn read_sectors(&mut self, sector: u64, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() || buf.len() % SECTOR_SIZE != 0 {
            return Err(DiskError::Misaligned {
                offset: 0,
                len: buf.len(),
            });
        }
        let mut page = Page::new();
        let mut sector = sector;
        for chunk in buf.chunks_mut(PAGE_SIZE) {
            self.read_segment(sector, &mut page, 0, chunk.len())?;
            chunk.copy_from_slice(&page.as_bytes()[..chunk.len()]);
            sector += (chunk.len() / SECTOR_SIZE) as u64;
        }
        Ok(())
    }

    /// Write a caller buffer's worth of sectors, page-sized chunk at a time.
    /// `buf` must be a positive multiple of the sector size.
    pub fn write_sectors(&mut self, sector: u64, buf: &[u8]) -> Result<()> {
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
            self.write_segment(sector, &page, 0, chunk.len())?;
            sector += (chunk.len() / SECTOR_SIZE) as u64;
        }
        Ok(())
    }

    /// Rebuild the whole CRC region of both stores from their current data
    /// bytes.
    ///
    /// This is the explicit provisioning step for stores whose CRC region
    /// was never initialized (e.g. fresh disk images): afterwards every
    /// sector verifies against its own device's content. It does not make
    /// the mirrors byte-identical; run it on zeroed or identical stores.
    pub fn format(&mut self) -> Result<()> {
        info!("rebuilding crc region on both stores");
        let geometry = self.geometry;
        for dev in &mut self.devs {
            rebuild_crc_region(dev, &geometry)?;
        }
        Ok(())
    }

    /// Flush both backing stores.
    pub fn flush(&mut self) -> Result<()> {
        for dev in &mut self.devs {
            dev.flush()?;
        }
        Ok(())
    }

    /// Direct access to one backing store, bypassing mirroring and
    /// verification. Intended for tests and recovery tooling.
    pub fn backend_mut(&mut self, index: usize) -> &mut B {
        &mut self.devs[index]
    }

    pub fn into_backends(self) -> (B, B) {
        let [dev0, dev1] = self.devs;
        (dev0, dev1)
    }
}

fn rebuild_crc_region<B: StorageBackend>(dev: &mut B, geo: &Geometry) -> Result<()> {
    let mut page = Page::new();
    let mut crc_sector = geo.crc_sector_of(0);

    for chunk_start in (0..geo.logical_sectors()).step_by(CRC_PER_SECTOR as usize) {
        let chunk_len = CRC_PER_SECTOR.min(geo.logical_sectors() - chunk_start);
        let mut slab = CrcSlab::zeroed(geo, crc_sector, 1)?;

        let mut sector = chunk_start;
        while sector < chunk_start + chunk_len {
            let batch = SECTORS_PER_PAGE.min(chunk_start + chunk_len - sector);
            let len = batch as usize * SECTOR_SIZE;
            read_page(dev, sector, &mut page, 0, len)?;
            for i in 0..batch as usize {
                let crc = sector_crc(&page.as_bytes()[i * SECTOR_SIZE..(i + 1) * SECTOR_SIZE]);
                slab.set(sector + i as u64, crc);
            }
            sector += batch;
        }

        slab.store(dev)?;
        crc_sector += 1;
    }
    Ok(())
}
