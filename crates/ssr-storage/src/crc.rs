use crate::backend::StorageBackend;
use crate::geometry::{Geometry, CRC_PER_SECTOR, CRC_SLOT_SIZE, SECTOR_SIZE};
use crate::{DiskError, Result};

/// CRC32 of one sector's bytes, seed 0.
pub fn sector_crc(bytes: &[u8]) -> u32 {
    debug_assert_eq!(bytes.len(), SECTOR_SIZE);
    crc32fast::hash(bytes)
}

/// An in-memory view of one or two adjacent CRC sectors of a single backing
/// device.
///
/// Slots are indexed by logical sector number; the slab translates to the
/// right slot within its buffer. `set` marks the owning CRC sector dirty and
/// `store` writes back only dirty sectors, so a read that repairs nothing
/// never rewrites the CRC region.
#[derive(Debug, Clone)]
pub struct CrcSlab {
    /// Absolute device sector of `buf[0..512)`.
    first_crc_sector: u64,
    /// First logical sector whose slot lives in `buf[0..4)`.
    first_sector: u64,
    /// Number of CRC sectors buffered (1 or 2).
    sectors: usize,
    buf: [u8; 2 * SECTOR_SIZE],
    dirty: [bool; 2],
}

impl CrcSlab {
    /// Read the single CRC sector `crc_sector` from `dev`.
    pub fn load<B: StorageBackend>(dev: &mut B, geo: &Geometry, crc_sector: u64) -> Result<Self> {
        let mut slab = Self::zeroed(geo, crc_sector, 1)?;
        dev.read_at(crc_sector * SECTOR_SIZE as u64, &mut slab.buf[..SECTOR_SIZE])?;
        Ok(slab)
    }

    /// Read the 1 or 2 adjacent CRC sectors covering logical sectors
    /// `[sector, sector + count)` from `dev`.
    pub fn load_span<B: StorageBackend>(
        dev: &mut B,
        geo: &Geometry,
        sector: u64,
        count: u64,
    ) -> Result<Self> {
        let (first, n) = geo.crc_span(sector, count);
        let mut slab = Self::zeroed(geo, first, n as usize)?;
        let len = slab.sectors * SECTOR_SIZE;
        dev.read_at(first * SECTOR_SIZE as u64, &mut slab.buf[..len])?;
        Ok(slab)
    }

    /// An all-zero slab for `sectors` CRC sectors starting at `crc_sector`,
    /// not yet backed by device contents. Used when rebuilding the CRC
    /// region from scratch.
    pub fn zeroed(geo: &Geometry, crc_sector: u64, sectors: usize) -> Result<Self> {
        if sectors == 0 || sectors > 2 {
            return Err(DiskError::NotSupported("crc slab wider than two sectors"));
        }
        if crc_sector < geo.logical_sectors()
            || crc_sector + sectors as u64 > geo.total_sectors()
        {
            return Err(DiskError::OutOfBounds {
                offset: crc_sector * SECTOR_SIZE as u64,
                len: sectors * SECTOR_SIZE,
                capacity: geo.total_bytes(),
            });
        }
        Ok(Self {
            first_crc_sector: crc_sector,
            first_sector: geo.first_sector_of_crc(crc_sector),
            sectors,
            buf: [0u8; 2 * SECTOR_SIZE],
            dirty: [false; 2],
        })
    }

    fn slot_offset(&self, sector: u64) -> usize {
        debug_assert!(sector >= self.first_sector);
        let slot = (sector - self.first_sector) as usize;
        debug_assert!(slot < self.sectors * CRC_PER_SECTOR as usize);
        slot * CRC_SLOT_SIZE
    }

    /// Stored CRC for logical sector `sector`.
    pub fn get(&self, sector: u64) -> u32 {
        let off = self.slot_offset(sector);
        u32::from_le_bytes([
            self.buf[off],
            self.buf[off + 1],
            self.buf[off + 2],
            self.buf[off + 3],
        ])
    }

    /// Overwrite the slot for logical sector `sector`, marking its CRC
    /// sector dirty.
    pub fn set(&mut self, sector: u64, crc: u32) {
        let off = self.slot_offset(sector);
        self.buf[off..off + CRC_SLOT_SIZE].copy_from_slice(&crc.to_le_bytes());
        self.dirty[off / SECTOR_SIZE] = true;
    }

    /// Write dirty CRC sectors back to `dev`.
    pub fn store<B: StorageBackend>(&self, dev: &mut B) -> Result<()> {
        for i in 0..self.sectors {
            if !self.dirty[i] {
                continue;
            }
            let sector = self.first_crc_sector + i as u64;
            let range = i * SECTOR_SIZE..(i + 1) * SECTOR_SIZE;
            dev.write_at(sector * SECTOR_SIZE as u64, &self.buf[range])?;
        }
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty[..self.sectors].iter().any(|&d| d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemBackend;

    fn small_geo() -> Geometry {
        // 256 logical sectors, 2 CRC sectors.
        Geometry::new(256).unwrap()
    }

    #[test]
    fn slot_round_trip_across_span() {
        let geo = small_geo();
        let mut dev = MemBackend::with_len(geo.total_bytes()).unwrap();

        let mut slab = CrcSlab::load_span(&mut dev, &geo, 126, 4).unwrap();
        slab.set(126, 0xdead_beef);
        slab.set(129, 0x0123_4567);
        assert_eq!(slab.get(126), 0xdead_beef);
        assert_eq!(slab.get(129), 0x0123_4567);
        slab.store(&mut dev).unwrap();

        let reloaded = CrcSlab::load_span(&mut dev, &geo, 126, 4).unwrap();
        assert_eq!(reloaded.get(126), 0xdead_beef);
        assert_eq!(reloaded.get(127), 0);
        assert_eq!(reloaded.get(128), 0);
        assert_eq!(reloaded.get(129), 0x0123_4567);

        // The single-sector form sees the same slots.
        let single = CrcSlab::load(&mut dev, &geo, geo.crc_sector_of(126)).unwrap();
        assert_eq!(single.get(126), 0xdead_beef);
        assert!(!single.is_dirty());
    }

    #[test]
    fn store_skips_clean_sectors() {
        let geo = small_geo();
        let mut dev = MemBackend::with_len(geo.total_bytes()).unwrap();

        // Scribble over the second CRC sector, then store a slab that only
        // dirtied the first: the scribble must survive.
        let marker = vec![0xEEu8; SECTOR_SIZE];
        dev.write_at((geo.logical_sectors() + 1) * SECTOR_SIZE as u64, &marker)
            .unwrap();

        let mut slab = CrcSlab::load_span(&mut dev, &geo, 120, 16).unwrap();
        slab.set(120, 1);
        slab.store(&mut dev).unwrap();

        let mut back = vec![0u8; SECTOR_SIZE];
        dev.read_at((geo.logical_sectors() + 1) * SECTOR_SIZE as u64, &mut back)
            .unwrap();
        assert_eq!(back, marker);
    }
}
