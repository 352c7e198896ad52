use tracing::warn;

use crate::crc::{sector_crc, CrcSlab};
use crate::geometry::SECTOR_SIZE;
use crate::page::Page;
use crate::{DiskError, Result};

/// What a verification pass did to the in-memory copies.
///
/// `repaired[i]` means device `i`'s data page and/or CRC slab was patched
/// and must be written back. The slabs track their own dirtiness; the flag
/// here gates the data-page write-back.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepairOutcome {
    pub repaired: [bool; 2],
}

/// Verify logical sectors `[start, start + count)` held in `p0`/`p1`
/// (loaded from device 0 and 1 at in-page offset 0) against the stored CRCs
/// in `slab0`/`slab1`, repairing single-sided corruption in memory.
///
/// Classification per sector: if exactly one device's stored CRC disagrees
/// with its data, the surviving copy overwrites the bad data bytes and the
/// bad slab slot. If both disagree the whole request is aborted with
/// [`DiskError::Corrupt`] and the caller must not write anything back.
pub fn verify_and_repair(
    start: u64,
    count: usize,
    p0: &mut Page,
    p1: &mut Page,
    slab0: &mut CrcSlab,
    slab1: &mut CrcSlab,
) -> Result<RepairOutcome> {
    let mut outcome = RepairOutcome::default();

    for i in 0..count {
        let sector = start + i as u64;
        let range = i * SECTOR_SIZE..(i + 1) * SECTOR_SIZE;

        let real0 = sector_crc(&p0.as_bytes()[range.clone()]);
        let real1 = sector_crc(&p1.as_bytes()[range.clone()]);
        let good0 = slab0.get(sector) == real0;
        let good1 = slab1.get(sector) == real1;

        match (good0, good1) {
            (true, true) => {}
            (true, false) => {
                let (src, dst) = (p0.as_bytes(), p1.as_bytes_mut());
                dst[range.clone()].copy_from_slice(&src[range.clone()]);
                slab1.set(sector, real0);
                outcome.repaired[1] = true;
                warn!(sector, device = 1, "repaired mirror copy from device 0");
            }
            (false, true) => {
                let (src, dst) = (p1.as_bytes(), p0.as_bytes_mut());
                dst[range.clone()].copy_from_slice(&src[range.clone()]);
                slab0.set(sector, real1);
                outcome.repaired[0] = true;
                warn!(sector, device = 0, "repaired mirror copy from device 1");
            }
            (false, false) => {
                warn!(sector, "both mirror copies fail CRC verification");
                return Err(DiskError::Corrupt { sector });
            }
        }
    }

    Ok(outcome)
}
