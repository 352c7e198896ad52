//! Two-disk mirrored block storage with per-sector CRC32 integrity.
//!
//! The crate exposes a logical disk whose capacity is the usable portion of
//! either backing store. Every logical sector is written to both stores and
//! carries a CRC32 in a dedicated on-disk region; reads verify both copies
//! and transparently repair a sector that is corrupt on exactly one store.
//! A sector corrupt on both stores fails the request and persists nothing.
//!
//! On-disk layout per backing store (identical on both):
//!
//! | region | first sector        | contents                      |
//! |--------|---------------------|-------------------------------|
//! | data   | 0                   | mirrored user sectors         |
//! | CRC    | `logical_sectors`   | 128 little-endian u32 slots per sector |
//!
//! The request-queue/worker layer lives in the companion `ssr-device` crate;
//! this crate is the synchronous engine core.

mod backend;
mod crc;
mod error;
mod geometry;
mod mirror;
mod page;
mod verify;

pub use backend::{FileBackend, MemBackend, StorageBackend};
pub use crc::{sector_crc, CrcSlab};
pub use error::{DiskError, Result};
pub use geometry::{
    Geometry, CRC_PER_SECTOR, CRC_SLOT_SIZE, LOGICAL_DISK_SIZE, LOGICAL_SECTORS, SECTOR_SIZE,
};
pub use mirror::MirrorVolume;
pub use page::{
    read_page, read_payload, write_page, write_payload, Page, PAGE_SIZE, SECTORS_PER_PAGE,
};
pub use verify::{verify_and_repair, RepairOutcome};
