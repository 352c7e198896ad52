use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = DiskError> = core::result::Result<T, E>;

/// Errors surfaced by backing stores and the mirrored volume.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiskError {
    /// Underlying storage failed (filesystem error, injected fault, ...).
    #[error("i/o error: {0}")]
    Io(String),

    /// Access extends past the end of the store or the addressable range.
    #[error("out of bounds: offset {offset} + len {len} exceeds capacity {capacity}")]
    OutOfBounds {
        offset: u64,
        len: usize,
        capacity: u64,
    },

    /// Offset arithmetic overflowed `u64`.
    #[error("offset overflow")]
    OffsetOverflow,

    /// The operation is not available on this handle.
    #[error("not supported: {0}")]
    NotSupported(&'static str),

    /// Length is not a positive multiple of the sector size, or the access
    /// does not fit inside one page.
    #[error("misaligned access: offset {offset}, len {len}")]
    Misaligned { offset: usize, len: usize },

    /// A backing store is smaller than the configured geometry requires.
    #[error("backing store holds {actual} bytes, geometry requires {required}")]
    TooSmall { required: u64, actual: u64 },

    /// Both mirror copies of a sector disagree with their stored CRCs.
    #[error("sector {sector} is corrupt on both mirrors")]
    Corrupt { sector: u64 },

    /// The device has been shut down; no further requests are accepted.
    #[error("device is shut down")]
    Closed,
}

impl From<std::io::Error> for DiskError {
    fn from(err: std::io::Error) -> Self {
        DiskError::Io(err.to_string())
    }
}
