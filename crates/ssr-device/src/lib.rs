//! Host-facing layer of the `ssr` mirrored block device.
//!
//! `ssr-storage` is the synchronous engine core; this crate binds it to a
//! block-request model and a single-worker FIFO executor. Submitters build
//! [`BioRequest`]s out of page-backed [`Segment`]s and hand them to
//! [`SsrDevice::submit`], which never blocks: the request is queued for the
//! worker thread that owns the mirrored volume, and the completion callback
//! fires from that worker once the request retires. Completions are
//! delivered strictly in submission order.

mod device;
mod dispatcher;
mod request;

pub use device::{
    DeviceConfig, DiskIdentity, SsrDevice, LOGICAL_DISK_NAME, PHYSICAL_DISK1_PATH,
    PHYSICAL_DISK2_PATH, SSR_FIRST_MINOR, SSR_MAJOR, SSR_NUM_MINORS,
};
pub use request::{BioRequest, Completion, Direction, Segment};
