use std::sync::mpsc::{Receiver, Sender};

use ssr_storage::{MirrorVolume, Result, StorageBackend, SECTOR_SIZE};
use tracing::{debug, trace};

use crate::request::{BioRequest, Completion};

/// One queued unit of work. Handler selection is by variant; the `Sync`
/// barrier flushes both backing stores and acknowledges the waiter once all
/// previously queued requests have retired.
pub(crate) enum WorkItem {
    Read { req: BioRequest, done: Completion },
    Write { req: BioRequest, done: Completion },
    Sync { done: Sender<Result<()>> },
}

/// Body of the single worker thread: drain the FIFO queue until every sender
/// is gone, handling one item at a time. Requests therefore retire strictly
/// in submission order.
pub(crate) fn worker_loop<B: StorageBackend>(
    mut volume: MirrorVolume<B>,
    queue: Receiver<WorkItem>,
) {
    while let Ok(item) = queue.recv() {
        match item {
            WorkItem::Read { mut req, done } => {
                let result = handle_read(&mut volume, &mut req);
                done(req, result);
            }
            WorkItem::Write { req, done } => {
                let result = handle_write(&mut volume, &req);
                done(req, result);
            }
            WorkItem::Sync { done } => {
                trace!("sync barrier reached");
                let _ = done.send(volume.flush());
            }
        }
    }
    debug!("request queue closed, worker exiting");
}

/// Read handler: walk the request's segments in logical-sector order, fill
/// each from the verified mirror.
fn handle_read<B: StorageBackend>(volume: &mut MirrorVolume<B>, req: &mut BioRequest) -> Result<()> {
    let mut sector = req.sector();
    for seg in req.segments_mut() {
        let (offset, len) = (seg.offset(), seg.len());
        volume.read_segment(sector, seg.page_mut(), offset, len)?;
        sector += (len / SECTOR_SIZE) as u64;
    }
    Ok(())
}

/// Write handler: walk the request's segments in logical-sector order,
/// mirror each to both stores.
fn handle_write<B: StorageBackend>(volume: &mut MirrorVolume<B>, req: &BioRequest) -> Result<()> {
    let mut sector = req.sector();
    for seg in req.segments() {
        volume.write_segment(sector, seg.page(), seg.offset(), seg.len())?;
        sector += seg.sectors();
    }
    Ok(())
}
