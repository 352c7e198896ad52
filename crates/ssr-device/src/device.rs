use std::path::Path;
use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;

use ssr_storage::{
    DiskError, FileBackend, Geometry, MirrorVolume, Result, StorageBackend, SECTOR_SIZE,
};
use tracing::{info, warn};

use crate::dispatcher::{worker_loop, WorkItem};
use crate::request::{BioRequest, Completion, Direction};

/// Reserved block-subsystem major number of the logical device.
pub const SSR_MAJOR: u32 = 240;
pub const SSR_FIRST_MINOR: u32 = 0;
pub const SSR_NUM_MINORS: u32 = 1;

/// Name the logical device is published under.
pub const LOGICAL_DISK_NAME: &str = "ssr";

/// Default backing device nodes.
pub const PHYSICAL_DISK1_PATH: &str = "/dev/vdb";
pub const PHYSICAL_DISK2_PATH: &str = "/dev/vdc";

/// Construction-time parameters of the logical device.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub geometry: Geometry,
    pub name: String,
    pub major: u32,
    pub first_minor: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            geometry: Geometry::SSR,
            name: LOGICAL_DISK_NAME.to_string(),
            major: SSR_MAJOR,
            first_minor: SSR_FIRST_MINOR,
        }
    }
}

/// The identity the logical device is published with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskIdentity {
    pub major: u32,
    pub first_minor: u32,
    pub minors: u32,
    pub name: String,
    pub block_size: usize,
    pub capacity_sectors: u64,
}

/// The published mirrored block device: accepts requests on the submitter
/// side, services them on a single worker thread that owns the volume.
///
/// Construction acquires resources in order (backing stores, volume, worker);
/// any failure releases what was already acquired in reverse. Shutdown drains
/// the queue, flushes both stores and joins the worker.
pub struct SsrDevice {
    identity: DiskIdentity,
    geometry: Geometry,
    queue: Option<Sender<WorkItem>>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for SsrDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SsrDevice")
            .field("identity", &self.identity)
            .field("geometry", &self.geometry)
            .field("queue_open", &self.queue.is_some())
            .field("worker_running", &self.worker.is_some())
            .finish()
    }
}

impl SsrDevice {
    /// Publish a device over two already-opened backing stores.
    pub fn open<B>(config: DeviceConfig, dev0: B, dev1: B) -> Result<Self>
    where
        B: StorageBackend + Send + 'static,
    {
        let geometry = config.geometry;
        let volume = MirrorVolume::open(dev0, dev1, geometry)?;

        let identity = DiskIdentity {
            major: config.major,
            first_minor: config.first_minor,
            minors: SSR_NUM_MINORS,
            name: config.name,
            block_size: SECTOR_SIZE,
            capacity_sectors: geometry.logical_sectors(),
        };

        let (tx, rx) = mpsc::channel();
        let worker = std::thread::Builder::new()
            .name(format!("{}-worker", identity.name))
            .spawn(move || worker_loop(volume, rx))
            .map_err(|e| DiskError::Io(e.to_string()))?;

        info!(
            name = %identity.name,
            major = identity.major,
            capacity_sectors = identity.capacity_sectors,
            "logical device published"
        );

        Ok(Self {
            identity,
            geometry,
            queue: Some(tx),
            worker: Some(worker),
        })
    }

    /// Open both backing device nodes read+write and publish over them.
    pub fn open_paths<P: AsRef<Path>>(config: DeviceConfig, path0: P, path1: P) -> Result<Self> {
        let dev0 = FileBackend::open_rw(path0)?;
        // A failure here drops (closes) dev0 before returning.
        let dev1 = FileBackend::open_rw(path1)?;
        Self::open(config, dev0, dev1)
    }

    pub fn identity(&self) -> &DiskIdentity {
        &self.identity
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn capacity_sectors(&self) -> u64 {
        self.geometry.logical_sectors()
    }

    /// Host open hook: nothing to do, always succeeds.
    pub fn open_handle(&self) -> Result<()> {
        Ok(())
    }

    /// Host release hook: nothing to do.
    pub fn release_handle(&self) {}

    /// Submit one request. Never blocks and performs no I/O on the calling
    /// thread: the request is validated against the geometry, enqueued for
    /// the worker and acknowledged immediately. `done` fires exactly once,
    /// from the worker, in submission order; if the request cannot be
    /// queued it fires here with the reason.
    pub fn submit<F>(&self, req: BioRequest, done: F)
    where
        F: FnOnce(BioRequest, Result<()>) + Send + 'static,
    {
        let done: Completion = Box::new(done);

        let sectors = req.total_sectors();
        if sectors == 0 {
            done(req, Err(DiskError::NotSupported("empty request")));
            return;
        }
        if let Err(e) = self.geometry.check_range(req.sector(), sectors) {
            done(req, Err(e));
            return;
        }

        let Some(queue) = &self.queue else {
            done(req, Err(DiskError::Closed));
            return;
        };

        let item = match req.direction() {
            Direction::Read => WorkItem::Read { req, done },
            Direction::Write => WorkItem::Write { req, done },
        };
        if let Err(mpsc::SendError(item)) = queue.send(item) {
            // Worker is gone; hand the request back with the failure.
            match item {
                WorkItem::Read { req, done } | WorkItem::Write { req, done } => {
                    done(req, Err(DiskError::Closed));
                }
                WorkItem::Sync { .. } => {}
            }
        }
    }

    /// Wait until every previously submitted request has retired, then
    /// flush both backing stores.
    pub fn sync(&self) -> Result<()> {
        let Some(queue) = &self.queue else {
            return Err(DiskError::Closed);
        };
        let (ack_tx, ack_rx) = mpsc::channel();
        queue
            .send(WorkItem::Sync { done: ack_tx })
            .map_err(|_| DiskError::Closed)?;
        ack_rx.recv().map_err(|_| DiskError::Closed)?
    }

    /// Tear down: drain pending work, flush both stores, close the queue and
    /// join the worker. Idempotent.
    pub fn shutdown(&mut self) -> Result<()> {
        let mut result = Ok(());
        let was_open = self.queue.is_some();
        if was_open {
            result = self.sync();
            // Closing the queue lets the worker drain out and exit.
            self.queue = None;
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("worker thread panicked during shutdown");
                result = Err(DiskError::Io("worker thread panicked".into()));
            }
        }
        if was_open {
            info!(name = %self.identity.name, "logical device removed");
        }
        result
    }
}

impl Drop for SsrDevice {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
