use std::sync::mpsc;

use ssr_device::{
    BioRequest, DeviceConfig, Segment, SsrDevice, LOGICAL_DISK_NAME, SSR_FIRST_MINOR, SSR_MAJOR,
    SSR_NUM_MINORS,
};
use ssr_storage::{DiskError, Geometry, MemBackend, Page, SECTOR_SIZE};

fn device(sectors: u64) -> SsrDevice {
    let geo = Geometry::new(sectors).unwrap();
    let dev0 = MemBackend::with_len(geo.total_bytes()).unwrap();
    let dev1 = MemBackend::with_len(geo.total_bytes()).unwrap();
    let config = DeviceConfig {
        geometry: geo,
        ..DeviceConfig::default()
    };
    SsrDevice::open(config, dev0, dev1).unwrap()
}

#[test]
fn published_identity_matches_configuration() {
    let device = device(64);
    let identity = device.identity();

    assert_eq!(identity.major, SSR_MAJOR);
    assert_eq!(identity.first_minor, SSR_FIRST_MINOR);
    assert_eq!(identity.minors, SSR_NUM_MINORS);
    assert_eq!(identity.name, LOGICAL_DISK_NAME);
    assert_eq!(identity.block_size, SECTOR_SIZE);
    assert_eq!(identity.capacity_sectors, 64);

    // Host open/release hooks are no-ops.
    device.open_handle().unwrap();
    device.release_handle();
}

#[test]
fn production_config_defaults() {
    let config = DeviceConfig::default();
    assert_eq!(config.geometry, Geometry::SSR);
    assert_eq!(config.geometry.logical_sectors(), 194_560);
    assert_eq!(config.name, "ssr");
    assert_eq!(config.major, 240);
}

#[test]
fn undersized_store_fails_open() {
    let geo = Geometry::new(64).unwrap();
    let config = DeviceConfig {
        geometry: geo,
        ..DeviceConfig::default()
    };
    // Large enough for the data region but not the CRC region.
    let dev0 = MemBackend::with_len(geo.logical_bytes()).unwrap();
    let dev1 = MemBackend::with_len(geo.total_bytes()).unwrap();

    let err = SsrDevice::open(config, dev0, dev1).unwrap_err();
    assert!(matches!(err, DiskError::TooSmall { .. }));
}

#[test]
fn shutdown_drains_pending_requests() {
    let mut device = device(256);

    let (tx, rx) = mpsc::channel();
    for i in 0..10u64 {
        let tx = tx.clone();
        let payload = vec![i as u8; SECTOR_SIZE];
        let mut req = BioRequest::write(i * 8);
        req.push_segment(Segment::from_payload(&payload).unwrap());
        device.submit(req, move |_req, result| {
            result.unwrap();
            tx.send(i).unwrap();
        });
    }

    device.shutdown().unwrap();

    // Every queued request retired before shutdown returned.
    let mut seen: Vec<u64> = rx.try_iter().collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..10).collect::<Vec<_>>());
}

#[test]
fn submit_after_shutdown_completes_with_closed() {
    let mut device = device(64);
    device.shutdown().unwrap();

    let (tx, rx) = mpsc::channel();
    let req = BioRequest::read(0)
        .with_segment(Segment::new(Page::new(), 0, SECTOR_SIZE).unwrap());
    device.submit(req, move |_req, result| {
        tx.send(result).unwrap();
    });
    let err = rx.recv().unwrap().unwrap_err();
    assert_eq!(err, DiskError::Closed);

    assert_eq!(device.sync().unwrap_err(), DiskError::Closed);
}

#[test]
fn shutdown_is_idempotent() {
    let mut device = device(64);
    device.shutdown().unwrap();
    device.shutdown().unwrap();
}

#[test]
fn sync_flushes_after_queued_work() {
    let device = device(256);

    let payload = vec![0x5Au8; SECTOR_SIZE];
    let (tx, rx) = mpsc::channel();
    let mut req = BioRequest::write(0);
    req.push_segment(Segment::from_payload(&payload).unwrap());
    device.submit(req, move |_req, result| {
        tx.send(result).unwrap();
    });

    // sync() returns only after the write above retired.
    device.sync().unwrap();
    rx.try_recv().unwrap().unwrap();
}
