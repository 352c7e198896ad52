use ssr_storage::{DiskError, FileBackend, StorageBackend};
use tempfile::tempdir;

#[test]
fn open_and_read_at() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("disk.img");

    std::fs::write(&path, b"abcdef").unwrap();

    let mut backend = FileBackend::open_read_only(&path).unwrap();
    assert_eq!(backend.len().unwrap(), 6);

    let mut buf = [0u8; 2];
    backend.read_at(2, &mut buf).unwrap();
    assert_eq!(&buf, b"cd");
}

#[test]
fn write_at_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("disk.img");

    let mut backend = FileBackend::create(&path, 16).unwrap();
    backend.write_at(0, b"hello world").unwrap();
    backend.write_at(6, b"WORLD").unwrap();

    let mut buf = [0u8; 11];
    backend.read_at(0, &mut buf).unwrap();
    assert_eq!(&buf, b"hello WORLD");
}

#[test]
fn write_extends_file_and_zero_fills_gap() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("disk.img");

    let mut backend = FileBackend::create(&path, 4).unwrap();
    backend.write_at(6, &[0xAA, 0xBB]).unwrap();
    assert_eq!(backend.len().unwrap(), 8);

    let mut gap = [0xFFu8; 2];
    backend.read_at(4, &mut gap).unwrap();
    assert_eq!(gap, [0, 0]);

    let mut tail = [0u8; 2];
    backend.read_at(6, &mut tail).unwrap();
    assert_eq!(tail, [0xAA, 0xBB]);
}

#[test]
fn read_beyond_eof_is_out_of_bounds() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("disk.img");

    let mut backend = FileBackend::create(&path, 4).unwrap();
    backend.write_at(0, &[1, 2, 3, 4]).unwrap();

    let mut buf = [0u8; 2];
    let err = backend.read_at(3, &mut buf).unwrap_err();
    assert!(matches!(err, DiskError::OutOfBounds { .. }));
}

#[test]
fn contents_persist_across_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("disk.img");

    {
        let mut backend = FileBackend::create(&path, 1024).unwrap();
        backend.write_at(100, &[9, 8, 7, 6]).unwrap();
        backend.flush().unwrap();
    }

    let mut backend = FileBackend::open_rw(&path).unwrap();
    let mut back = [0u8; 4];
    backend.read_at(100, &mut back).unwrap();
    assert_eq!(back, [9, 8, 7, 6]);
}

#[test]
fn read_only_rejects_writes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("disk.img");

    {
        let mut backend = FileBackend::create(&path, 4).unwrap();
        backend.write_at(0, &[1, 2, 3, 4]).unwrap();
        backend.flush().unwrap();
    }

    let mut backend = FileBackend::open_read_only(&path).unwrap();
    backend.flush().unwrap();
    let err = backend.write_at(0, &[9]).unwrap_err();
    assert!(matches!(
        err,
        DiskError::NotSupported(msg) if msg == "read-only backend"
    ));

    let err = backend.set_len(8).unwrap_err();
    assert!(matches!(
        err,
        DiskError::NotSupported(msg) if msg == "read-only backend"
    ));
}

#[test]
fn reports_offset_overflow() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("disk.img");

    let mut backend = FileBackend::create(&path, 4).unwrap();

    let mut buf = [0u8; 1];
    let err = backend.read_at(u64::MAX, &mut buf).unwrap_err();
    assert!(matches!(err, DiskError::OffsetOverflow));

    let err = backend.write_at(u64::MAX, &buf).unwrap_err();
    assert!(matches!(err, DiskError::OffsetOverflow));
}
