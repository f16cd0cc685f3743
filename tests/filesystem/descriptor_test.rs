/*!
 * Descriptor Tests
 * Directory operations, metadata, and handle lifetime through the host surface
 */

use crate::common::Sandbox;
use ai_os_wasi::filesystem::{DescriptorType, NewTimestamp, OpenFlags, PathFlags, Rights};
use ai_os_wasi::{ErrorCode, HostError, ProtocolViolation};
use pretty_assertions::assert_eq;

#[test]
fn test_directory_listing_single_pass() {
    let sandbox = Sandbox::new();
    let host = &sandbox.host;
    let root = sandbox.root();
    std::fs::write(sandbox.dir.path().join("one.txt"), b"1").unwrap();
    host.create_directory_at(root, "sub").unwrap();

    let listing = host.read_directory(root).unwrap();
    let mut entries = Vec::new();
    while let Some(entry) = host.read_directory_entry(listing).unwrap() {
        entries.push((entry.name, entry.kind));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        entries,
        vec![
            ("one.txt".to_string(), DescriptorType::RegularFile),
            ("sub".to_string(), DescriptorType::Directory),
        ]
    );
    assert_eq!(host.read_directory_entry(listing).unwrap(), None);

    // Listing cannot be restarted on the same descriptor
    assert_eq!(
        host.read_directory(root).unwrap_err(),
        HostError::Code(ErrorCode::InvalidArgument)
    );
}

#[test]
fn test_stat_and_set_size() {
    let sandbox = Sandbox::new();
    let host = &sandbox.host;
    let root = sandbox.root();

    let file = host
        .open_at(root, PathFlags::default(), "f.bin", OpenFlags::create(), Rights::ALL)
        .unwrap();
    host.write(file, &[7u8; 100], 0).unwrap();
    host.set_size(file, 40).unwrap();
    host.sync(file).unwrap();
    host.sync_data(file).unwrap();

    let stat = host.stat(file).unwrap();
    assert_eq!(stat.kind, DescriptorType::RegularFile);
    assert_eq!(stat.size, 40);
    assert_eq!(host.get_type(file).unwrap(), DescriptorType::RegularFile);

    let by_path = host.stat_at(root, PathFlags::default(), "f.bin").unwrap();
    assert_eq!(by_path.size, 40);
}

#[test]
fn test_rename_unlink_remove() {
    let sandbox = Sandbox::new();
    let host = &sandbox.host;
    let root = sandbox.root();
    let base = sandbox.dir.path();

    host.create_directory_at(root, "d").unwrap();
    std::fs::write(base.join("old.txt"), b"x").unwrap();

    host.rename_at(root, "old.txt", root, "d/new.txt").unwrap();
    assert!(!base.join("old.txt").exists());
    assert!(base.join("d/new.txt").exists());

    assert_eq!(
        host.create_directory_at(root, "d").unwrap_err(),
        HostError::Code(ErrorCode::Exists)
    );
    assert_eq!(
        host.unlink_file_at(root, "missing").unwrap_err(),
        HostError::Code(ErrorCode::NotFound)
    );

    host.unlink_file_at(root, "d/new.txt").unwrap();
    host.remove_directory_at(root, "d").unwrap();
    assert!(!base.join("d").exists());
}

#[cfg(unix)]
#[test]
fn test_links() {
    let sandbox = Sandbox::new();
    let host = &sandbox.host;
    let root = sandbox.root();
    std::fs::write(sandbox.dir.path().join("target.txt"), b"linked").unwrap();

    host.symlink_at(root, "target.txt", "soft").unwrap();
    assert_eq!(host.readlink_at(root, "soft").unwrap(), "target.txt");
    let soft = host.stat_at(root, PathFlags::NO_FOLLOW, "soft").unwrap();
    assert_eq!(soft.kind, DescriptorType::SymbolicLink);

    let through = host
        .open_at(root, PathFlags::FOLLOW, "soft", OpenFlags::default(), Rights::READ)
        .unwrap();
    assert_eq!(host.read(through, 16, 0).unwrap().0, b"linked");

    host.link_at(root, PathFlags::default(), "target.txt", root, "hard")
        .unwrap();
    assert_eq!(host.stat_at(root, PathFlags::default(), "hard").unwrap().link_count, 2);
}

#[test]
fn test_set_times() {
    let sandbox = Sandbox::new();
    let host = &sandbox.host;
    let root = sandbox.root();
    std::fs::write(sandbox.dir.path().join("t.txt"), b"t").unwrap();

    let stamp = ai_os_wasi::filesystem::Datetime {
        seconds: 1_000_000_000,
        nanoseconds: 0,
    };
    host.set_times_at(
        root,
        PathFlags::default(),
        "t.txt",
        NewTimestamp::NoChange,
        NewTimestamp::Timestamp(stamp),
    )
    .unwrap();
    let stat = host.stat_at(root, PathFlags::default(), "t.txt").unwrap();
    assert_eq!(stat.data_modification_timestamp.map(|t| t.seconds), Some(1_000_000_000));
}

#[test]
fn test_dropped_handle_is_fatal() {
    let sandbox = Sandbox::new();
    let host = &sandbox.host;
    let root = sandbox.root();

    let file = host
        .open_at(root, PathFlags::default(), "x", OpenFlags::create(), Rights::ALL)
        .unwrap();
    host.drop_handle(file).unwrap();

    let err = host.stat(file).unwrap_err();
    assert_eq!(err, HostError::Fatal(ProtocolViolation::UnknownHandle(file)));
    assert!(host.drop_handle(file).unwrap_err().is_fatal());
}

#[test]
fn test_wrong_kind_is_fatal() {
    let sandbox = Sandbox::new();
    let host = &sandbox.host;
    let root = sandbox.root();

    let err = host.stream_read(root, 1).unwrap_err();
    assert!(matches!(
        err,
        HostError::Fatal(ProtocolViolation::WrongResourceType { .. })
    ));
}

#[test]
fn test_get_directories_skips_dropped_preopens() {
    let sandbox = Sandbox::new();
    let root = sandbox.root();
    assert_eq!(sandbox.host.get_directories().len(), 1);
    sandbox.host.drop_handle(root).unwrap();
    assert!(sandbox.host.get_directories().is_empty());
}
