/*!
 * Sandbox Tests
 * Path escapes, rights, and preopen boundaries
 */

use crate::common::Sandbox;
use ai_os_wasi::filesystem::{OpenFlags, PathFlags, Rights};
use ai_os_wasi::{ErrorCode, HostError};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn denied<T: std::fmt::Debug>(result: Result<T, HostError>) -> bool {
    matches!(result, Err(HostError::Code(ErrorCode::AccessDenied)))
}

#[test]
fn test_scenario_create_write_reopen_read() {
    let sandbox = Sandbox::new();
    let host = &sandbox.host;
    let root = sandbox.root();

    host.create_directory_at(root, "a").unwrap();
    let file = host
        .open_at(root, PathFlags::default(), "a/b.txt", OpenFlags::create(), Rights::ALL)
        .unwrap();
    assert_eq!(host.write(file, b"hi", 0).unwrap(), 2);
    host.drop_handle(file).unwrap();

    let file = host
        .open_at(root, PathFlags::default(), "a/b.txt", OpenFlags::default(), Rights::READ)
        .unwrap();
    let (bytes, ended) = host.read(file, 64, 0).unwrap();
    assert_eq!(bytes, b"hi");
    assert!(ended);
    assert_eq!(std::fs::read(sandbox.dir.path().join("a/b.txt")).unwrap(), b"hi");
}

#[test]
fn test_escape_makes_no_native_calls() {
    let sandbox = Sandbox::new();
    let root = sandbox.root();
    sandbox.fs.reset();

    for path in ["../escape", "a/../../escape", "/etc/passwd", "./.."] {
        let result = sandbox.host.open_at(
            root,
            PathFlags::default(),
            path,
            OpenFlags::create(),
            Rights::ALL,
        );
        assert!(denied(result), "{path} was not denied");
    }
    assert_eq!(sandbox.fs.calls(), 0);
}

#[test]
fn test_symlink_escape_refused() {
    let sandbox = Sandbox::new();
    let root = sandbox.root();

    // Guest-created links may not point outside
    assert!(denied(sandbox.host.symlink_at(root, "../outside", "link")));
    assert!(denied(sandbox.host.symlink_at(root, "/etc", "link")));

    // A host-planted absolute link is refused on traversal
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink("/etc", sandbox.dir.path().join("planted")).unwrap();
        let result = sandbox.host.open_at(
            root,
            PathFlags::default(),
            "planted/passwd",
            OpenFlags::default(),
            Rights::READ,
        );
        assert!(denied(result));
    }
}

#[test]
fn test_rights_cannot_escalate() {
    let sandbox = Sandbox::new();
    let host = &sandbox.host;
    let root = sandbox.root();
    host.create_directory_at(root, "ro").unwrap();

    let ro = host
        .open_at(root, PathFlags::default(), "ro", OpenFlags::directory(), Rights::READ_ONLY)
        .unwrap();
    assert_eq!(host.get_flags(ro).unwrap(), Rights::READ_ONLY);

    let escalate = host.open_at(ro, PathFlags::default(), "f", OpenFlags::create(), Rights::ALL);
    assert!(denied(escalate));
    let create = host.open_at(
        ro,
        PathFlags::default(),
        "f",
        OpenFlags::create(),
        Rights::READ_ONLY,
    );
    assert!(denied(create));
}

#[test]
fn test_read_only_preopen() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("data.txt"), b"content").unwrap();
    let sandbox = Sandbox::with_config(|b| b.preopen_read_only("/ro", dir.path()));
    let host = &sandbox.host;
    let ro = host
        .get_directories()
        .into_iter()
        .find(|(_, path)| path == "/ro")
        .map(|(handle, _)| handle)
        .unwrap();

    let file = host
        .open_at(ro, PathFlags::default(), "data.txt", OpenFlags::default(), Rights::READ)
        .unwrap();
    assert_eq!(host.read(file, 7, 0).unwrap().0, b"content");
    assert!(denied(host.write(file, b"x", 0)));
    assert!(denied(host.create_directory_at(ro, "new")));
    assert!(denied(host.unlink_file_at(ro, "data.txt")));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_escaping_paths_touch_nothing(
        prefix in prop::collection::vec("[a-z]{1,4}", 0..4),
        extra in 1usize..4,
        tail in prop::collection::vec("[a-z]{1,4}", 0..3),
    ) {
        let sandbox = Sandbox::new();
        let root = sandbox.root();
        sandbox.fs.reset();

        // Climb one or more levels above wherever the prefix ends up
        let mut parts: Vec<String> = prefix.clone();
        parts.extend(std::iter::repeat("..".to_string()).take(prefix.len() + extra));
        parts.extend(tail);
        let path = parts.join("/");

        let result = sandbox.host.open_at(
            root,
            PathFlags::default(),
            &path,
            OpenFlags::default(),
            Rights::READ,
        );
        prop_assert!(denied(result));
        prop_assert_eq!(sandbox.fs.calls(), 0);
    }
}
