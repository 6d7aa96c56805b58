// SPDX-License-Identifier: Apache-2.0

use std::os::unix::fs::PermissionsExt;

use crate::{write_file, AtomicFile, ConfigFileWatcher, ErrorKind};

#[test]
fn test_atomic_file_reports_change() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("global_network_info.xml");
    let dest = dir.path().join("eucanetd_global_network_info.xml");
    std::fs::write(&source, "v1").unwrap();

    let file =
        AtomicFile::new(&format!("file://{}", source.display()), &dest);
    assert_eq!(file.source(), source.as_path());

    assert!(file.get().unwrap());
    assert!(!file.get().unwrap());
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "v1");
    assert_eq!(
        std::fs::metadata(&dest).unwrap().permissions().mode() & 0o777,
        0o644
    );

    std::fs::write(&source, "v2").unwrap();
    assert!(file.get().unwrap());
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "v2");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[test]
fn test_write_file_replaces_content_and_mode() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("eucanetd.pid");
    std::fs::write(&path, "a much longer previous content").unwrap();

    write_file(&path, b"4242\n", 0o644).unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "4242\n");
    assert_eq!(
        std::fs::metadata(&path).unwrap().permissions().mode() & 0o777,
        0o644
    );
    let names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("eucanetd.pid")]);
}

#[test]
fn test_write_file_missing_directory() {
    let dir = tempfile::tempdir().unwrap();

    let result = write_file(&dir.path().join("none/eucanetd.pid"), b"1", 0o644);

    assert_eq!(result.unwrap_err().kind(), std::io::ErrorKind::NotFound);
}

#[test]
fn test_atomic_file_missing_source_keeps_destination() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("global_network_info.xml");
    let dest = dir.path().join("eucanetd_global_network_info.xml");
    std::fs::write(&dest, "previous").unwrap();

    let file = AtomicFile::new(source.to_str().unwrap(), &dest);
    let result = file.get();

    assert_eq!(result.unwrap_err().kind(), ErrorKind::TransientInput);
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "previous");
}

#[test]
fn test_atomic_file_unwritable_destination() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("global_network_info.xml");
    std::fs::write(&source, "v1").unwrap();
    let dest = dir.path().join("no_such_dir/copy.xml");

    let file = AtomicFile::new(source.to_str().unwrap(), &dest);

    assert_eq!(file.get().unwrap_err().kind(), ErrorKind::TransientInput);
}

#[test]
fn test_config_watcher_rereads_on_mtime_change() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("eucalyptus.conf");
    std::fs::write(&path, "POLLING_FREQUENCY=\"2\"\n").unwrap();

    let mut watcher = ConfigFileWatcher::new(&path);
    let values = watcher.read_if_modified().unwrap().unwrap();
    assert_eq!(values.get("POLLING_FREQUENCY"), "2");
    assert!(watcher.read_if_modified().unwrap().is_none());

    std::fs::write(&path, "POLLING_FREQUENCY=\"4\"\n").unwrap();
    let file = std::fs::File::options().write(true).open(&path).unwrap();
    file.set_modified(
        std::time::SystemTime::now() + std::time::Duration::from_secs(10),
    )
    .unwrap();
    let values = watcher.read_if_modified().unwrap().unwrap();
    assert_eq!(values.get("POLLING_FREQUENCY"), "4");
}

#[test]
fn test_config_watcher_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut watcher = ConfigFileWatcher::new(&dir.path().join("none.conf"));

    assert!(watcher.read_if_modified().unwrap().is_none());
    assert_eq!(watcher.read().unwrap_err().kind(), ErrorKind::TransientInput);
}
