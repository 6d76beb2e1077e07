//! Tests for the locks subsystem.

use super::*;
use crate::context::WaitContext;
use crate::error::FileError;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Create a temporary directory with one data file in it.
fn create_test_file() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("data.csv");
    std::fs::write(&path, "id,name\n1,alice\n").unwrap();
    (temp_dir, path)
}

/// Sorted names of every entry in `dir`.
fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[test]
fn test_lock_create_and_close() {
    let (temp_dir, path) = create_test_file();

    let mut lock = ControlFile::create(&path, ControlFileKind::Lock).unwrap();
    assert_eq!(lock.kind(), ControlFileKind::Lock);
    assert_eq!(lock.path(), temp_dir.path().join(".data.csv.lock"));
    assert!(lock.path().exists());

    lock.close().unwrap();
    assert!(!lock.path().exists());

    // Closing again is harmless
    lock.close().unwrap();
}

#[test]
fn test_lock_fails_when_lock_exists() {
    let (_temp_dir, path) = create_test_file();

    let _held = ControlFile::create(&path, ControlFileKind::Lock).unwrap();
    let err = ControlFile::create(&path, ControlFileKind::Lock).unwrap_err();

    assert!(matches!(err, FileError::Lock(..)));
}

#[test]
fn test_lock_fails_when_rlock_exists() {
    let (temp_dir, path) = create_test_file();

    let _reader = ControlFile::create(&path, ControlFileKind::RLock).unwrap();
    let err = ControlFile::create(&path, ControlFileKind::Lock).unwrap_err();

    assert!(matches!(err, FileError::Lock(..)));
    assert!(err.to_string().contains("read by another session"));
    assert!(!temp_dir.path().join(".data.csv.lock").exists());
}

#[test]
fn test_rlocks_coexist_with_distinct_names() {
    let (temp_dir, path) = create_test_file();

    let first = ControlFile::create(&path, ControlFileKind::RLock).unwrap();
    let second = ControlFile::create(&path, ControlFileKind::RLock).unwrap();

    assert_ne!(first.path(), second.path());
    assert!(first.path().exists());
    assert!(second.path().exists());

    // The transient lock used to serialize the check is gone
    assert!(!temp_dir.path().join(".data.csv.lock").exists());
}

#[test]
fn test_rlock_fails_when_lock_exists() {
    let (temp_dir, path) = create_test_file();

    let _writer = ControlFile::create(&path, ControlFileKind::Lock).unwrap();
    let err = ControlFile::create(&path, ControlFileKind::RLock).unwrap_err();

    assert!(matches!(err, FileError::Lock(..)));
    assert_eq!(entries(temp_dir.path()), vec![".data.csv.lock", "data.csv"]);
}

#[test]
fn test_sibling_file_reader_does_not_block_writer() {
    let (temp_dir, path) = create_test_file();
    let sibling = temp_dir.path().join("data.csv.bak");
    std::fs::write(&sibling, "backup").unwrap();

    let sibling_reader = ControlFile::create(&sibling, ControlFileKind::RLock).unwrap();
    let mut lock = ControlFile::create(&path, ControlFileKind::Lock).unwrap();

    assert!(list_control_files(&path, 120)
        .unwrap()
        .iter()
        .all(|info| info.kind == ControlFileKind::Lock));

    lock.close().unwrap();
    assert!(clear_control_files(&path, 120).unwrap().is_empty());
    assert!(sibling_reader.path().exists());
}

#[test]
fn test_temporary_is_created_unconditionally() {
    let (temp_dir, path) = create_test_file();
    std::fs::write(temp_dir.path().join(".data.csv.temp"), "leftover").unwrap();

    let _writer = ControlFile::create(&path, ControlFileKind::Lock).unwrap();
    let mut temp = ControlFile::create(&path, ControlFileKind::Temporary).unwrap();

    // Leftover staging content is truncated
    assert_eq!(std::fs::read(temp.path()).unwrap().len(), 0);
    assert!(temp.file_mut().is_some());

    temp.close().unwrap();
    assert!(!temp_dir.path().join(".data.csv.temp").exists());
}

#[test]
fn test_drop_releases_control_file() {
    let (temp_dir, path) = create_test_file();

    let lock = ControlFile::create(&path, ControlFileKind::Lock).unwrap();
    let lock_path = lock.path().to_path_buf();
    assert!(lock_path.exists());

    drop(lock);

    assert!(!lock_path.exists());
    assert_eq!(entries(temp_dir.path()), vec!["data.csv"]);
}

#[test]
fn test_close_with_errors_on_vanished_sentinel() {
    let (_temp_dir, path) = create_test_file();

    let mut rlock = ControlFile::create(&path, ControlFileKind::RLock).unwrap();
    std::fs::remove_file(rlock.path()).unwrap();

    rlock.close_with_errors().unwrap();
}

#[test]
fn test_close_handle_keeps_sentinel() {
    let (_temp_dir, path) = create_test_file();

    let mut temp = ControlFile::create(&path, ControlFileKind::Temporary).unwrap();
    temp.close_handle();

    assert!(temp.file().is_none());
    assert!(temp.path().exists());

    temp.close().unwrap();
    assert!(!temp.path().exists());
}

#[test]
fn test_close_does_not_touch_os_locks() {
    use fs2::FileExt;

    let (_temp_dir, path) = create_test_file();
    let mut lock = ControlFile::create(&path, ControlFileKind::Lock).unwrap();

    // Another handle holds an OS lock on the sentinel itself; releasing the
    // sentinel must neither need nor disturb it.
    let foreign = std::fs::File::open(lock.path()).unwrap();
    FileExt::lock_exclusive(&foreign).unwrap();

    lock.close().unwrap();
    assert!(!lock.path().exists());
    FileExt::unlock(&foreign).unwrap();
}

#[test]
fn test_kept_control_file_survives_close_and_drop() {
    let (temp_dir, path) = create_test_file();
    let temp_path = temp_dir.path().join(".data.csv.temp");

    {
        let mut temp = ControlFile::create(&path, ControlFileKind::Temporary).unwrap();
        temp.keep();
        assert!(temp.file().is_none());
        temp.close().unwrap();
        temp.close_with_errors().unwrap();
    }

    assert!(temp_path.exists());
}

#[test]
fn test_create_with_canceled_context_creates_nothing() {
    let (temp_dir, path) = create_test_file();
    let ctx = WaitContext::with_timeout(Duration::from_secs(10));
    ctx.cancel();

    for kind in [
        ControlFileKind::RLock,
        ControlFileKind::Lock,
        ControlFileKind::Temporary,
    ] {
        let err = ControlFile::create_with_context(&ctx, &path, kind, Duration::from_millis(1))
            .unwrap_err();
        assert!(matches!(err, FileError::Canceled));
    }

    assert_eq!(entries(temp_dir.path()), vec!["data.csv"]);
}

#[test]
fn test_create_with_context_times_out_on_held_lock() {
    let (temp_dir, path) = create_test_file();
    let lock_path = temp_dir.path().join(".data.csv.lock");
    std::fs::write(&lock_path, "").unwrap();

    let timeout = Duration::from_millis(100);
    let start = Instant::now();
    let ctx = WaitContext::with_timeout(timeout);

    let err = ControlFile::create_with_context(
        &ctx,
        &path,
        ControlFileKind::RLock,
        Duration::from_millis(10),
    )
    .unwrap_err();

    let elapsed = start.elapsed();
    assert!(matches!(err, FileError::Timeout(_)));
    assert!(elapsed >= timeout);
    assert!(elapsed < Duration::from_secs(5));

    // Only the foreign lock is left behind
    assert_eq!(entries(temp_dir.path()), vec![".data.csv.lock", "data.csv"]);
}

#[test]
fn test_create_with_context_waits_for_release() {
    let (_temp_dir, path) = create_test_file();
    let mut held = ControlFile::create(&path, ControlFileKind::Lock).unwrap();

    let releaser = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        held.close().unwrap();
    });

    let ctx = WaitContext::with_timeout(Duration::from_secs(5));
    let lock =
        ControlFile::create_with_context(&ctx, &path, ControlFileKind::Lock, Duration::from_millis(5))
            .unwrap();
    releaser.join().unwrap();

    assert!(lock.path().exists());
}

#[test]
fn test_list_control_files() {
    let (temp_dir, path) = create_test_file();
    std::fs::write(temp_dir.path().join("other.csv"), "").unwrap();
    std::fs::write(temp_dir.path().join(".other.csv.lock"), "").unwrap();

    let _reader = ControlFile::create(&path, ControlFileKind::RLock).unwrap();
    let _temp = ControlFile::create(&path, ControlFileKind::Temporary).unwrap();

    let found = list_control_files(&path, 120).unwrap();
    assert_eq!(found.len(), 2);

    let kinds: Vec<ControlFileKind> = found.iter().map(|i| i.kind).collect();
    assert!(kinds.contains(&ControlFileKind::RLock));
    assert!(kinds.contains(&ControlFileKind::Temporary));
    assert!(found.iter().all(|i| !i.is_stale));
    assert!(found.iter().all(|i| i.modified_at.is_some()));
}

#[test]
fn test_list_control_files_missing_directory() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nope").join("data.csv");

    assert!(list_control_files(&path, 120).unwrap().is_empty());
}

#[test]
fn test_clear_control_files() {
    let (temp_dir, path) = create_test_file();
    std::fs::write(temp_dir.path().join(".data.csv.lock"), "").unwrap();
    std::fs::write(temp_dir.path().join(".data.csv.AAAAAAAAAAAA.rlock"), "").unwrap();
    std::fs::write(temp_dir.path().join(".other.csv.lock"), "").unwrap();

    let cleared = clear_control_files(&path, 120).unwrap();
    assert_eq!(cleared.len(), 2);

    assert_eq!(
        entries(temp_dir.path()),
        vec![".other.csv.lock", "data.csv"]
    );
}

#[test]
fn test_control_file_info_display() {
    let info = ControlFileInfo {
        path: PathBuf::from("/data/.data.csv.lock"),
        kind: ControlFileKind::Lock,
        modified_at: Some(chrono::Utc::now()),
        is_stale: false,
    };

    let display = format!("{}", info);
    assert!(display.contains(".data.csv.lock"));
    assert!(display.contains("lock"));
    assert!(!display.contains("STALE"));

    let stale = ControlFileInfo {
        is_stale: true,
        modified_at: None,
        ..info
    };
    let display = format!("{}", stale);
    assert!(display.contains("STALE"));
    assert!(display.contains("unknown"));
}
