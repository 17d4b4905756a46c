//! PID file creation, deletion and duplicate detection tests.

use std::fs;

use amtlog_daemon::pid_file::{remove_pid_file, write_pid_file};
use tempfile::TempDir;

#[test]
fn test_write_pid_file_creates_parent_directory() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let pid_path = temp_dir.path().join("run").join("nested").join("amtlog.pid");

    write_pid_file(&pid_path).expect("write_pid_file should create parent directories");

    let content = fs::read_to_string(&pid_path).expect("should read PID file");
    assert_eq!(content, format!("{}\n", std::process::id()));
}

#[test]
fn test_write_pid_file_fails_if_already_exists() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let pid_path = temp_dir.path().join("amtlog.pid");
    fs::write(&pid_path, "12345\n").expect("should write initial PID file");

    let err = write_pid_file(&pid_path).expect_err("existing PID file should be rejected");

    let msg = err.to_string();
    assert!(msg.contains("already exists"), "got: {msg}");
    assert!(msg.contains("12345"), "got: {msg}");
    assert_eq!(fs::read_to_string(&pid_path).expect("read"), "12345\n");
}

#[cfg(unix)]
#[test]
fn test_write_pid_file_sets_restrictive_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().expect("should create temp dir");
    let pid_path = temp_dir.path().join("amtlog.pid");
    write_pid_file(&pid_path).expect("should write PID file");

    let mode = fs::metadata(&pid_path).expect("metadata").permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[cfg(unix)]
#[test]
fn test_write_pid_file_refuses_symlink() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let target = temp_dir.path().join("target");
    fs::write(&target, "data").expect("write target");
    let link = temp_dir.path().join("amtlog.pid");
    std::os::unix::fs::symlink(&target, &link).expect("create symlink");

    assert!(write_pid_file(&link).is_err());
    assert_eq!(fs::read_to_string(&target).expect("read"), "data");
}

#[test]
fn test_remove_pid_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let pid_path = temp_dir.path().join("amtlog.pid");
    write_pid_file(&pid_path).expect("should write PID file");

    remove_pid_file(&pid_path);
    assert!(!pid_path.exists());

    // Removing again only logs a warning.
    remove_pid_file(&pid_path);
}

#[test]
fn test_pid_file_can_be_rewritten_after_removal() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let pid_path = temp_dir.path().join("amtlog.pid");

    write_pid_file(&pid_path).expect("first write");
    remove_pid_file(&pid_path);
    write_pid_file(&pid_path).expect("second write after removal");
}
