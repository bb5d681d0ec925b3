use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[cfg(not(feature = "storage-rocksdb"))]
#[test]
fn test_db_path_requires_storage_feature() {
    let mut cmd = Command::new(cargo_bin!("unpay-collect"));
    cmd.arg("pending")
        .args(["--account", "ACNT01"])
        .arg("--db-path")
        .arg("some_db");

    // No silent in-memory fallback: pending records must outlive the run.
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("storage-rocksdb"));
}

#[cfg(feature = "storage-rocksdb")]
#[test]
fn test_db_path_opens_a_store() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("pending_db");

    let mut cmd = Command::new(cargo_bin!("unpay-collect"));
    cmd.arg("pending")
        .args(["--account", "ACNT01"])
        .arg("--db-path")
        .arg(&db_path);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("0 pending attempt(s), total ₩0"));
}
