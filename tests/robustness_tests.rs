mod common;

use assert_cmd::prelude::*;
use common::smsrelay;
use predicates::prelude::*;

#[test]
fn test_malformed_csv_handling() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("requests.csv");
    let mut wtr = csv::Writer::from_path(&input).unwrap();
    wtr.write_record(["user", "phone", "content", "scheduled_at"])
        .unwrap();

    wtr.write_record(["alice", "13800000000", "first", ""]).unwrap();
    // Unparseable schedule
    wtr.write_record(["alice", "13800000000", "later", "tomorrow"])
        .unwrap();
    // Missing recipient
    wtr.write_record(["alice", "", "nobody", ""]).unwrap();
    // Missing user
    wtr.write_record(["", "13800000000", "anonymous", ""]).unwrap();
    wtr.write_record(["bob", "13900000000", "second", ""]).unwrap();
    wtr.flush().unwrap();
    drop(wtr);

    let mut cmd = smsrelay();
    cmd.arg("send").arg(&input);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading request"))
        .stderr(predicate::str::contains("Error processing request: Validation error"))
        .stderr(predicate::str::contains("Error processing request: Unauthorized"))
        .stdout(predicate::str::contains(",alice,XT"))
        .stdout(predicate::str::contains(",bob,XT"))
        .stdout(predicate::str::contains("rejected").count(2));
}

#[test]
fn test_missing_input_file() {
    let mut cmd = smsrelay();
    cmd.arg("send").arg("tests/fixtures/does_not_exist.csv");

    cmd.assert().failure();
}

#[test]
fn test_invalid_order_id() {
    let mut cmd = smsrelay();
    cmd.arg("cancel").arg("alice").arg("not-a-uuid");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}
