use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn sortboard_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("sortboard");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/sorting.db"

[ingest]
api_key = "test-key-123"

[snapshots]
dir = "{root}/static/api"

[server]
bind = "127.0.0.1:8350"

[log]
path = "{root}/logs/sortboard.log"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("sortboard.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_sortboard(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = sortboard_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run sortboard binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn write_payload(tmp: &TempDir, name: &str, payload: &serde_json::Value) -> PathBuf {
    let path = tmp.path().join(name);
    fs::write(&path, serde_json::to_string_pretty(payload).unwrap()).unwrap();
    path
}

fn read_snapshot(tmp: &TempDir, name: &str) -> serde_json::Value {
    let path = tmp.path().join("static/api").join(name);
    let raw = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("missing snapshot {}: {}", path.display(), e));
    serde_json::from_str(&raw).unwrap()
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_sortboard(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/sorting.db").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_sortboard(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_sortboard(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_stats_end_to_end() {
    let (tmp, config_path) = setup_test_env();
    run_sortboard(&config_path, &["init"]);

    let payload = json!({
        "api_key": "test-key-123",
        "timestamp": "2024-01-01T00:00:00Z",
        "stats": [
            { "date": "2024-01-01", "can_count": 5, "recycling_count": 3, "garbage_count": 2 }
        ]
    });
    let payload_path = write_payload(&tmp, "batch.json", &payload);

    let (stdout, stderr, success) =
        run_sortboard(&config_path, &["ingest", payload_path.to_str().unwrap()]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("stats accepted:  1"));
    assert!(stdout.contains("snapshots: written"));
    assert!(stdout.contains("ok"));

    let totals = read_snapshot(&tmp, "totals.json");
    assert_eq!(totals["total_cans"], 5);
    assert_eq!(totals["total_recycling"], 3);
    assert_eq!(totals["total_garbage"], 2);
    assert_eq!(totals["grand_total"], 10);
}

#[test]
fn test_ingest_partial_batch_tolerance() {
    let (tmp, config_path) = setup_test_env();
    run_sortboard(&config_path, &["init"]);

    // Record 2 is missing confidence and must be skipped without taking
    // down the other two.
    let payload = json!({
        "api_key": "test-key-123",
        "timestamp": "2024-01-01T00:00:00Z",
        "events": [
            { "id": "e1", "timestamp": "2024-01-01T10:00:00", "item_type": "can",
              "confidence": 0.91, "sort_destination": "recycling" },
            { "id": "e2", "timestamp": "2024-01-01T10:01:00", "item_type": "garbage",
              "sort_destination": "landfill" },
            { "id": "e3", "timestamp": "2024-01-01T10:02:00", "item_type": "recycling",
              "confidence": 0.77, "sort_destination": "recycling" }
        ]
    });
    let payload_path = write_payload(&tmp, "batch.json", &payload);

    let (stdout, _, success) =
        run_sortboard(&config_path, &["ingest", payload_path.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.contains("events accepted: 2"));
    assert!(stdout.contains("events skipped:  1"));

    let events = read_snapshot(&tmp, "events.json");
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e["id"] != "e2"));
}

#[test]
fn test_ingest_rejects_bad_api_key() {
    let (tmp, config_path) = setup_test_env();
    run_sortboard(&config_path, &["init"]);

    let payload = json!({
        "api_key": "wrong-key",
        "timestamp": "2024-01-01T00:00:00Z",
        "stats": [ { "date": "2024-01-01", "can_count": 5 } ]
    });
    let payload_path = write_payload(&tmp, "batch.json", &payload);

    let (_, stderr, success) =
        run_sortboard(&config_path, &["ingest", payload_path.to_str().unwrap()]);
    assert!(!success, "ingest with a bad key must fail");
    assert!(stderr.contains("Invalid API key"));

    // Nothing was processed, so no snapshots were generated.
    assert!(!tmp.path().join("static/api/totals.json").exists());
}

#[test]
fn test_resubmitted_event_id_overwrites() {
    let (tmp, config_path) = setup_test_env();
    run_sortboard(&config_path, &["init"]);

    let first = json!({
        "api_key": "test-key-123",
        "timestamp": "2024-01-01T00:00:00Z",
        "events": [
            { "id": "dup", "timestamp": "2024-01-01T10:00:00", "item_type": "can",
              "confidence": 0.50, "sort_destination": "recycling" }
        ]
    });
    let second = json!({
        "api_key": "test-key-123",
        "timestamp": "2024-01-01T00:05:00Z",
        "events": [
            { "id": "dup", "timestamp": "2024-01-01T10:00:00", "item_type": "garbage",
              "confidence": 0.99, "sort_destination": "landfill" }
        ]
    });

    let first_path = write_payload(&tmp, "first.json", &first);
    let second_path = write_payload(&tmp, "second.json", &second);

    run_sortboard(&config_path, &["ingest", first_path.to_str().unwrap()]);
    run_sortboard(&config_path, &["ingest", second_path.to_str().unwrap()]);

    let events = read_snapshot(&tmp, "events.json");
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 1, "one row per id, never two");
    assert_eq!(events[0]["item_type"], "garbage");
    assert_eq!(events[0]["confidence"], 0.99);
}

#[test]
fn test_snapshot_ordering_and_time_formatting() {
    let (tmp, config_path) = setup_test_env();
    run_sortboard(&config_path, &["init"]);

    let payload = json!({
        "api_key": "test-key-123",
        "timestamp": "2024-01-03T00:00:00Z",
        "events": [
            { "id": "old", "timestamp": "2024-01-01T08:00:00", "item_type": "can",
              "confidence": 0.8, "sort_destination": "recycling" },
            { "id": "new", "timestamp": "2024-01-02T15:04:05", "item_type": "garbage",
              "confidence": 0.9, "sort_destination": "landfill" }
        ],
        "stats": [
            { "date": "2024-01-03", "can_count": 1 },
            { "date": "2024-01-01", "can_count": 2 },
            { "date": "2024-01-02", "can_count": 3 }
        ]
    });
    let payload_path = write_payload(&tmp, "batch.json", &payload);
    let (_, _, success) =
        run_sortboard(&config_path, &["ingest", payload_path.to_str().unwrap()]);
    assert!(success);

    let daily = read_snapshot(&tmp, "daily.json");
    let dates: Vec<&str> = daily
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["date"].as_str().unwrap())
        .collect();
    assert_eq!(dates, vec!["2024-01-01", "2024-01-02", "2024-01-03"]);

    let events = read_snapshot(&tmp, "events.json");
    let events = events.as_array().unwrap();
    assert_eq!(events[0]["id"], "new");
    assert_eq!(events[1]["id"], "old");
    assert_eq!(events[0]["formatted_time"], "Jan 2, 2024, 3:04 PM");
}

#[test]
fn test_unparsable_timestamp_survives_snapshot() {
    let (tmp, config_path) = setup_test_env();
    run_sortboard(&config_path, &["init"]);

    let payload = json!({
        "api_key": "test-key-123",
        "timestamp": "2024-01-01T00:00:00Z",
        "events": [
            { "id": "bad-clock", "timestamp": "not-a-timestamp", "item_type": "can",
              "confidence": 0.5, "sort_destination": "recycling" }
        ]
    });
    let payload_path = write_payload(&tmp, "batch.json", &payload);
    run_sortboard(&config_path, &["ingest", payload_path.to_str().unwrap()]);

    let events = read_snapshot(&tmp, "events.json");
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["formatted_time"], "not-a-timestamp");
}

#[test]
fn test_export_csv() {
    let (tmp, config_path) = setup_test_env();
    run_sortboard(&config_path, &["init"]);

    let payload = json!({
        "api_key": "test-key-123",
        "timestamp": "2024-01-01T00:00:00Z",
        "stats": [
            { "date": "2024-01-01", "can_count": 5, "recycling_count": 3, "garbage_count": 2 }
        ]
    });
    let payload_path = write_payload(&tmp, "batch.json", &payload);
    run_sortboard(&config_path, &["ingest", payload_path.to_str().unwrap()]);

    let csv_path = tmp.path().join("stats.csv");
    let (_, _, success) = run_sortboard(
        &config_path,
        &["export", "--output", csv_path.to_str().unwrap()],
    );
    assert!(success);

    let csv = fs::read_to_string(&csv_path).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next().unwrap(),
        "date,can_count,recycling_count,garbage_count,total_count,metadata"
    );
    assert_eq!(lines.next().unwrap(), "2024-01-01,5,3,2,10,");
}

#[test]
fn test_snapshot_command_regenerates_artifacts() {
    let (tmp, config_path) = setup_test_env();
    run_sortboard(&config_path, &["init"]);

    // No ingest yet: snapshots of empty storage are valid, all-zero.
    let (stdout, stderr, success) = run_sortboard(&config_path, &["snapshot"]);
    assert!(success, "snapshot failed: {} {}", stdout, stderr);

    let totals = read_snapshot(&tmp, "totals.json");
    assert_eq!(totals["grand_total"], 0);
    assert_eq!(read_snapshot(&tmp, "daily.json"), json!([]));
    assert_eq!(read_snapshot(&tmp, "events.json"), json!([]));
}
