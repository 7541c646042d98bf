// Integration tests for snapshot discovery and loading
//
// Covers:
// - Picking the two newest snapshots out of a results directory
// - Ignoring raw results and oddly named files
// - Failing cleanly when history is too short or a snapshot is malformed

use snake_bench::store::ResultStore;
use snake_bench::types::{AggregateMetric, BoardSize, Snapshot, TrialMetrics, TrialResult};
use snake_bench::BenchError;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Helper function to get the path to test fixtures
fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn test_find_latest_two_picks_newest_pair() {
    let (older, newer) = ResultStore::find_latest_two(fixture_path("history"))
        .expect("history fixture has three snapshots");

    assert_eq!(
        older.file_name().unwrap(),
        "agg_results_20240101_000000.json",
        "January 1 should be the baseline"
    );
    assert_eq!(
        newer.file_name().unwrap(),
        "agg_results_20240102_000000.json",
        "January 2 should be the candidate"
    );
}

#[test]
fn test_find_latest_two_needs_two_snapshots() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("agg_results_20240101_000000.json"), "{}").unwrap();
    fs::write(dir.path().join("log_results_20240102_000000.json"), "[]").unwrap();
    fs::write(dir.path().join("agg_results_20240102.json"), "{}").unwrap();

    match ResultStore::find_latest_two(dir.path()) {
        Err(BenchError::InsufficientHistory { found, .. }) => assert_eq!(found, 1),
        other => panic!("expected InsufficientHistory, got {:?}", other),
    }
}

#[test]
fn test_load_fixture_snapshot() {
    let snapshot = ResultStore::load_snapshot(fixture_path("history/agg_results_20240101_000000.json"))
        .expect("fixture should parse");

    assert_eq!(snapshot.len(), 3);
    assert_eq!(
        snapshot["simple_15x15"],
        AggregateMetric {
            average_turns: 300.0,
            average_turn_time: 0.025,
        }
    );
}

#[test]
fn test_load_malformed_snapshot() {
    let result = ResultStore::load_snapshot(fixture_path("malformed/agg_results_20240102_000000.json"));
    match result {
        Err(e @ BenchError::SnapshotFormat { .. }) => {
            assert!(e.to_string().contains("Malformed snapshot"));
        }
        other => panic!("expected SnapshotFormat, got {:?}", other),
    }
}

#[test]
fn test_load_raw_fixture_keeps_sentinels() {
    let records = ResultStore::load_raw(fixture_path("history/log_results_20240102_000000.json"))
        .expect("raw fixture should parse");

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].turns, 18);
    assert_eq!(records[1].turns, -1);
    assert_eq!(records[1].avg_turn_time, 0.0);
}

#[test]
fn test_persisted_runs_are_discovered_in_order() {
    let dir = TempDir::new().unwrap();
    let store = ResultStore::new(dir.path().join("logs"));

    let trial = TrialResult::new(
        "simple",
        BoardSize::new(11, 11),
        1,
        TrialMetrics {
            turns: Some(100),
            avg_turn_time: Some(0.01),
        },
    );

    let mut first = Snapshot::new();
    first.insert(
        "simple_11x11".to_string(),
        AggregateMetric {
            average_turns: 100.0,
            average_turn_time: 0.01,
        },
    );
    let first_run = store.persist_run(&[trial.clone()], &first).unwrap();

    let mut second = first.clone();
    second.get_mut("simple_11x11").unwrap().average_turns = 90.0;
    let second_run = store.persist_run(&[trial], &second).unwrap();

    let (older, newer) = ResultStore::find_latest_two(store.directory()).unwrap();
    assert_eq!(older, first_run.snapshot);
    assert_eq!(newer, second_run.snapshot);
    assert_eq!(ResultStore::load_snapshot(&newer).unwrap(), second);
}
