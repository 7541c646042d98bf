// Result store for benchmark artifacts
//
// Two kinds of files live in the results directory:
// - log_results_<YYYYMMDD_HHMMSS>.json: every trial of a run
// - agg_results_<YYYYMMDD_HHMMSS>.json: the aggregated snapshot
//
// The timestamp format makes lexicographic order chronological. Files are
// never rewritten once created.

use chrono::{Duration, Local, NaiveDateTime};
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{BenchError, Result};
use crate::types::{RawTrialRecord, Snapshot, TrialResult};

pub const RAW_PREFIX: &str = "log_results_";
pub const SNAPSHOT_PREFIX: &str = "agg_results_";
const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

static SNAPSHOT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^agg_results_\d{8}_\d{6}\.json$").unwrap());

/// Paths written by `ResultStore::persist_run`
#[derive(Debug, Clone, PartialEq)]
pub struct RunArtifacts {
    pub raw: PathBuf,
    pub snapshot: PathBuf,
}

/// Reads and writes artifacts under one results directory
#[derive(Debug, Clone)]
pub struct ResultStore {
    directory: PathBuf,
}

impl ResultStore {
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        ResultStore {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Writes the raw trial list under a fresh timestamp
    pub fn persist_raw(&self, trials: &[TrialResult]) -> Result<PathBuf> {
        self.ensure_directory()?;
        let stamp = self.free_stamp(Local::now().naive_local(), &[RAW_PREFIX]);
        self.write_raw(&stamp, trials)
    }

    /// Writes an aggregated snapshot under a fresh timestamp
    pub fn persist_snapshot(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        self.ensure_directory()?;
        let stamp = self.free_stamp(Local::now().naive_local(), &[SNAPSHOT_PREFIX]);
        self.write_snapshot(&stamp, snapshot)
    }

    /// Writes both artifacts of one run under a shared timestamp
    pub fn persist_run(&self, trials: &[TrialResult], snapshot: &Snapshot) -> Result<RunArtifacts> {
        self.persist_run_at(Local::now().naive_local(), trials, snapshot)
    }

    pub(crate) fn persist_run_at(
        &self,
        now: NaiveDateTime,
        trials: &[TrialResult],
        snapshot: &Snapshot,
    ) -> Result<RunArtifacts> {
        self.ensure_directory()?;
        let stamp = self.free_stamp(now, &[RAW_PREFIX, SNAPSHOT_PREFIX]);

        let raw = self.write_raw(&stamp, trials)?;
        let snapshot = self.write_snapshot(&stamp, snapshot)?;

        Ok(RunArtifacts { raw, snapshot })
    }

    /// Reads a snapshot written by `persist_snapshot` (or by hand)
    pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<Snapshot> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;

        serde_json::from_str(&contents).map_err(|e| BenchError::SnapshotFormat {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Reads a raw results file back into its on-disk records
    pub fn load_raw<P: AsRef<Path>>(path: P) -> Result<Vec<RawTrialRecord>> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;

        serde_json::from_str(&contents).map_err(|e| BenchError::SnapshotFormat {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Locates the two most recent snapshots in `directory`.
    ///
    /// # Returns
    /// `(older, newer)`, i.e. baseline first and candidate second
    pub fn find_latest_two<P: AsRef<Path>>(directory: P) -> Result<(PathBuf, PathBuf)> {
        let directory = directory.as_ref();

        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            // A results directory that was never created holds no history
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BenchError::InsufficientHistory {
                    directory: directory.to_path_buf(),
                    found: 0,
                })
            }
            Err(e) => return Err(BenchError::io(directory, e)),
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| SNAPSHOT_NAME.is_match(name))
            .collect();

        names.sort_unstable_by(|a, b| b.cmp(a));

        match names.as_slice() {
            [newer, older, ..] => Ok((directory.join(older), directory.join(newer))),
            _ => Err(BenchError::InsufficientHistory {
                directory: directory.to_path_buf(),
                found: names.len(),
            }),
        }
    }

    fn ensure_directory(&self) -> Result<()> {
        fs::create_dir_all(&self.directory).map_err(|e| BenchError::io(&self.directory, e))
    }

    // First second at or after `now` for which none of the prefixed names exist
    fn free_stamp(&self, now: NaiveDateTime, prefixes: &[&str]) -> String {
        let mut at = now;
        loop {
            let stamp = at.format(STAMP_FORMAT).to_string();
            let taken = prefixes
                .iter()
                .any(|prefix| self.path_for(prefix, &stamp).exists());
            if !taken {
                return stamp;
            }
            at += Duration::seconds(1);
        }
    }

    fn path_for(&self, prefix: &str, stamp: &str) -> PathBuf {
        self.directory.join(format!("{}{}.json", prefix, stamp))
    }

    fn write_raw(&self, stamp: &str, trials: &[TrialResult]) -> Result<PathBuf> {
        let records: Vec<RawTrialRecord> = trials.iter().map(TrialResult::to_record).collect();
        let path = self.path_for(RAW_PREFIX, stamp);
        write_new_json(&path, &records, "raw results")?;
        info!("Wrote {} trial results to {}", records.len(), path.display());
        Ok(path)
    }

    fn write_snapshot(&self, stamp: &str, snapshot: &Snapshot) -> Result<PathBuf> {
        let path = self.path_for(SNAPSHOT_PREFIX, stamp);
        write_new_json(&path, snapshot, "snapshot")?;
        info!("Wrote snapshot with {} test cases to {}", snapshot.len(), path.display());
        Ok(path)
    }
}

fn write_new_json<T: Serialize + ?Sized>(path: &Path, value: &T, what: &'static str) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|source| BenchError::Serialize { what, source })?;

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| BenchError::io(path, e))?;

    file.write_all(json.as_bytes())
        .and_then(|_| file.write_all(b"\n"))
        .map_err(|e| BenchError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AggregateMetric, BoardSize, TrialMetrics};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn fixed_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 59)
            .unwrap()
    }

    fn sample_snapshot() -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.insert(
            "simple_11x11".to_string(),
            AggregateMetric {
                average_turns: 120.5,
                average_turn_time: 0.012,
            },
        );
        snapshot
    }

    #[test]
    fn test_persist_run_shares_one_timestamp() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::new(dir.path().join("logs"));

        let trials = vec![TrialResult::new(
            "simple",
            BoardSize::new(11, 11),
            1,
            TrialMetrics {
                turns: Some(120),
                avg_turn_time: Some(0.012),
            },
        )];

        let artifacts = store
            .persist_run_at(fixed_time(), &trials, &sample_snapshot())
            .unwrap();

        assert_eq!(
            artifacts.raw.file_name().unwrap(),
            "log_results_20240309_140559.json"
        );
        assert_eq!(
            artifacts.snapshot.file_name().unwrap(),
            "agg_results_20240309_140559.json"
        );
    }

    #[test]
    fn test_second_run_in_same_second_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::new(dir.path());

        let first = store.persist_run_at(fixed_time(), &[], &sample_snapshot()).unwrap();
        let second = store.persist_run_at(fixed_time(), &[], &Snapshot::new()).unwrap();

        assert_eq!(
            second.snapshot.file_name().unwrap(),
            "agg_results_20240309_140600.json"
        );
        assert!(second.snapshot > first.snapshot);

        // The first snapshot is untouched
        let reloaded = ResultStore::load_snapshot(&first.snapshot).unwrap();
        assert_eq!(reloaded, sample_snapshot());
    }

    #[test]
    fn test_persist_snapshot_names_and_never_collides() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::new(dir.path().join("logs"));

        let first = store.persist_snapshot(&sample_snapshot()).unwrap();
        let second = store.persist_snapshot(&Snapshot::new()).unwrap();

        for path in [&first, &second] {
            let name = path.file_name().unwrap().to_str().unwrap();
            assert!(SNAPSHOT_NAME.is_match(name), "unexpected name {}", name);
        }
        assert!(second > first);

        assert_eq!(ResultStore::load_snapshot(&first).unwrap(), sample_snapshot());
        assert!(ResultStore::load_snapshot(&second).unwrap().is_empty());
    }

    #[test]
    fn test_raw_file_uses_legacy_field_names() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::new(dir.path());

        let trials = vec![TrialResult::new("random", BoardSize::new(10, 10), 1, TrialMetrics::default())];
        let path = store.persist_raw(&trials).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value[0]["strategy"], "random");
        assert_eq!(value[0]["board_size"], "10x10");
        assert_eq!(value[0]["game_number"], 1);
        assert_eq!(value[0]["turns"], -1);
        assert_eq!(value[0]["avg_turn_time"], 0.0);

        let records = ResultStore::load_raw(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].turns, -1);
    }

    #[test]
    fn test_find_latest_two_in_missing_directory() {
        let dir = TempDir::new().unwrap();
        let result = ResultStore::find_latest_two(dir.path().join("nope"));
        assert!(matches!(
            result,
            Err(BenchError::InsufficientHistory { found: 0, .. })
        ));
    }

    #[test]
    fn test_malformed_snapshot_is_format_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agg_results_20240101_000000.json");
        fs::write(&path, "{\"simple_11x11\": {\"average_turns\": \"lots\"}}").unwrap();

        let result = ResultStore::load_snapshot(&path);
        assert!(matches!(result, Err(BenchError::SnapshotFormat { .. })));
    }

    #[test]
    fn test_missing_snapshot_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result = ResultStore::load_snapshot(dir.path().join("absent.json"));
        assert!(matches!(result, Err(BenchError::Io { .. })));
    }
}
