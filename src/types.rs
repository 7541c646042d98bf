// Benchmark data model
//
// Everything that flows between the sweep, the result store and the
// comparison tool lives here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::BenchError;

/// Board dimensions for one match, written as `WxH`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BoardSize {
    pub width: u32,
    pub height: u32,
}

impl BoardSize {
    pub fn new(width: u32, height: u32) -> Self {
        BoardSize { width, height }
    }
}

impl fmt::Display for BoardSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for BoardSize {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BenchError::InvalidBoardSize(s.to_string());

        let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let width: u32 = w.trim().parse().map_err(|_| invalid())?;
        let height: u32 = h.trim().parse().map_err(|_| invalid())?;

        if width == 0 || height == 0 {
            return Err(invalid());
        }

        Ok(BoardSize { width, height })
    }
}

impl Serialize for BoardSize {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BoardSize {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Metrics pulled out of one trial's client output.
/// `None` means the log did not carry enough information, not "measured zero".
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrialMetrics {
    pub turns: Option<u32>,
    pub avg_turn_time: Option<f64>,
}

impl TrialMetrics {
    /// True when both dimensions were measured
    pub fn is_complete(&self) -> bool {
        self.turns.is_some() && self.avg_turn_time.is_some()
    }
}

/// Outcome of a single completed trial. Built once, never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialResult {
    pub strategy: String,
    pub board_size: BoardSize,
    /// 1-based position of the trial within its test case
    pub trial_index: u32,
    pub metrics: TrialMetrics,
}

impl TrialResult {
    pub fn new(strategy: &str, board_size: BoardSize, trial_index: u32, metrics: TrialMetrics) -> Self {
        TrialResult {
            strategy: strategy.to_string(),
            board_size,
            trial_index,
            metrics,
        }
    }

    pub fn key(&self) -> AggregateKey {
        AggregateKey::new(&self.strategy, self.board_size)
    }

    /// Legacy on-disk form with `-1` / `0.0` sentinels for unknown values
    pub fn to_record(&self) -> RawTrialRecord {
        RawTrialRecord {
            strategy: self.strategy.clone(),
            board_size: self.board_size.to_string(),
            game_number: self.trial_index,
            turns: crate::metrics::turn_count_sentinel(self.metrics.turns),
            avg_turn_time: self.metrics.avg_turn_time.unwrap_or(0.0),
        }
    }
}

/// One entry of the `log_results_*.json` artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTrialRecord {
    pub strategy: String,
    pub board_size: String,
    pub game_number: u32,
    pub turns: i64,
    pub avg_turn_time: f64,
}

/// Identifies one test case: a strategy played on one board size
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregateKey {
    pub strategy: String,
    pub board_size: BoardSize,
}

impl AggregateKey {
    pub fn new(strategy: &str, board_size: BoardSize) -> Self {
        AggregateKey {
            strategy: strategy.to_string(),
            board_size,
        }
    }

    /// External name, e.g. `simple_11x11`
    pub fn test_case(&self) -> String {
        format!("{}_{}", self.strategy, self.board_size)
    }
}

impl fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.strategy, self.board_size)
    }
}

// Ordered by the external test-case name so every map keyed by AggregateKey
// iterates in the same order as the snapshot file.
impl Ord for AggregateKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.test_case().cmp(&other.test_case())
    }
}

impl PartialOrd for AggregateKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Averages for one test case
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregateMetric {
    pub average_turns: f64,
    pub average_turn_time: f64,
}

/// Contents of an `agg_results_*.json` file: test-case name to averages
pub type Snapshot = BTreeMap<String, AggregateMetric>;

/// Which snapshots a comparison row was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    BothPresent,
    OnlyBaseline,
    OnlyCandidate,
}

impl Presence {
    pub fn is_mismatch(&self) -> bool {
        !matches!(self, Presence::BothPresent)
    }
}

/// Delta between baseline and candidate for one test case
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub test_case: String,
    pub turns_delta: f64,
    pub turns_pct: f64,
    pub time_delta_ms: f64,
    pub time_pct: f64,
    pub presence: Presence,
}
