// Metric extraction from simulation client output
//
// The client writes free-form log lines to stderr. Extraction is lossy by
// design of the input: anything missing or malformed yields `None` and the
// sweep keeps going.

use chrono::NaiveTime;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::TrialMetrics;

static GAME_COMPLETED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Game completed after (\d+) turns\.").unwrap());

static TURN_TIMESTAMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"INFO ([\d:.]+) Turn:").unwrap());

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Number of turns reported by the completion line, if present
pub fn extract_turn_count(text: &str) -> Option<u32> {
    GAME_COMPLETED
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}

/// Converts an optional turn count into the `-1`-for-unknown form used by
/// the raw results file
pub fn turn_count_sentinel(turns: Option<u32>) -> i64 {
    turns.map(i64::from).unwrap_or(-1)
}

/// Mean gap in seconds between consecutive `Turn:` log lines.
///
/// Returns `None` when fewer than two timestamps could be parsed.
pub fn extract_avg_turn_time(text: &str) -> Option<f64> {
    let timestamps: Vec<NaiveTime> = text
        .lines()
        .filter_map(|line| TURN_TIMESTAMP.captures(line))
        .filter_map(|caps| parse_time_of_day(&caps[1]))
        .collect();

    if timestamps.len() < 2 {
        return None;
    }

    let total: f64 = timestamps
        .windows(2)
        .map(|pair| seconds_between(pair[0], pair[1]))
        .sum();

    Some(total / (timestamps.len() - 1) as f64)
}

/// Runs both extractors over one trial's output
pub fn extract(text: &str) -> TrialMetrics {
    TrialMetrics {
        turns: extract_turn_count(text),
        avg_turn_time: extract_avg_turn_time(text),
    }
}

fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S%.f").ok()
}

// A game running across midnight shows up as a negative gap
fn seconds_between(earlier: NaiveTime, later: NaiveTime) -> f64 {
    let secs = (later - earlier).num_microseconds().unwrap_or(0) as f64 / 1_000_000.0;
    if secs < 0.0 {
        secs + SECONDS_PER_DAY
    } else {
        secs
    }
}
