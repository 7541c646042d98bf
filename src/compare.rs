// Snapshot comparison
//
// Turns two snapshots into one row per test case. Lower is better for both
// turns and turn time, so a negative delta is an improvement.

use std::collections::BTreeSet;

use crate::types::{AggregateMetric, ComparisonRow, Presence, Snapshot};

/// Improvement / regression counts over rows present in both snapshots
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ComparisonSummary {
    pub compared: usize,
    pub mismatched: usize,
    pub turns_improved: usize,
    pub turns_regressed: usize,
    pub time_improved: usize,
    pub time_regressed: usize,
}

/// Computes per-test-case deltas, sorted by test-case name.
///
/// One-sided test cases are compared against a zero placeholder and are only
/// returned when `include_mismatches` is set.
pub fn compare(baseline: &Snapshot, candidate: &Snapshot, include_mismatches: bool) -> Vec<ComparisonRow> {
    let test_cases: BTreeSet<&String> = baseline.keys().chain(candidate.keys()).collect();

    test_cases
        .into_iter()
        .filter_map(|test_case| {
            let presence = match (baseline.get(test_case), candidate.get(test_case)) {
                (Some(_), Some(_)) => Presence::BothPresent,
                (Some(_), None) => Presence::OnlyBaseline,
                (None, _) => Presence::OnlyCandidate,
            };

            if presence.is_mismatch() && !include_mismatches {
                return None;
            }

            let base = baseline.get(test_case).copied().unwrap_or_default();
            let cand = candidate.get(test_case).copied().unwrap_or_default();

            Some(compare_metrics(test_case, &base, &cand, presence))
        })
        .collect()
}

fn compare_metrics(
    test_case: &str,
    base: &AggregateMetric,
    cand: &AggregateMetric,
    presence: Presence,
) -> ComparisonRow {
    let turns_delta = cand.average_turns - base.average_turns;
    let time_delta = cand.average_turn_time - base.average_turn_time;

    ComparisonRow {
        test_case: test_case.to_string(),
        turns_delta,
        turns_pct: percent_change(turns_delta, base.average_turns),
        time_delta_ms: time_delta * 1000.0,
        time_pct: percent_change(time_delta, base.average_turn_time),
        presence,
    }
}

/// `delta / base * 100`, or 0 when there is no baseline to divide by
pub fn percent_change(delta: f64, base: f64) -> f64 {
    if base == 0.0 {
        0.0
    } else {
        delta / base * 100.0
    }
}

/// Tallies improvements and regressions; one-sided rows only count as mismatched
pub fn summarize(rows: &[ComparisonRow]) -> ComparisonSummary {
    let mut summary = ComparisonSummary::default();

    for row in rows {
        if row.presence.is_mismatch() {
            summary.mismatched += 1;
            continue;
        }

        summary.compared += 1;

        if row.turns_delta < 0.0 {
            summary.turns_improved += 1;
        } else if row.turns_delta > 0.0 {
            summary.turns_regressed += 1;
        }

        if row.time_delta_ms < 0.0 {
            summary.time_improved += 1;
        } else if row.time_delta_ms > 0.0 {
            summary.time_regressed += 1;
        }
    }

    summary
}
