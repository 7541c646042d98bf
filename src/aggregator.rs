// Per-test-case aggregation of trial metrics
//
// One aggregator lives for one benchmark run. It is fed every TrialResult in
// order and turned into a snapshot at the end.

use log::debug;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::types::{AggregateKey, AggregateMetric, Snapshot, TrialResult};

/// What to do with trials whose turns or timing could not be extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownTrialPolicy {
    /// Leave incomplete trials out of the averages entirely
    Exclude,
    /// Average unknown turns as 0 and unknown timing as 0.0
    CountAsZero,
}

#[derive(Debug, Default, Clone, Copy)]
struct RunningTotals {
    total_turns: f64,
    total_time: f64,
    samples: u32,
}

/// Running sums keyed by (strategy, board size)
#[derive(Debug)]
pub struct ResultAggregator {
    policy: UnknownTrialPolicy,
    totals: BTreeMap<AggregateKey, RunningTotals>,
    recorded: usize,
    skipped: usize,
}

impl ResultAggregator {
    pub fn new(policy: UnknownTrialPolicy) -> Self {
        ResultAggregator {
            policy,
            totals: BTreeMap::new(),
            recorded: 0,
            skipped: 0,
        }
    }

    /// Adds one trial to the running sums of its test case
    pub fn record(&mut self, trial: &TrialResult) {
        self.recorded += 1;

        let metrics = &trial.metrics;
        if !metrics.is_complete() && self.policy == UnknownTrialPolicy::Exclude {
            debug!(
                "Excluding trial {} of {} from averages (turns: {:?}, avg turn time: {:?})",
                trial.trial_index,
                trial.key(),
                metrics.turns,
                metrics.avg_turn_time
            );
            self.skipped += 1;
            return;
        }

        let entry = self.totals.entry(trial.key()).or_default();
        entry.total_turns += metrics.turns.unwrap_or(0) as f64;
        entry.total_time += metrics.avg_turn_time.unwrap_or(0.0);
        entry.samples += 1;
    }

    /// Number of trials seen, including skipped ones
    pub fn total_trials(&self) -> usize {
        self.recorded
    }

    /// Number of trials left out under `UnknownTrialPolicy::Exclude`
    pub fn skipped_trials(&self) -> usize {
        self.skipped
    }

    /// Averages for every test case with at least one counted sample
    pub fn finalize(&self) -> BTreeMap<AggregateKey, AggregateMetric> {
        self.totals
            .iter()
            .filter(|(_, totals)| totals.samples > 0)
            .map(|(key, totals)| {
                let samples = totals.samples as f64;
                (
                    key.clone(),
                    AggregateMetric {
                        average_turns: totals.total_turns / samples,
                        average_turn_time: totals.total_time / samples,
                    },
                )
            })
            .collect()
    }

    /// `finalize` keyed by the external test-case name
    pub fn snapshot(&self) -> Snapshot {
        self.finalize()
            .into_iter()
            .map(|(key, metric)| (key.test_case(), metric))
            .collect()
    }
}
