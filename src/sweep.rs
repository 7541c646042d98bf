// Benchmark sweep driver
//
// For every strategy: acquire a backend, run `trials_per_case` trials on each
// board size, release the backend. A failure aborts only the strategy it
// happened in, and the backend is released on every path out of the loop.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{error, info, warn};
use std::future::Future;

use crate::aggregator::{ResultAggregator, UnknownTrialPolicy};
use crate::config::SweepConfig;
use crate::error::{BenchError, Result};
use crate::metrics;
use crate::runner::TrialRunner;
use crate::supervisor::{BackendHandle, ProcessSupervisor};
use crate::types::{BoardSize, Snapshot, TrialResult};

/// Starts and stops whatever serves the strategy under test
pub trait Supervisor {
    type Handle;

    fn acquire(&self, strategy: &str) -> impl Future<Output = Result<Self::Handle>>;
    fn release(&self, handle: Self::Handle) -> impl Future<Output = Result<()>>;
}

impl Supervisor for ProcessSupervisor {
    type Handle = BackendHandle;

    async fn acquire(&self, strategy: &str) -> Result<BackendHandle> {
        ProcessSupervisor::acquire(self, strategy).await
    }

    async fn release(&self, handle: BackendHandle) -> Result<()> {
        ProcessSupervisor::release(self, handle).await
    }
}

/// Presentation knobs for a sweep
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepOptions {
    pub show_progress: bool,
    /// Print one line per finished trial
    pub echo_trials: bool,
}

/// A strategy whose sweep was aborted
#[derive(Debug)]
pub struct StrategyFailure {
    pub strategy: String,
    pub error: BenchError,
}

/// Everything a sweep produced, including partial data from failed strategies
#[derive(Debug)]
pub struct SweepOutcome {
    pub trials: Vec<TrialResult>,
    pub aggregator: ResultAggregator,
    pub failures: Vec<StrategyFailure>,
}

impl SweepOutcome {
    fn new(policy: UnknownTrialPolicy) -> Self {
        SweepOutcome {
            trials: Vec::new(),
            aggregator: ResultAggregator::new(policy),
            failures: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.aggregator.snapshot()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Bars {
    strategies: ProgressBar,
    boards: ProgressBar,
    games: ProgressBar,
}

/// Runs the strategy × board size × trial loop
pub struct BenchmarkSweep<S, R> {
    supervisor: S,
    runner: R,
    plan: SweepConfig,
    policy: UnknownTrialPolicy,
    options: SweepOptions,
}

impl<S: Supervisor, R: TrialRunner> BenchmarkSweep<S, R> {
    pub fn new(supervisor: S, runner: R, plan: SweepConfig, policy: UnknownTrialPolicy) -> Self {
        BenchmarkSweep {
            supervisor,
            runner,
            plan,
            policy,
            options: SweepOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SweepOptions) -> Self {
        self.options = options;
        self
    }

    /// Sweeps every configured strategy in order
    pub async fn run(&self) -> SweepOutcome {
        let mut outcome = SweepOutcome::new(self.policy);
        let bars = self.progress_bars();

        info!(
            "Sweeping {} strategies × {} board sizes × {} trials",
            self.plan.strategies.len(),
            self.plan.board_sizes.len(),
            self.plan.trials_per_case
        );

        for strategy in &self.plan.strategies {
            bars.strategies.set_message(strategy.clone());

            if let Err(error) = self.run_strategy(strategy, &bars, &mut outcome).await {
                error!("Aborting strategy '{}': {}", strategy, error);
                outcome.failures.push(StrategyFailure {
                    strategy: strategy.clone(),
                    error,
                });
            }

            bars.strategies.inc(1);
        }

        bars.games.finish_and_clear();
        bars.boards.finish_and_clear();
        bars.strategies.finish();

        if outcome.aggregator.skipped_trials() > 0 {
            warn!(
                "{} of {} trials had unknown turns or timing and were left out of the averages",
                outcome.aggregator.skipped_trials(),
                outcome.aggregator.total_trials()
            );
        }

        outcome
    }

    async fn run_strategy(&self, strategy: &str, bars: &Bars, outcome: &mut SweepOutcome) -> Result<()> {
        let handle = self.supervisor.acquire(strategy).await?;

        // No `?` between acquire and release
        let swept = self.sweep_boards(strategy, bars, outcome).await;
        let released = self.supervisor.release(handle).await;

        match (swept, released) {
            (Err(e), Err(stop)) => {
                warn!("{}", stop);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), released) => released,
        }
    }

    async fn sweep_boards(&self, strategy: &str, bars: &Bars, outcome: &mut SweepOutcome) -> Result<()> {
        bars.boards.reset();
        bars.boards.set_length(self.plan.board_sizes.len() as u64);

        for board in &self.plan.board_sizes {
            bars.boards.set_message(board.to_string());
            bars.games.reset();
            bars.games.set_length(self.plan.trials_per_case as u64);

            for trial_index in 1..=self.plan.trials_per_case {
                let trial = self.run_one(strategy, *board, trial_index).await?;

                if self.options.echo_trials {
                    bars.games.suspend(|| println!("{}", describe_trial(&trial)));
                }

                outcome.aggregator.record(&trial);
                outcome.trials.push(trial);
                bars.games.inc(1);
            }

            bars.boards.inc(1);
        }

        Ok(())
    }

    async fn run_one(&self, strategy: &str, board: BoardSize, trial_index: u32) -> Result<TrialResult> {
        let output = self.runner.run_trial(board).await?;
        let metrics = metrics::extract(&output);

        if metrics.turns.is_none() {
            warn!(
                "No completion line in output of trial {} ({} on {})",
                trial_index, strategy, board
            );
        }

        Ok(TrialResult::new(strategy, board, trial_index, metrics))
    }

    fn progress_bars(&self) -> Bars {
        let multi = MultiProgress::new();
        if !self.options.show_progress {
            multi.set_draw_target(ProgressDrawTarget::hidden());
        }

        let style = ProgressStyle::with_template("{prefix:>12} [{bar:30}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");

        let bar = |prefix: &'static str, len: u64| {
            let bar = multi.add(ProgressBar::new(len));
            bar.set_style(style.clone());
            bar.set_prefix(prefix);
            bar
        };

        Bars {
            strategies: bar("Strategies", self.plan.strategies.len() as u64),
            boards: bar("Board Sizes", self.plan.board_sizes.len() as u64),
            games: bar("Games", self.plan.trials_per_case as u64),
        }
    }
}

/// One console line for a finished trial
pub fn describe_trial(trial: &TrialResult) -> String {
    let turns = match trial.metrics.turns {
        Some(turns) => turns.to_string(),
        None => "unknown".to_string(),
    };
    let time = match trial.metrics.avg_turn_time {
        Some(secs) => format!("{:.2}ms", secs * 1000.0),
        None => "unknown".to_string(),
    };

    format!(
        "{} {} game {}: {} turns, avg turn time {}",
        trial.strategy, trial.board_size, trial.trial_index, turns, time
    )
}
