// Benchmark sweep driver
//
// Usage:
//   cargo run --release --bin snake-bench -- [options]
//
// Runs every configured strategy against every board size, then writes
// logs/log_results_<stamp>.json and logs/agg_results_<stamp>.json.

use clap::Parser;
use log::{info, warn};
use std::env;
use std::process;

use snake_bench::config::Config;
use snake_bench::runner::ClientRunner;
use snake_bench::store::ResultStore;
use snake_bench::supervisor::ProcessSupervisor;
use snake_bench::sweep::{BenchmarkSweep, SweepOptions};
use snake_bench::types::BoardSize;

#[derive(Debug, Parser)]
#[command(name = "snake-bench", about = "Battlesnake benchmark sweep", version)]
struct Cli {
    /// Path to Bench.toml (hardcoded defaults are used when it cannot be read)
    #[arg(long, default_value = "Bench.toml")]
    config: String,

    /// Strategy to benchmark; repeat to sweep several (overrides the config)
    #[arg(long = "strategy", value_name = "NAME")]
    strategies: Vec<String>,

    /// Board size as WxH; repeat to sweep several (overrides the config)
    #[arg(long = "board", value_name = "WxH")]
    boards: Vec<BoardSize>,

    /// Trials per strategy and board size
    #[arg(long)]
    trials: Option<u32>,

    /// Directory for result files
    #[arg(long)]
    results_dir: Option<String>,

    /// Single test case: print every game, skip aggregation and result files
    #[arg(long)]
    single: bool,

    /// Hide progress bars
    #[arg(long)]
    quiet: bool,
}

fn load_config(cli: &Cli) -> Config {
    let mut config = Config::load_or_default(&cli.config);

    if !cli.strategies.is_empty() {
        config.sweep.strategies = cli.strategies.clone();
    }
    if !cli.boards.is_empty() {
        config.sweep.board_sizes = cli.boards.clone();
    }
    if let Some(trials) = cli.trials {
        config.sweep.trials_per_case = trials;
    }
    if let Some(dir) = &cli.results_dir {
        config.results.directory = dir.clone();
    }

    config
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // We default to 'info' level logging. But if the `RUST_LOG` environment variable is set,
    // we keep that value instead.
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }

    env_logger::init();

    let cli = Cli::parse();
    let config = load_config(&cli);

    if cli.single && (config.sweep.strategies.len() != 1 || config.sweep.board_sizes.len() != 1) {
        eprintln!("Error: --single needs exactly one strategy and one board size");
        eprintln!("Example: snake-bench --single --strategy simple --board 11x11");
        process::exit(2);
    }

    if config.sweep.trials_per_case == 0 {
        eprintln!("Error: trials per case must be at least 1");
        process::exit(2);
    }

    let supervisor = ProcessSupervisor::new(config.backend.clone());
    let runner = ClientRunner::new(config.client.clone(), &config.backend.url);

    let sweep = BenchmarkSweep::new(
        supervisor,
        runner,
        config.sweep.clone(),
        config.aggregation.unknown_trials,
    )
    .with_options(SweepOptions {
        show_progress: !cli.quiet,
        echo_trials: cli.single,
    });

    let outcome = sweep.run().await;

    for failure in &outcome.failures {
        eprintln!("✗ Strategy '{}' failed: {}", failure.strategy, failure.error);
    }

    if cli.single {
        for (test_case, metric) in &outcome.snapshot() {
            println!(
                "{}: average turns {:.2}, average turn time {:.2}ms",
                test_case,
                metric.average_turns,
                metric.average_turn_time * 1000.0
            );
        }
    } else if outcome.trials.is_empty() {
        warn!("No trials completed, nothing to persist");
    } else {
        let store = ResultStore::new(&config.results.directory);
        match store.persist_run(&outcome.trials, &outcome.snapshot()) {
            Ok(artifacts) => {
                info!("Raw results: {}", artifacts.raw.display());
                info!("Snapshot:    {}", artifacts.snapshot.display());
            }
            Err(e) => {
                eprintln!("Error writing results: {}", e);
                process::exit(1);
            }
        }
    }

    if !outcome.is_success() {
        process::exit(1);
    }
}
