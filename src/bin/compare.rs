// Standalone comparison tool for benchmark snapshots
//
// Usage:
//   cargo run --bin compare -- [BASELINE] [CANDIDATE] [options]
//
// Without file arguments the two newest agg_results_*.json files in the
// results directory are compared, older one as baseline. A lone BASELINE is
// rejected.

use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;

use snake_bench::compare::{compare, summarize};
use snake_bench::report::{render, render_summary, RenderOptions};
use snake_bench::store::ResultStore;
use snake_bench::Result;

#[derive(Debug, Parser)]
#[command(name = "compare", about = "Compare two benchmark snapshot files", version)]
struct Cli {
    /// Baseline snapshot (older run); needs CANDIDATE as well
    #[arg(requires = "candidate")]
    baseline: Option<PathBuf>,

    /// Candidate snapshot (newer run)
    candidate: Option<PathBuf>,

    /// Include test cases that appear in only one of the snapshots
    #[arg(long)]
    include_mismatches: bool,

    /// Where to look for snapshots when no files are given
    #[arg(long, default_value = "logs")]
    results_dir: PathBuf,

    /// Plain output without colors
    #[arg(long)]
    no_color: bool,
}

fn run(cli: &Cli) -> Result<()> {
    let (baseline_path, candidate_path) = match (&cli.baseline, &cli.candidate) {
        (Some(baseline), Some(candidate)) => (baseline.clone(), candidate.clone()),
        _ => ResultStore::find_latest_two(&cli.results_dir)?,
    };

    let baseline = ResultStore::load_snapshot(&baseline_path)?;
    let candidate = ResultStore::load_snapshot(&candidate_path)?;

    let rows = compare(&baseline, &candidate, cli.include_mismatches);
    let options = RenderOptions {
        color: !cli.no_color && std::io::stdout().is_terminal(),
    };

    println!("Baseline:  {}", baseline_path.display());
    println!("Candidate: {}", candidate_path.display());
    println!();
    println!("{}", render(&rows, options));
    println!();
    println!("{}", render_summary(&summarize(&rows)));

    Ok(())
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
