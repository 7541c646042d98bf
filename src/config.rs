// Harness configuration read from Bench.toml
// Describes how to launch the backend and the client, what to sweep, and where results go

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::aggregator::UnknownTrialPolicy;
use crate::types::BoardSize;

/// Main configuration structure containing all tunable parameters
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub backend: BackendConfig,
    pub client: ClientConfig,
    pub sweep: SweepConfig,
    pub results: ResultsConfig,
    pub aggregation: AggregationConfig,
}

/// How the backend under test is launched and probed
#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub program: String,
    /// `{strategy}` is replaced by the strategy name; without a placeholder the
    /// strategy is appended as the last argument
    pub args: Vec<String>,
    pub url: String,
    pub warmup_ms: u64,
    /// 0 disables the readiness probe and relies on the warm-up alone
    pub readiness_timeout_ms: u64,
    pub readiness_poll_ms: u64,
    pub shutdown_grace_ms: u64,
}

impl BackendConfig {
    /// Command-line arguments for launching the backend with `strategy`
    pub fn args_for(&self, strategy: &str) -> Vec<String> {
        let has_placeholder = self.args.iter().any(|a| a.contains("{strategy}"));

        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|a| a.replace("{strategy}", strategy))
            .collect();

        if !has_placeholder {
            args.push(strategy.to_string());
        }

        args
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }

    pub fn readiness_timeout(&self) -> Option<Duration> {
        (self.readiness_timeout_ms > 0).then(|| Duration::from_millis(self.readiness_timeout_ms))
    }

    pub fn readiness_poll(&self) -> Duration {
        Duration::from_millis(self.readiness_poll_ms.max(1))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// How the simulation client is invoked for each trial
#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    pub executable: String,
    pub name: String,
    pub game_mode: String,
    /// 0 disables the per-trial timeout
    pub trial_timeout_secs: u64,
}

impl ClientConfig {
    pub fn trial_timeout(&self) -> Option<Duration> {
        (self.trial_timeout_secs > 0).then(|| Duration::from_secs(self.trial_timeout_secs))
    }
}

/// What gets measured
#[derive(Debug, Deserialize, Clone)]
pub struct SweepConfig {
    pub strategies: Vec<String>,
    pub board_sizes: Vec<BoardSize>,
    pub trials_per_case: u32,
}

/// Where artifacts are written
#[derive(Debug, Deserialize, Clone)]
pub struct ResultsConfig {
    pub directory: String,
}

/// Aggregation behavior
#[derive(Debug, Deserialize, Clone)]
pub struct AggregationConfig {
    pub unknown_trials: UnknownTrialPolicy,
}

impl Config {
    /// Loads configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the Bench.toml configuration file
    ///
    /// # Returns
    /// * `Result<Config, String>` - Parsed configuration or error message
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let contents = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file: {}", e))
    }

    /// Creates a configuration with hardcoded default values as fallback
    /// This should match the constants defined in Bench.toml
    pub fn default_hardcoded() -> Self {
        Config {
            backend: BackendConfig {
                program: "cargo".to_string(),
                args: vec!["run".to_string(), "--release".to_string()],
                url: "http://localhost:8000".to_string(),
                warmup_ms: 2000,
                readiness_timeout_ms: 120_000,  // First launch may still be compiling
                readiness_poll_ms: 250,
                shutdown_grace_ms: 5000,
            },
            client: ClientConfig {
                executable: "scripts/battlesnake".to_string(),
                name: "Battlesnake Exploration".to_string(),
                game_mode: "solo".to_string(),
                trial_timeout_secs: 300,
            },
            sweep: SweepConfig {
                strategies: vec!["random".to_string(), "simple".to_string()],
                board_sizes: vec![
                    BoardSize::new(10, 10),
                    BoardSize::new(15, 15),
                    BoardSize::new(20, 20),
                ],
                trials_per_case: 100,
            },
            results: ResultsConfig {
                directory: "logs".to_string(),
            },
            aggregation: AggregationConfig {
                unknown_trials: UnknownTrialPolicy::Exclude,
            },
        }
    }

    /// Loads `path`, falling back to hardcoded defaults with a warning on stderr
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        Self::from_file(path).unwrap_or_else(|e| {
            eprintln!("Warning: Could not load config from '{}': {}", path.display(), e);
            eprintln!("Using default configuration");
            Self::default_hardcoded()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_for_appends_strategy() {
        let config = Config::default_hardcoded();
        assert_eq!(
            config.backend.args_for("simple"),
            vec!["run", "--release", "simple"]
        );
    }

    #[test]
    fn test_args_for_replaces_placeholder() {
        let mut config = Config::default_hardcoded();
        config.backend.args = vec![
            "run".to_string(),
            "--".to_string(),
            "--strategy={strategy}".to_string(),
        ];
        assert_eq!(
            config.backend.args_for("random"),
            vec!["run", "--", "--strategy=random"]
        );
    }

    #[test]
    fn test_zero_timeouts_disable() {
        let mut config = Config::default_hardcoded();
        config.backend.readiness_timeout_ms = 0;
        config.client.trial_timeout_secs = 0;
        assert!(config.backend.readiness_timeout().is_none());
        assert!(config.client.trial_timeout().is_none());
    }

    #[test]
    fn test_bench_toml_can_be_parsed() {
        // This test ensures Bench.toml is valid and can be parsed
        let result = Config::from_file("Bench.toml");
        assert!(
            result.is_ok(),
            "Failed to parse Bench.toml: {:?}",
            result.err()
        );
    }

    #[test]
    fn test_all_config_values_match_hardcoded_defaults() {
        let file_config = Config::from_file("Bench.toml")
            .expect("Bench.toml should be parseable");
        let hardcoded_config = Config::default_hardcoded();

        // Backend
        assert_eq!(file_config.backend.program, hardcoded_config.backend.program);
        assert_eq!(file_config.backend.args, hardcoded_config.backend.args);
        assert_eq!(file_config.backend.url, hardcoded_config.backend.url);
        assert_eq!(file_config.backend.warmup_ms, hardcoded_config.backend.warmup_ms);
        assert_eq!(
            file_config.backend.readiness_timeout_ms,
            hardcoded_config.backend.readiness_timeout_ms
        );
        assert_eq!(
            file_config.backend.shutdown_grace_ms,
            hardcoded_config.backend.shutdown_grace_ms
        );

        // Client
        assert_eq!(file_config.client.executable, hardcoded_config.client.executable);
        assert_eq!(file_config.client.game_mode, hardcoded_config.client.game_mode);
        assert_eq!(
            file_config.client.trial_timeout_secs,
            hardcoded_config.client.trial_timeout_secs
        );

        // Sweep
        assert_eq!(file_config.sweep.strategies, hardcoded_config.sweep.strategies);
        assert_eq!(file_config.sweep.board_sizes, hardcoded_config.sweep.board_sizes);
        assert_eq!(
            file_config.sweep.trials_per_case,
            hardcoded_config.sweep.trials_per_case
        );

        // Results & aggregation
        assert_eq!(file_config.results.directory, hardcoded_config.results.directory);
        assert_eq!(
            file_config.aggregation.unknown_trials,
            hardcoded_config.aggregation.unknown_trials
        );
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let result = Config::from_file("nonexistent.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::load_or_default("nonexistent.toml");
        let defaults = Config::default_hardcoded();
        assert_eq!(config.backend.url, defaults.backend.url);
        assert_eq!(config.sweep.strategies, defaults.sweep.strategies);
        assert_eq!(config.sweep.trials_per_case, defaults.sweep.trials_per_case);
    }

    #[test]
    fn test_bad_board_size_is_a_parse_error() {
        let mut contents = std::fs::read_to_string("Bench.toml").unwrap();
        contents = contents.replace("\"10x10\"", "\"ten-by-ten\"");
        let result: Result<Config, _> = toml::from_str(&contents);
        assert!(result.is_err());
    }
}
