// Simulation client invocation
//
// A trial is one `battlesnake play` run against the backend. The client's
// stderr carries the log lines the metrics extractor reads.

use log::{debug, warn};
use std::future::Future;
use std::process::Stdio;
use tokio::process::Command;

use crate::config::ClientConfig;
use crate::error::{BenchError, Result};
use crate::types::BoardSize;

/// Runs one match on a board and hands back the client's raw diagnostic output
pub trait TrialRunner {
    fn run_trial(&self, board: BoardSize) -> impl Future<Output = Result<String>>;
}

/// Drives the real simulation client executable
#[derive(Debug, Clone)]
pub struct ClientRunner {
    config: ClientConfig,
    backend_url: String,
}

impl ClientRunner {
    pub fn new(config: ClientConfig, backend_url: &str) -> Self {
        ClientRunner {
            config,
            backend_url: backend_url.to_string(),
        }
    }

    /// Arguments passed to the client for a board
    pub fn args_for(&self, board: BoardSize) -> Vec<String> {
        vec![
            "play".to_string(),
            "-W".to_string(),
            board.width.to_string(),
            "-H".to_string(),
            board.height.to_string(),
            "--name".to_string(),
            self.config.name.clone(),
            "--url".to_string(),
            self.backend_url.clone(),
            "-g".to_string(),
            self.config.game_mode.clone(),
        ]
    }
}

impl TrialRunner for ClientRunner {
    async fn run_trial(&self, board: BoardSize) -> Result<String> {
        let mut command = Command::new(&self.config.executable);
        command
            .args(self.args_for(board))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let launch_error = |reason: String| BenchError::ClientLaunch {
            program: self.config.executable.clone(),
            reason,
        };

        let child = command.spawn().map_err(|e| launch_error(e.to_string()))?;

        // Dropping the wait future on timeout kills the client via kill_on_drop
        let output = match self.config.trial_timeout() {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| BenchError::TrialTimeout {
                    board_size: board.to_string(),
                    timeout_secs: self.config.trial_timeout_secs,
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| launch_error(e.to_string()))?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            warn!(
                "Simulation client exited with {} on {} ({} bytes of output)",
                output.status,
                board,
                stderr.len()
            );
        }
        debug!("Trial on {} produced {} bytes of output", board, stderr.len());

        Ok(stderr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_client_arguments() {
        let runner = ClientRunner::new(Config::default_hardcoded().client, "http://localhost:8000");
        assert_eq!(
            runner.args_for(BoardSize::new(15, 11)),
            vec![
                "play",
                "-W",
                "15",
                "-H",
                "11",
                "--name",
                "Battlesnake Exploration",
                "--url",
                "http://localhost:8000",
                "-g",
                "solo",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_client_is_launch_error() {
        let mut config = Config::default_hardcoded().client;
        config.executable = "/definitely/not/battlesnake".to_string();

        let runner = ClientRunner::new(config, "http://localhost:8000");
        let result = runner.run_trial(BoardSize::new(11, 11)).await;
        assert!(matches!(result, Err(BenchError::ClientLaunch { .. })));
    }
}
