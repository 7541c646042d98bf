//! Error types for the benchmark harness

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BenchError {
    /// The backend process could not be spawned or died while starting up
    #[error("Failed to start backend for strategy '{strategy}': {reason}")]
    BackendStart { strategy: String, reason: String },

    /// The backend was spawned but never accepted connections
    #[error("Backend for strategy '{strategy}' not reachable at {url} after {waited_ms}ms")]
    BackendNotReady {
        strategy: String,
        url: String,
        waited_ms: u64,
    },

    /// The backend could not be terminated and reaped
    #[error("Failed to stop backend for strategy '{strategy}': {reason}")]
    BackendStop { strategy: String, reason: String },

    /// The simulation client could not be executed at all
    #[error("Failed to launch simulation client '{program}': {reason}")]
    ClientLaunch { program: String, reason: String },

    /// A trial ran longer than the configured bound and was killed
    #[error("Trial on {board_size} timed out after {timeout_secs}s")]
    TrialTimeout { board_size: String, timeout_secs: u64 },

    #[error("Not enough benchmark files found in {}: found {found}, need at least 2", directory.display())]
    InsufficientHistory { directory: PathBuf, found: usize },

    /// A snapshot file exists but does not hold a test-case → metrics object
    #[error("Malformed snapshot {}: {reason}", path.display())]
    SnapshotFormat { path: PathBuf, reason: String },

    #[error("Invalid board size '{0}', expected WxH")]
    InvalidBoardSize(String),

    #[error("Failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BenchError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BenchError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, BenchError>;
