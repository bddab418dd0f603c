/// Error types for configuration, pipeline sequencing and run logging
use crate::pipeline::Stage;
use thiserror::Error;

/// Configuration rejected at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be finite (got {value})")]
    NonFinite { field: &'static str, value: f64 },

    #[error("{field} = {value} is out of range (expected {expected})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("block_threshold ({block}) must be below sanitize_threshold ({sanitize})")]
    InvertedThresholds { block: f64, sanitize: f64 },

    #[error("decay_rate ({decay}) must be strictly greater than recovery_rate ({recovery})")]
    DecayNotFasterThanRecovery { decay: f64, recovery: f64 },

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Run log failures
#[derive(Debug, Error)]
pub enum LogError {
    #[error("run log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("run log serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("run log writer task is gone")]
    WriterClosed,
}

/// Fatal pipeline failures
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Stage sequencing violated (programming error)
    #[error("pipeline stage out of order: expected {expected}, attempted {attempted}")]
    OutOfOrder { expected: Stage, attempted: Stage },

    #[error(transparent)]
    Log(#[from] LogError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Batch experiment failures
#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("experiment run task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("experiment plan has no {0}")]
    EmptyPlan(&'static str),
}
