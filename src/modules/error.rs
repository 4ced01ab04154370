use std::io;

use thiserror::Error;

/// Rejected region geometry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegionError {
    #[error("region `{label}` radius {radius} must be positive")]
    InvalidRadius { label: String, radius: f64 },
    #[error("region `{label}` extents {width}x{height} must be positive")]
    InvalidExtents {
        label: String,
        width: f64,
        height: f64,
    },
    #[error("region `{label}` has a non-finite coordinate")]
    NonFinite { label: String },
    #[error("{shape} `{label}` expects {expected} arguments, got {actual}")]
    Arity {
        shape: &'static str,
        label: String,
        expected: usize,
        actual: usize,
    },
}

/// Rejected command parameters. Raised at construction, never at dispatch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("move direction ({dx}, {dy}) must be non-zero with components in [-1, 1]")]
    InvalidDirection { dx: f64, dy: f64 },
    #[error("{command} speed {speed} must be finite and non-negative")]
    InvalidSpeed { command: &'static str, speed: f64 },
    #[error("follow range {range} must be finite and non-negative")]
    InvalidRange { range: f64 },
    #[error("continue duration {duration} must be finite and non-negative")]
    InvalidDuration { duration: f64 },
    #[error("move-random bounds must be finite")]
    InvalidBounds,
}

/// Errors raised while assembling a program from builder events.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProgramError {
    #[error("{command} expects {expected} arguments, got {actual}")]
    Arity {
        command: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("block end without an open block")]
    UnbalancedBlockEnd,
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Invalid run configuration, rejected before the loop starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("time step {0} must be finite and positive")]
    InvalidTimeStep(f64),
    #[error("total time {0} must be finite and positive")]
    InvalidTotalTime(f64),
    #[error("total_time / dt = {ratio} exceeds the limit of {max} ticks")]
    TooManyTicks { ratio: f64, max: u64 },
    #[error("spawn area {width}x{height} must be finite and non-negative")]
    InvalidSpawnArea { width: f64, height: f64 },
}

/// Anything that can go wrong while loading a scenario file.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse scenario {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Region(#[from] RegionError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
