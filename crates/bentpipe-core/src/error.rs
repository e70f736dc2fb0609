//! Error types for the bentpipe simulator

use thiserror::Error;

/// Core error type for simulator operations
#[derive(Error, Debug)]
pub enum BentPipeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown scheduling policy: {0}")]
    UnknownPolicy(String),

    #[error("Unknown spacing strategy: {0}. Valid options: bent-pipe, close-spaced, frame-spaced, orbit-spaced, close-orbit-spaced")]
    UnknownSpacing(String),

    #[error("No sensor registered for satellite {0}")]
    MissingSensor(u32),

    #[error("Log write error: {0}")]
    Log(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
