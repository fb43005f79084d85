//! Error types surfaced by the agents.

use thiserror::Error;

/// Errors produced by the XCS core and its persistence layer.
#[derive(Error, Debug)]
pub enum XcsError {
    /// Rejected agent configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Covering failed to establish enough action diversity in the match set.
    #[error("covering did not converge after {rounds} rounds")]
    CoveringDivergence { rounds: usize },

    /// The reward sequence is shorter than the in-flight action history.
    #[error("received {received} rewards for {expected} in-flight actions")]
    RewardShapeMismatch { expected: usize, received: usize },

    /// Save file I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Save file encoding or decoding failure.
    #[error(transparent)]
    Serialization(#[from] bincode::Error),

    /// Settings file parse failure.
    #[error(transparent)]
    Settings(#[from] serde_json::Error),
}
