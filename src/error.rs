//! Error types for naivechain

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("Truncated input: expected {expected} bytes, got {actual}")]
    TruncatedInput { expected: usize, actual: usize },

    #[error("Trailing data: expected {expected} bytes, got {actual}")]
    TrailingData { expected: usize, actual: usize },

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Public key encodes to {actual} bytes, expected {expected}")]
    KeyEncodingLength { expected: usize, actual: usize },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid chain at block {index}: {reason}")]
    InvalidChain { index: usize, reason: String },

    #[error("Randomness source failed: {0}")]
    Randomness(String),

    #[error("Proof-of-work search cancelled")]
    MiningCancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Node error: {0}")]
    Node(String),
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::Config(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
