//! Error types for the claim engine

use thiserror::Error;

/// Wallet store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Wallet index {index} out of range (store holds {len} wallets)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Wallet not found: {0}")]
    NotFound(String),

    /// Not finite or not positive; never written to the store
    #[error("Invalid claim amount: {0}")]
    InvalidAmount(f64),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Faucet API errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FaucetError {
    /// Transport failure, timeout, non-success status or undecodable body
    #[error("Network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for FaucetError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FaucetError::Network(format!("request timed out: {}", err))
        } else {
            FaucetError::Network(err.to_string())
        }
    }
}

/// Engine-level errors surfaced to the frontend
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Faucet(#[from] FaucetError),

    #[error("A batch claim is already in progress")]
    BatchInProgress,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Configuration errors, fatal at startup
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration value: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type FaucetResult<T> = Result<T, FaucetError>;
pub type EngineResult<T> = Result<T, EngineError>;
