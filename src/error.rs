//! Error types for PressLedger

use std::fmt;

#[derive(Debug, Clone)]
pub enum LedgerError {
    /// Backing file could not be read, written or created.
    Storage(String),
    /// Persisted content exists but does not parse into a block sequence.
    Corruption(String),
    InvalidPayload(String),
    /// The chain tip moved while a block was being sealed.
    Conflict(String),
    NotFound(String),
    Config(String),
    Gateway(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LedgerError::Storage(msg) => write!(f, "Storage error: {}", msg),
            LedgerError::Corruption(msg) => write!(f, "Corrupt ledger: {}", msg),
            LedgerError::InvalidPayload(msg) => write!(f, "Invalid payload: {}", msg),
            LedgerError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            LedgerError::NotFound(msg) => write!(f, "Not found: {}", msg),
            LedgerError::Config(msg) => write!(f, "Configuration error: {}", msg),
            LedgerError::Gateway(msg) => write!(f, "Gateway error: {}", msg),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Corruption(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, LedgerError>;
