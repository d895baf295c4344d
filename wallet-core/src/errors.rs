use serde::{Deserialize, Serialize};
use std::fmt;

use crate::manager::WalletManagerState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WalletError {
    // Construction-order errors
    MissingPrerequisite(String),
    CurrencyMismatch(String),
    InvalidUnit(String),

    // Reference-discipline errors
    ReleasedHandle(String),

    // State machine errors
    InvalidState {
        operation: String,
        state: WalletManagerState,
    },

    // Native engine and network errors
    EngineError(String),
    NetworkError(String),
    InvalidResponse(String),

    // Lifecycle errors
    SystemDestroyed,
    AlreadyInitialized,
    NotInitialized,

    // Executor errors
    ExecutorBusy,
    ExecutorStopped,
    Timeout(String),

    // Storage errors
    StorageError(String),
    FileNotFound(String),
    PermissionDenied(String),

    // Validation errors
    ValidationError(String),
    InvalidKey(String),
    InvalidAmount(String),

    // Registry errors
    AlreadyExists(String),
    NotFound(String),

    // Generic errors
    Unknown(String),
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WalletError::MissingPrerequisite(msg) => write!(f, "Missing prerequisite: {}", msg),
            WalletError::CurrencyMismatch(msg) => write!(f, "Currency mismatch: {}", msg),
            WalletError::InvalidUnit(msg) => write!(f, "Invalid unit: {}", msg),

            WalletError::ReleasedHandle(msg) => write!(f, "Handle already released: {}", msg),

            WalletError::InvalidState { operation, state } => {
                write!(f, "Cannot {} while wallet manager is {}", operation, state)
            }

            WalletError::EngineError(msg) => write!(f, "Engine error: {}", msg),
            WalletError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            WalletError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),

            WalletError::SystemDestroyed => write!(f, "System has been destroyed"),
            WalletError::AlreadyInitialized => write!(f, "Already initialized"),
            WalletError::NotInitialized => write!(f, "Not initialized"),

            WalletError::ExecutorBusy => write!(f, "Serial executor queue is full"),
            WalletError::ExecutorStopped => write!(f, "Serial executor has been stopped"),
            WalletError::Timeout(msg) => write!(f, "Timed out: {}", msg),

            WalletError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            WalletError::FileNotFound(msg) => write!(f, "File not found: {}", msg),
            WalletError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),

            WalletError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            WalletError::InvalidKey(msg) => write!(f, "Invalid key: {}", msg),
            WalletError::InvalidAmount(msg) => write!(f, "Invalid amount: {}", msg),

            WalletError::AlreadyExists(msg) => write!(f, "Already exists: {}", msg),
            WalletError::NotFound(msg) => write!(f, "Not found: {}", msg),

            WalletError::Unknown(msg) => write!(f, "Unknown error: {}", msg),
        }
    }
}

impl std::error::Error for WalletError {}

impl WalletError {
    /// Shorthand for a rejected state-machine operation.
    pub fn invalid_state(operation: &str, state: WalletManagerState) -> Self {
        WalletError::InvalidState {
            operation: operation.to_string(),
            state,
        }
    }

    /// True for caller bugs (construction order, reference discipline, state misuse).
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            WalletError::MissingPrerequisite(_)
                | WalletError::CurrencyMismatch(_)
                | WalletError::InvalidUnit(_)
                | WalletError::ReleasedHandle(_)
                | WalletError::InvalidState { .. }
                | WalletError::SystemDestroyed
        )
    }
}

pub type WalletResult<T> = Result<T, WalletError>;

// Conversion helpers
impl From<std::io::Error> for WalletError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => WalletError::FileNotFound(error.to_string()),
            std::io::ErrorKind::PermissionDenied => {
                WalletError::PermissionDenied(error.to_string())
            }
            _ => WalletError::StorageError(error.to_string()),
        }
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(error: serde_json::Error) -> Self {
        WalletError::ValidationError(format!("JSON error: {}", error))
    }
}
