//! Adapter error types

use contracts::ContractError;
use routing::RoutingError;
use thiserror::Error;

/// Adapter specific error
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Worker queue is full, batch dropped
    #[error("adapter '{adapter}' queue is full")]
    QueueFull { adapter: String },

    /// Worker task has stopped
    #[error("adapter '{adapter}' worker is closed")]
    WorkerClosed { adapter: String },

    /// Adapter could not be built from its configuration
    #[error("failed to build adapter '{adapter}': {message}")]
    Build { adapter: String, message: String },

    /// Engine refused the adapter
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl AdapterError {
    /// Create queue full error
    pub fn queue_full(adapter: impl Into<String>) -> Self {
        Self::QueueFull {
            adapter: adapter.into(),
        }
    }

    /// Create worker closed error
    pub fn worker_closed(adapter: impl Into<String>) -> Self {
        Self::WorkerClosed {
            adapter: adapter.into(),
        }
    }

    /// Create build error
    pub fn build(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Build {
            adapter: adapter.into(),
            message: message.into(),
        }
    }
}

impl From<AdapterError> for ContractError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::QueueFull { adapter } => {
                ContractError::delivery(adapter, "queue full, batch dropped")
            }
            AdapterError::WorkerClosed { adapter } => ContractError::adapter_closed(adapter),
            AdapterError::Contract(e) => e,
            other => ContractError::Other(other.to_string()),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, AdapterError>;
