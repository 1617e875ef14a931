//! Routing engine error types

use std::any::Any;

use thiserror::Error;

/// Routing-specific errors
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Engine has been shut down
    #[error("routing engine is shut down")]
    Disposed,

    /// Adapter name already registered
    #[error("adapter '{name}' is already registered")]
    DuplicateAdapter { name: String },

    /// Route calculation panicked
    #[error("route calculation panicked: {message}")]
    CalculationPanicked { message: String },
}

impl RoutingError {
    /// Create a duplicate adapter error
    pub fn duplicate_adapter(name: impl Into<String>) -> Self {
        Self::DuplicateAdapter { name: name.into() }
    }

    /// Build a calculation error from a caught panic payload
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        Self::CalculationPanicked {
            message: panic_message(payload),
        }
    }
}

/// Best-effort text of a caught panic
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Routing Result alias
pub type Result<T> = std::result::Result<T, RoutingError>;
