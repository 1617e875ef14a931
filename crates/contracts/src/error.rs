//! Layered error definitions
//!
//! Categorized by source: config / key / adapter

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Key Errors =====
    /// Measurement key could not be parsed
    #[error("invalid measurement key '{input}': {message}")]
    InvalidKey { input: String, message: String },

    // ===== Adapter Errors =====
    /// Adapter refused or failed a delivery
    #[error("adapter '{adapter}' delivery error: {message}")]
    Delivery { adapter: String, message: String },

    /// Adapter worker is gone
    #[error("adapter '{adapter}' is closed")]
    AdapterClosed { adapter: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create invalid key error
    pub fn invalid_key(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidKey {
            input: input.into(),
            message: message.into(),
        }
    }

    /// Create delivery error
    pub fn delivery(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Delivery {
            adapter: adapter.into(),
            message: message.into(),
        }
    }

    /// Create adapter closed error
    pub fn adapter_closed(adapter: impl Into<String>) -> Self {
        Self::AdapterClosed {
            adapter: adapter.into(),
        }
    }
}
