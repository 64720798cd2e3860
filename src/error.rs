//! # Error Types
//!
//! Custom error types for Vane Bridge using `thiserror`.

use thiserror::Error;

/// Main error type for Vane Bridge
#[derive(Debug, Error)]
pub enum VaneBridgeError {
    /// Configuration validation errors (fatal at startup)
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file parse errors
    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Feed document is not structurally parseable
    #[error("feed format error: {0}")]
    FeedFormat(String),

    /// Feed could not be retrieved (network, HTTP status, timeout)
    #[error("feed fetch error: {0}")]
    Fetch(String),

    /// Serial transport errors
    #[error("serial error: {0}")]
    Serial(String),

    /// No gauge serial device found
    #[error("no gauge serial port found (tried: {0})")]
    SerialPortNotFound(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Vane Bridge
pub type Result<T> = std::result::Result<T, VaneBridgeError>;
