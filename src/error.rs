//! Error types and result handling for binlog-distributor.
//!
//! This module defines the main error type [`Error`] and a convenience
//! [`Result`] type alias used throughout the crate.
//!
//! Routing itself never fails: publish and teardown failures are logged by
//! the [`Distributor`](crate::Distributor) and the remaining subscriptions
//! are still served. These errors surface from configuration loading,
//! subscription validation and the individual publishers.
//!
//! # Example
//!
//! ```rust
//! use binlog_distributor::{Error, Result};
//!
//! fn load_subscriptions() -> Result<()> {
//!     Err(Error::Config("missing [kafka] section".to_string()))
//! }
//!
//! match load_subscriptions() {
//!     Ok(()) => println!("Loaded"),
//!     Err(Error::Config(msg)) => eprintln!("Configuration error: {}", msg),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use thiserror::Error;

/// The main error type for binlog-distributor operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error, from the config file or environment overlay.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Kafka client, producer or admin error.
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// JSON serialization error when encoding or decoding events.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error, typically from the stdin event feed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A subscription record whose granularity and tracked column disagree.
    #[error("Invalid subscription: {message}")]
    InvalidSubscription {
        /// Description of what was invalid
        message: String,
    },

    /// A backend refused or failed to accept a message.
    #[error("Publish to '{topic}' failed: {message}")]
    Publish {
        /// Topic the message was addressed to
        topic: String,
        /// Backend-supplied failure description
        message: String,
    },
}

impl From<::config::ConfigError> for Error {
    fn from(e: ::config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}

/// A convenient Result type alias for binlog-distributor operations.
///
/// This is equivalent to `std::result::Result<T, binlog_distributor::Error>`.
pub type Result<T> = std::result::Result<T, Error>;
