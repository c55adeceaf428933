//! Error types for event bindings.

use thiserror::Error;

/// Errors that can occur while binding to or configuring an event source.
///
/// Only bind-time and configuration failures are errors. Overflow drops and
/// channel termination are normal outcomes and never surface here.
#[derive(Error, Debug)]
pub enum Error {
    /// The widget is destroyed or detached.
    #[error("Widget '{0}' is not available for binding")]
    WidgetUnavailable(String),

    /// The owning scope was cancelled before the bind call.
    #[error("Scope is already cancelled, cannot bind '{0}'")]
    ScopeCancelled(String),

    /// Callback delivery needs a tokio runtime to run the action on.
    #[error("No tokio runtime available to deliver '{0}'")]
    NoRuntime(String),

    /// Buffer policy failed validation.
    #[error("Invalid buffer policy: {0}")]
    InvalidBufferPolicy(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error while loading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for binding operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error returned by non-blocking reads.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryRecvError {
    /// Nothing buffered right now.
    #[error("No event is buffered")]
    Empty,

    /// The binding was torn down and the buffer is drained.
    #[error("Event channel is closed")]
    Closed,
}

