//! Error types for engine construction and operation

use thiserror::Error;

use crate::types::ItemId;

/// Errors raised while validating the parameter map at construction time
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required parameter is absent
    #[error("Missing required parameter: {0}")]
    Missing(&'static str),

    /// A parameter is present but unusable
    #[error("Invalid value for {key}: {reason}")]
    Invalid {
        key: &'static str,
        reason: String,
    },
}

/// Errors surfaced to the control thread during operation
#[derive(Error, Debug)]
pub enum EngineError {
    /// The host policy refused to start or stop the callback
    #[error("Host policy error: {0}")]
    Host(String),

    /// An operation requires the engine to be inactive (e.g. installing
    /// the middle pass) but callbacks are running
    #[error("Engine is active; {0}")]
    Active(&'static str),

    /// A handle referred to an item that is not installed
    #[error("No such item: {0:?}")]
    NotFound(ItemId),

    /// The command queue still held entries after the deactivation drain
    /// loop terminated. A command was lost; this is a bug.
    #[error("Command queue not empty after drain")]
    QueueNotDrained,
}

/// Failure of a single item's process step, reported at the slice boundary.
///
/// `Recoverable` is logged and the cycle continues (the affected output
/// publishes silence). `Fatal` marks a broken programmer contract and
/// aborts processing.
#[derive(Error, Debug)]
pub enum ItemError {
    #[error("{0}")]
    Recoverable(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

impl ItemError {
    /// Convenience constructor for the common case.
    pub fn recoverable(msg: impl Into<String>) -> Self {
        ItemError::Recoverable(msg.into())
    }
}

/// Result type for per-item processing
pub type ItemResult = Result<(), ItemError>;
