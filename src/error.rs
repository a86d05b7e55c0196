//! Error types for the bridge.

use thiserror::Error;

/// Errors surfaced to callers of [`Interop`](crate::interop::Interop).
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The script runtime reported a failure. The text is the runtime's own
    /// message, unchanged.
    #[error("{0}")]
    Script(String),

    /// The result or error text did not fit the shared buffer.
    #[error("payload too large for shared buffer ({capacity} byte capacity)")]
    PayloadTooLarge { capacity: usize },

    /// `execute` was called after `dispose`.
    #[error("bridge has been disposed")]
    Disposed,

    /// The worker thread is gone without having been disposed.
    #[error("bridge worker is no longer running")]
    WorkerGone,

    /// The worker thread could not be spawned.
    #[error("failed to spawn bridge worker: {0}")]
    Spawn(#[from] std::io::Error),

    /// The configuration was rejected before starting.
    #[error("invalid bridge configuration: {0}")]
    Config(String),
}

impl BridgeError {
    /// Whether the failure came from the script runtime itself rather than
    /// from the bridge.
    pub fn is_script(&self) -> bool {
        matches!(self, Self::Script(_))
    }
}

/// A failure raised by a [`ScriptRuntime`](crate::runtime::ScriptRuntime).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ScriptError(pub String);

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<String> for ScriptError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for ScriptError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_error_is_not_wrapped() {
        let err = BridgeError::Script("boom".to_string());
        assert_eq!(err.to_string(), "boom");
        assert!(err.is_script());
        assert!(!BridgeError::Disposed.is_script());
    }

    #[test]
    fn test_script_error_conversions() {
        assert_eq!(ScriptError::from("x"), ScriptError::new("x"));
        assert_eq!(ScriptError::from("y".to_string()).message(), "y");
    }
}
