//! Bridge configuration.
//!
//! The only value the protocol depends on is the payload capacity, which
//! bounds every single result or error text. The rest shapes the worker.

use std::env;
use std::fs;

use crate::error::{BridgeError, Result};
use crate::protocol::PAYLOAD_TOO_LARGE;
use crate::shared_channel::DEFAULT_CAPACITY;

/// Environment variable overriding the payload capacity in bytes.
pub const ENV_CAPACITY: &str = "SCRIPT_BRIDGE_CAPACITY";

/// Environment variable naming a script file to run when the runtime starts.
pub const ENV_PRELUDE: &str = "SCRIPT_BRIDGE_PRELUDE";

/// Default worker thread name.
pub const DEFAULT_THREAD_NAME: &str = "script-bridge-worker";

/// Construction-time settings for an [`Interop`](crate::interop::Interop).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Payload capacity of the shared region in bytes.
    pub capacity: usize,
    /// Name given to the worker thread.
    pub thread_name: String,
    /// Script evaluated once right after the runtime is constructed.
    pub prelude: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            prelude: None,
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `SCRIPT_BRIDGE_CAPACITY` and
    /// `SCRIPT_BRIDGE_PRELUDE`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(raw) = env::var(ENV_CAPACITY) {
            config.capacity = raw.trim().parse().map_err(|_| {
                BridgeError::Config(format!("{} is not a byte count: {:?}", ENV_CAPACITY, raw))
            })?;
        }

        if let Ok(path) = env::var(ENV_PRELUDE) {
            let source = fs::read_to_string(&path).map_err(|e| {
                BridgeError::Config(format!("cannot read {} file {}: {}", ENV_PRELUDE, path, e))
            })?;
            config.prelude = Some(source);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn with_prelude(mut self, source: impl Into<String>) -> Self {
        self.prelude = Some(source.into());
        self
    }

    /// Check the capacity can hold the size sentinel and fits the u32 length
    /// word.
    pub fn validate(&self) -> Result<()> {
        if self.capacity < PAYLOAD_TOO_LARGE.len() {
            return Err(BridgeError::Config(format!(
                "capacity {} is smaller than the {} byte size-limit message",
                self.capacity,
                PAYLOAD_TOO_LARGE.len()
            )));
        }
        if self.capacity > u32::MAX as usize {
            return Err(BridgeError::Config(format!(
                "capacity {} does not fit the 32-bit length word",
                self.capacity
            )));
        }
        if self.thread_name.is_empty() || self.thread_name.contains('\0') {
            return Err(BridgeError::Config(
                "worker thread name must be non-empty and contain no NUL".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.capacity, 2_000_000);
        assert_eq!(config.thread_name, "script-bridge-worker");
        assert!(config.prelude.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = BridgeConfig::new()
            .with_capacity(4096)
            .with_thread_name("js")
            .with_prelude("var x = 1;");
        assert_eq!(config.capacity, 4096);
        assert_eq!(config.thread_name, "js");
        assert_eq!(config.prelude.as_deref(), Some("var x = 1;"));
    }

    #[test]
    fn test_capacity_must_hold_sentinel() {
        let tiny = BridgeConfig::new().with_capacity(PAYLOAD_TOO_LARGE.len() - 1);
        assert!(matches!(tiny.validate(), Err(BridgeError::Config(_))));

        let exact = BridgeConfig::new().with_capacity(PAYLOAD_TOO_LARGE.len());
        assert!(exact.validate().is_ok());
    }

    #[test]
    fn test_capacity_must_fit_length_word() {
        let huge = BridgeConfig::new().with_capacity(u32::MAX as usize + 1);
        assert!(matches!(huge.validate(), Err(BridgeError::Config(_))));
    }

    #[test]
    fn test_thread_name_rejected_when_empty() {
        let config = BridgeConfig::new().with_thread_name("");
        assert!(config.validate().is_err());
    }
}
