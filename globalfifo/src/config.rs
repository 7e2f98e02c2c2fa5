//! Device configuration
//!
//! The capacity is fixed when the [`crate::Device`] is built. Deployments
//! override the defaults through the environment, see [`FifoConfig::from_env`].

use crate::error::FifoError;

/// Default buffer capacity in bytes (0x1000)
pub const DEFAULT_CAPACITY: usize = 0x1000;

/// Default number of pending "readable" signals kept per subscriber
pub const DEFAULT_NOTIFY_DEPTH: usize = 16;

pub const ENV_CAPACITY: &str = "GLOBALFIFO_SIZE";
pub const ENV_NOTIFY_DEPTH: &str = "GLOBALFIFO_NOTIFY_DEPTH";

/// Configuration for the fifo device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FifoConfig {
    /// Size of the byte buffer
    pub capacity: usize,

    /// Bounded channel depth for each async-notification subscriber.
    /// Signals beyond it are coalesced.
    pub notify_depth: usize,
}

impl Default for FifoConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            notify_depth: DEFAULT_NOTIFY_DEPTH,
        }
    }
}

impl FifoConfig {
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_notify_depth(mut self, depth: usize) -> Self {
        self.notify_depth = depth;
        self
    }

    /// Defaults overridden by `GLOBALFIFO_SIZE` and `GLOBALFIFO_NOTIFY_DEPTH`
    pub fn from_env() -> Result<Self, FifoError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`], reading variables through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, FifoError> {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_CAPACITY) {
            config.capacity = parse_size(ENV_CAPACITY, &value)?;
        }
        if let Some(value) = lookup(ENV_NOTIFY_DEPTH) {
            config.notify_depth = parse_size(ENV_NOTIFY_DEPTH, &value)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FifoError> {
        if self.capacity == 0 {
            return Err(FifoError::InvalidConfig("capacity must be non-zero".into()));
        }
        if self.notify_depth == 0 {
            return Err(FifoError::InvalidConfig(
                "notify depth must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Accepts decimal or `0x`-prefixed hex
fn parse_size(key: &str, value: &str) -> Result<usize, FifoError> {
    let value = value.trim();
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| FifoError::InvalidConfig(format!("{key}={value:?}: {e}")))
}
