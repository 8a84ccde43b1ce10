//! Client configuration.
//!
//! Loaded from environment variables with sensible defaults, and overridable
//! with the `with_*` builders.

use crate::keys::DEFAULT_PREFIX;
use std::env;

/// Store address used when none is configured.
pub const DEFAULT_ADDRESS: &str = "localhost:6379";

/// Configuration for connecting an [`UpcomingClient`](crate::client::UpcomingClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpcomingConfig {
    /// Store address, either `host:port` or a full `redis://` URL.
    pub address: String,
    /// Namespace prefix for every key and the notification channel.
    pub prefix: String,
}

impl UpcomingConfig {
    /// Create a configuration for `address` with the default prefix.
    ///
    /// An empty address selects [`DEFAULT_ADDRESS`].
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self::default().with_address(address)
    }

    /// Load configuration from the environment.
    ///
    /// - `UPCOMING_ADDRESS` (default `localhost:6379`)
    /// - `UPCOMING_PREFIX` (default `upcoming`)
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            address: env::var("UPCOMING_ADDRESS")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_ADDRESS.to_string()),
            prefix: env::var("UPCOMING_PREFIX")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
        }
    }

    /// Set the store address. An empty address keeps the current one.
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        let address = address.into();
        if !address.is_empty() {
            self.address = address;
        }
        self
    }

    /// Set the namespace prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Connection URL for the store.
    ///
    /// ```
    /// use upcoming_core::config::UpcomingConfig;
    ///
    /// assert_eq!(UpcomingConfig::new("cache:6380").redis_url(), "redis://cache:6380");
    /// assert_eq!(UpcomingConfig::new("rediss://cache:6380/2").redis_url(), "rediss://cache:6380/2");
    /// ```
    #[must_use]
    pub fn redis_url(&self) -> String {
        if self.address.contains("://") {
            self.address.clone()
        } else {
            format!("redis://{}", self.address)
        }
    }
}

impl Default for UpcomingConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}
