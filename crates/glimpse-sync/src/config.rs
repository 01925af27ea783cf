//! Sync engine configuration

use std::time::Duration;

/// Configuration for the sync service and the HTTP remote adapter
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Remote backend base URL (e.g. `https://api.glimpse.app/rest/v1`)
    pub base_url: Option<String>,
    /// API credential, sent as both the api-key header and the bearer token
    pub api_key: Option<String>,
    /// Quiet period after a local write before a sync cycle starts
    pub debounce: Duration,
    /// Periodic safety-net cycle interval while online
    pub sync_interval: Duration,
    /// Failed attempts before an operation is dropped and its record marked `error`
    pub max_retries: u32,
    /// Per-request timeout; expiry counts as a transient failure
    pub request_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            debounce: Duration::from_secs(1),
            sync_interval: Duration::from_secs(30),
            max_retries: 5,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl SyncConfig {
    /// Create a configuration pointing at a remote backend
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Set the debounce delay after local writes
    #[must_use]
    pub const fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Set the periodic sync interval
    #[must_use]
    pub const fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Set the retry bound for failed operations
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the per-request timeout
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Check if a remote backend is configured
    pub const fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_not_configured() {
        let config = SyncConfig::default();
        assert!(!config.is_configured());
        assert_eq!(config.max_retries, 5);
    }

    #[test]
    fn test_new_is_configured() {
        let config = SyncConfig::new("https://api.example.com/rest/v1", "key");
        assert!(config.is_configured());
    }

    #[test]
    fn test_builders() {
        let config = SyncConfig::default()
            .with_debounce(Duration::from_millis(250))
            .with_sync_interval(Duration::from_secs(60))
            .with_max_retries(3);
        assert_eq!(config.debounce, Duration::from_millis(250));
        assert_eq!(config.sync_interval, Duration::from_secs(60));
        assert_eq!(config.max_retries, 3);
    }
}
