//! Registry configuration

use std::time::Duration;

/// Configuration for the channel registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How long a channel with no holders and no publishes survives
    pub idle_grace_period: Duration,

    /// How often the reap task scans for idle channels
    pub reap_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            idle_grace_period: Duration::from_secs(60),
            reap_interval: Duration::from_secs(10),
        }
    }
}

impl RegistryConfig {
    /// Set the idle grace period
    pub fn idle_grace_period(mut self, grace: Duration) -> Self {
        self.idle_grace_period = grace;
        self
    }

    /// Set the reap scan interval
    pub fn reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();

        assert_eq!(config.idle_grace_period, Duration::from_secs(60));
        assert_eq!(config.reap_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_builder_chaining() {
        let config = RegistryConfig::default()
            .idle_grace_period(Duration::from_secs(5))
            .reap_interval(Duration::from_millis(500));

        assert_eq!(config.idle_grace_period, Duration::from_secs(5));
        assert_eq!(config.reap_interval, Duration::from_millis(500));
    }
}
