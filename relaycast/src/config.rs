//! Configuration for router cadences.

use std::time::Duration;

/// Configuration for the router's recurring work.
#[derive(Clone, Debug)]
pub struct RouterConfig {
    /// Interval between retry queue flushes.
    ///
    /// The only timeout mechanism on the bus is this tick times a
    /// message's attempt budget; there is no independent wall-clock
    /// timeout per message.
    pub retry_interval: Duration,

    /// Interval between compaction requests to the proxy.
    ///
    /// A request is only emitted when deregistrations have accumulated
    /// since the last compaction.
    pub cleanup_interval: Duration,

    /// Interval between keepalive pings to the proxy.
    ///
    /// None disables keepalive. Hosts that suspend idle background work
    /// should enable it so the router task is never considered idle.
    pub keepalive_interval: Option<Duration>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(1),
            cleanup_interval: Duration::from_secs(300),
            keepalive_interval: None,
        }
    }
}

impl RouterConfig {
    /// Configuration for memory-constrained hosts: compaction every
    /// minute instead of every five.
    pub fn low_memory() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(60),
            ..Self::default()
        }
    }

    /// Enable keepalive pings at the given interval.
    pub fn with_keepalive(mut self, interval: Duration) -> Self {
        self.keepalive_interval = Some(interval);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cadences() {
        let config = RouterConfig::default();
        assert_eq!(config.retry_interval, Duration::from_secs(1));
        assert_eq!(config.cleanup_interval, Duration::from_secs(300));
        assert!(config.keepalive_interval.is_none());
    }

    #[test]
    fn test_low_memory_shortens_cleanup() {
        let config = RouterConfig::low_memory();
        assert_eq!(config.cleanup_interval, Duration::from_secs(60));
        assert_eq!(config.retry_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_with_keepalive() {
        let config = RouterConfig::default().with_keepalive(Duration::from_secs(3));
        assert_eq!(config.keepalive_interval, Some(Duration::from_secs(3)));
    }
}
