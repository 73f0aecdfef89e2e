//! Engine configuration.

use crate::error::{GenFlowError, Result};
use std::time::Duration;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(600);
const DEFAULT_MAX_GROUP_SIZE: usize = 8;

/// Polling cadence and limits of the [`TaskEngine`](crate::task::TaskEngine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Delay between status refreshes in the waiting paths.
    pub poll_interval: Duration,
    /// Wall-clock budget of one wait.
    pub wait_timeout: Duration,
    /// Largest accepted group.
    pub max_group_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            max_group_size: DEFAULT_MAX_GROUP_SIZE,
        }
    }
}

impl EngineConfig {
    /// Creates a builder with defaults and environment fallback.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    poll_interval: Option<Duration>,
    wait_timeout: Option<Duration>,
    max_group_size: Option<usize>,
}

impl EngineConfigBuilder {
    /// Sets the poll interval. Falls back to `GENFLOW_POLL_INTERVAL_SECS`.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Sets the wait budget. Falls back to `GENFLOW_WAIT_TIMEOUT_SECS`.
    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    /// Sets the largest group a single job may request.
    pub fn max_group_size(mut self, size: usize) -> Self {
        self.max_group_size = Some(size);
        self
    }

    /// Resolves environment fallbacks and checks the settings.
    pub fn build(self) -> Result<EngineConfig> {
        let poll_interval = match self.poll_interval {
            Some(interval) => interval,
            None => env_secs("GENFLOW_POLL_INTERVAL_SECS")?.unwrap_or(DEFAULT_POLL_INTERVAL),
        };
        let wait_timeout = match self.wait_timeout {
            Some(timeout) => timeout,
            None => env_secs("GENFLOW_WAIT_TIMEOUT_SECS")?.unwrap_or(DEFAULT_WAIT_TIMEOUT),
        };
        let max_group_size = self.max_group_size.unwrap_or(DEFAULT_MAX_GROUP_SIZE);

        if poll_interval.is_zero() {
            return Err(GenFlowError::invalid("poll interval must be positive"));
        }
        if max_group_size == 0 {
            return Err(GenFlowError::invalid("max group size must be at least 1"));
        }

        Ok(EngineConfig {
            poll_interval,
            wait_timeout,
            max_group_size,
        })
    }
}

fn env_secs(var: &str) -> Result<Option<Duration>> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(|secs| Some(Duration::from_secs_f64(secs)))
            .ok_or_else(|| GenFlowError::invalid(format!("{var} must be a number of seconds, got `{value}`"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_values_win() {
        let config = EngineConfig::builder()
            .poll_interval(Duration::from_millis(250))
            .wait_timeout(Duration::from_secs(30))
            .max_group_size(4)
            .build()
            .unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.wait_timeout, Duration::from_secs(30));
        assert_eq!(config.max_group_size, 4);
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.wait_timeout, Duration::from_secs(600));
        assert_eq!(config.max_group_size, 8);
    }

    #[test]
    fn test_rejects_degenerate_values() {
        assert!(EngineConfig::builder()
            .poll_interval(Duration::ZERO)
            .build()
            .is_err());
        assert!(EngineConfig::builder()
            .poll_interval(Duration::from_secs(1))
            .wait_timeout(Duration::from_secs(1))
            .max_group_size(0)
            .build()
            .is_err());
    }
}
