//! Configuration for consumer streams
//!
//! The only tunable is how each consumer's queue behaves when the consumer
//! falls behind the source.

use crate::error::{Result, StreamError};

/// Environment variable read by [`StreamConfig::from_env`]
pub const QUEUE_CAPACITY_ENV: &str = "SYSEVENT_QUEUE_CAPACITY";

/// Configuration for a [`SyseventManager`](crate::SyseventManager)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Per-consumer queue capacity
    ///
    /// `None` queues without bound. `Some(n)` keeps at most `n` undelivered
    /// events per consumer; further events are dropped for that consumer
    /// only and counted in its stats.
    /// Default: None
    pub queue_capacity: Option<usize>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            queue_capacity: None,
        }
    }
}

impl StreamConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unbounded per-consumer queues
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Bounded per-consumer queues that drop on overflow
    pub fn bounded(capacity: usize) -> Self {
        Self {
            queue_capacity: Some(capacity),
        }
    }

    /// Read configuration from the environment
    ///
    /// `SYSEVENT_QUEUE_CAPACITY` sets a bounded queue; `unbounded` or an
    /// unset variable keeps the default.
    pub fn from_env() -> Result<Self> {
        let config = match std::env::var(QUEUE_CAPACITY_ENV) {
            Ok(value) => Self::parse_capacity(&value)?,
            Err(_) => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    fn parse_capacity(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("unbounded") {
            return Ok(Self::unbounded());
        }

        value.parse::<usize>().map(Self::bounded).map_err(|_| {
            StreamError::InvalidConfig(format!(
                "{} must be a positive integer or \"unbounded\", got {:?}",
                QUEUE_CAPACITY_ENV, value
            ))
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == Some(0) {
            return Err(StreamError::InvalidConfig(
                "Queue capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_queue_capacity(mut self, capacity: Option<usize>) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn is_bounded(&self) -> bool {
        self.queue_capacity.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StreamConfig::default();
        assert_eq!(config.queue_capacity, None);
        assert!(!config.is_bounded());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(StreamConfig::bounded(0).validate().is_err());
        assert!(StreamConfig::bounded(1).validate().is_ok());
        assert!(StreamConfig::unbounded().validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = StreamConfig::new().with_queue_capacity(Some(64));
        assert_eq!(config, StreamConfig::bounded(64));
        assert!(config.is_bounded());

        let config = config.with_queue_capacity(None);
        assert_eq!(config, StreamConfig::unbounded());
    }

    #[test]
    fn test_parse_capacity() {
        assert_eq!(
            StreamConfig::parse_capacity("128").unwrap(),
            StreamConfig::bounded(128)
        );
        assert_eq!(
            StreamConfig::parse_capacity(" Unbounded ").unwrap(),
            StreamConfig::unbounded()
        );
        assert_eq!(
            StreamConfig::parse_capacity("").unwrap(),
            StreamConfig::unbounded()
        );
        assert!(matches!(
            StreamConfig::parse_capacity("lots"),
            Err(StreamError::InvalidConfig(_))
        ));
    }
}
