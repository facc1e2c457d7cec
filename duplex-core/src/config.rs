//! Session settings. Hosts load these from a file or environment; see `duplex-linux`.

use std::time::Duration;

use serde::Deserialize;

use crate::pool::LIST_MAX_NUM_NODES;

/// Upper bound on `queue_capacity`; each queue allocates its whole pool up front.
pub const MAX_QUEUE_CAPACITY: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Nodes in each channel's pool (default `LIST_MAX_NUM_NODES`).
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// How long one input poll waits before re-checking the run flag (default 100 ms).
    #[serde(default = "default_input_poll_ms")]
    pub input_poll_ms: u64,
    /// Socket read timeout in ms; 0 blocks until a datagram or wake arrives (default 500).
    #[serde(default = "default_receive_timeout_ms")]
    pub receive_timeout_ms: u64,
    /// End the session after this many consecutive send failures. Unset: never.
    #[serde(default)]
    pub max_consecutive_send_failures: Option<u32>,
    /// Printed before every rendered message.
    #[serde(default = "default_render_prefix")]
    pub render_prefix: String,
}

fn default_queue_capacity() -> usize {
    LIST_MAX_NUM_NODES
}
fn default_input_poll_ms() -> u64 {
    100
}
fn default_receive_timeout_ms() -> u64 {
    500
}
fn default_render_prefix() -> String {
    "Received > ".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            input_poll_ms: default_input_poll_ms(),
            receive_timeout_ms: default_receive_timeout_ms(),
            max_consecutive_send_failures: None,
            render_prefix: default_render_prefix(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 || self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(ConfigError::QueueCapacity(self.queue_capacity));
        }
        if self.input_poll_ms == 0 {
            return Err(ConfigError::InputPoll);
        }
        if self.max_consecutive_send_failures == Some(0) {
            return Err(ConfigError::SendFailureLimit);
        }
        Ok(())
    }

    pub fn input_poll_interval(&self) -> Duration {
        Duration::from_millis(self.input_poll_ms)
    }

    /// `None` when the read timeout is disabled.
    pub fn receive_timeout(&self) -> Option<Duration> {
        (self.receive_timeout_ms > 0).then(|| Duration::from_millis(self.receive_timeout_ms))
    }
}

/// Invalid session settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("queue capacity {0} out of range")]
    QueueCapacity(usize),
    #[error("input poll interval must be positive")]
    InputPoll,
    #[error("send failure limit must be positive when set")]
    SendFailureLimit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let c = SessionConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.queue_capacity, LIST_MAX_NUM_NODES);
        assert_eq!(c.render_prefix, "Received > ");
        assert_eq!(c.receive_timeout(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let c: SessionConfig = toml::from_str("queue_capacity = 16\nreceive_timeout_ms = 0").unwrap();
        assert_eq!(c.queue_capacity, 16);
        assert_eq!(c.receive_timeout(), None);
        assert_eq!(c.input_poll_ms, 100);
        assert_eq!(c.max_consecutive_send_failures, None);
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(toml::from_str::<SessionConfig>("queue_size = 3").is_err());
    }

    #[test]
    fn invalid_values() {
        let mut c = SessionConfig {
            queue_capacity: 0,
            ..SessionConfig::default()
        };
        assert_eq!(c.validate(), Err(ConfigError::QueueCapacity(0)));
        c.queue_capacity = 8;
        c.input_poll_ms = 0;
        assert_eq!(c.validate(), Err(ConfigError::InputPoll));
        c.input_poll_ms = 10;
        c.max_consecutive_send_failures = Some(0);
        assert_eq!(c.validate(), Err(ConfigError::SendFailureLimit));
    }
}
