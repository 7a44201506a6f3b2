//! Server configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::session::SessionConfig;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Quality bounds and element settings
    pub session: SessionConfig,

    /// Command FIFO (`None` = no command input)
    pub command_pipe: Option<PathBuf>,

    /// Status FIFO (`None` = status goes to stdout)
    pub status_pipe: Option<PathBuf>,

    /// How often the command pipe is drained
    pub poll_interval: Duration,

    /// Queued session events before senders wait
    pub event_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            command_pipe: None,
            status_pipe: None,
            poll_interval: Duration::from_millis(100),
            event_capacity: 64,
        }
    }
}

impl ServerConfig {
    /// Create a config around session settings
    pub fn with_session(session: SessionConfig) -> Self {
        Self {
            session,
            ..Default::default()
        }
    }

    /// Set the session settings
    pub fn session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Read commands from this FIFO
    pub fn command_pipe(mut self, path: impl Into<PathBuf>) -> Self {
        self.command_pipe = Some(path.into());
        self
    }

    /// Write status messages to this FIFO
    pub fn status_pipe(mut self, path: impl Into<PathBuf>) -> Self {
        self.status_pipe = Some(path.into());
        self
    }

    /// Set the command poll interval (at least 1 ms)
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Set the event queue capacity (at least 1)
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Validate the session settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.session.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert!(config.command_pipe.is_none());
        assert!(config.status_pipe.is_none());
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.event_capacity, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pipes() {
        let config = ServerConfig::default()
            .command_pipe("/tmp/ctl")
            .status_pipe("/tmp/status");

        assert_eq!(config.command_pipe, Some(PathBuf::from("/tmp/ctl")));
        assert_eq!(config.status_pipe, Some(PathBuf::from("/tmp/status")));
    }

    #[test]
    fn test_builder_limits() {
        let config = ServerConfig::default()
            .poll_interval(Duration::ZERO)
            .event_capacity(0);

        assert_eq!(config.poll_interval, Duration::from_millis(1));
        assert_eq!(config.event_capacity, 1);
    }

    #[test]
    fn test_invalid_session_rejected() {
        let config = ServerConfig::with_session(SessionConfig::default().min_quant(40).max_quant(10));

        assert!(config.validate().is_err());
    }
}
