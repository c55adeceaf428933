//! Adapter configuration.

use crate::buffer::BufferPolicy;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Defaults applied by [`EventAdapter`](crate::EventAdapter) bindings.
///
/// ```toml
/// trace_events = true
///
/// [channel_policy]
/// kind = "conflated"
///
/// [stream_policy]
/// kind = "bounded"
/// capacity = 16
/// overflow = "drop_oldest"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Buffer policy for queued-channel delivery
    pub channel_policy: BufferPolicy,
    /// Buffer policy for reactive-stream delivery
    pub stream_policy: BufferPolicy,
    /// Log every delivered event at trace level
    pub trace_events: bool,
    /// Warn when an event is dropped under backpressure
    pub log_overflow: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            channel_policy: BufferPolicy::default(),
            stream_policy: BufferPolicy::default(),
            trace_events: false,
            log_overflow: true,
        }
    }
}

impl AdapterConfig {
    /// Set the queued-channel buffer policy.
    pub fn with_channel_policy(mut self, policy: BufferPolicy) -> Self {
        self.channel_policy = policy;
        self
    }

    /// Set the reactive-stream buffer policy.
    pub fn with_stream_policy(mut self, policy: BufferPolicy) -> Self {
        self.stream_policy = policy;
        self
    }

    /// Enable or disable per-event trace logging.
    pub fn with_event_tracing(mut self, enabled: bool) -> Self {
        self.trace_events = enabled;
        self
    }

    /// Enable or disable overflow warnings.
    pub fn with_overflow_logging(mut self, enabled: bool) -> Self {
        self.log_overflow = enabled;
        self
    }

    /// Check both buffer policies.
    pub fn validate(&self) -> Result<()> {
        self.channel_policy
            .validate()
            .map_err(|e| Error::Config(format!("channel_policy: {}", e)))?;
        self.stream_policy
            .validate()
            .map_err(|e| Error::Config(format!("stream_policy: {}", e)))?;
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }
}
