use crate::link::connection::ReconnectPolicy;
use crate::link::protocol::FieldPolicy;
use crate::link::types::{LinkError, LinkResult};
use crate::link::LIVE_WINDOW_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Sampling rate of the acquisition firmware in Hz
pub const DEFAULT_SAMPLING_RATE: u32 = 360;

/// Recording length per lead enforced by callers, in seconds
pub const DEFAULT_RECORDING_SECS: u64 = 15;

pub const DEFAULT_ANALYSIS_URL: &str = "http://localhost:8000";

/// Tunables for a measurement session
///
/// Every field has a default, so a config file only needs the keys it
/// overrides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LinkConfig {
    pub max_reconnect_attempts: u32,
    pub reconnect_delay_ms: u64,
    pub connect_timeout_ms: u64,
    pub live_window_capacity: usize,
    pub field_policy: FieldPolicy,
    pub sampling_rate: u32,
    pub recording_duration_secs: u64,
    pub analysis_url: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 5,
            reconnect_delay_ms: 3000,
            connect_timeout_ms: 10_000,
            live_window_capacity: LIVE_WINDOW_CAPACITY,
            field_policy: FieldPolicy::ZeroFill,
            sampling_rate: DEFAULT_SAMPLING_RATE,
            recording_duration_secs: DEFAULT_RECORDING_SECS,
            analysis_url: DEFAULT_ANALYSIS_URL.to_string(),
        }
    }
}

impl LinkConfig {
    /// Load a JSON config file
    pub fn load(path: &Path) -> LinkResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LinkError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: LinkConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LinkResult<()> {
        if self.live_window_capacity == 0 {
            return Err(LinkError::Config(
                "live_window_capacity must be at least 1".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(LinkError::Config(
                "connect_timeout_ms must be positive".to_string(),
            ));
        }
        if self.sampling_rate == 0 {
            return Err(LinkError::Config("sampling_rate must be positive".to_string()));
        }
        Ok(())
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.max_reconnect_attempts,
            delay: Duration::from_millis(self.reconnect_delay_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }

    pub fn recording_duration(&self) -> Duration {
        Duration::from_secs(self.recording_duration_secs)
    }
}
