// Common types for the device link

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for device link operations
pub type LinkResult<T> = Result<T, LinkError>;

/// Errors that can occur on the device link
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Invalid IP Address: {0}")]
    InvalidAddress(String),

    #[error("Connection error: {0}")]
    Connect(String),

    #[error("Not connected to device")]
    NotConnected,

    #[error("Command failed: {0}")]
    Send(String),

    #[error("Invalid lead: {0} (expected 1, 2 or 3)")]
    InvalidLead(u8),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Link closed")]
    ChannelClosed,
}

/// Lifecycle state of the device connection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

/// One of the three acquisition channels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "u8", into = "u8")]
pub enum Lead {
    I,
    II,
    III,
}

impl Lead {
    pub const ALL: [Lead; 3] = [Lead::I, Lead::II, Lead::III];

    pub fn number(self) -> u8 {
        match self {
            Lead::I => 1,
            Lead::II => 2,
            Lead::III => 3,
        }
    }

    pub(crate) fn index(self) -> usize {
        self.number() as usize - 1
    }
}

impl Default for Lead {
    fn default() -> Self {
        Lead::I
    }
}

impl TryFrom<u8> for Lead {
    type Error = LinkError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Lead::I),
            2 => Ok(Lead::II),
            3 => Ok(Lead::III),
            other => Err(LinkError::InvalidLead(other)),
        }
    }
}

impl From<Lead> for u8 {
    fn from(lead: Lead) -> Self {
        lead.number()
    }
}

impl fmt::Display for Lead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lead::I => "I",
            Lead::II => "II",
            Lead::III => "III",
        };
        write!(f, "Lead {}", name)
    }
}

/// Instruction sent to the device
///
/// Serialized on the wire as the literal uppercase tokens `LEAD:<n>`,
/// `START` and `STOP`. The device does not acknowledge commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SelectLead(Lead),
    Start,
    Stop,
}

impl Command {
    pub fn to_wire(self) -> String {
        match self {
            Command::SelectLead(lead) => format!("LEAD:{}", lead.number()),
            Command::Start => "START".to_string(),
            Command::Stop => "STOP".to_string(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

/// Acquisition status reported by the device through `STATUS:` lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "data")]
pub enum DeviceStatus {
    #[default]
    Unknown,
    Ready,
    Measuring,
    Other(String),
}

impl DeviceStatus {
    pub fn from_status_text(text: &str) -> Self {
        match text.trim() {
            "READY" => DeviceStatus::Ready,
            "MEASURING" => DeviceStatus::Measuring,
            other => DeviceStatus::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_format() {
        assert_eq!(Command::SelectLead(Lead::I).to_wire(), "LEAD:1");
        assert_eq!(Command::SelectLead(Lead::III).to_wire(), "LEAD:3");
        assert_eq!(Command::Start.to_wire(), "START");
        assert_eq!(Command::Stop.to_wire(), "STOP");
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            LinkError::WebSocket("connection reset".to_string()).to_string(),
            "WebSocket error: connection reset"
        );
        assert_eq!(
            LinkError::Send("broken pipe".to_string()).to_string(),
            "Command failed: broken pipe"
        );
        assert_eq!(LinkError::NotConnected.to_string(), "Not connected to device");
    }

    #[test]
    fn test_lead_conversion() {
        assert_eq!(Lead::try_from(2).unwrap(), Lead::II);
        assert!(matches!(Lead::try_from(0), Err(LinkError::InvalidLead(0))));
        assert!(matches!(Lead::try_from(4), Err(LinkError::InvalidLead(4))));
    }

    #[test]
    fn test_lead_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Lead::II).unwrap(), "2");
        let lead: Lead = serde_json::from_str("3").unwrap();
        assert_eq!(lead, Lead::III);
        assert!(serde_json::from_str::<Lead>("7").is_err());
    }

    #[test]
    fn test_device_status() {
        assert_eq!(DeviceStatus::from_status_text("MEASURING"), DeviceStatus::Measuring);
        assert_eq!(DeviceStatus::from_status_text("READY"), DeviceStatus::Ready);
        assert_eq!(
            DeviceStatus::from_status_text("BATTERY LOW"),
            DeviceStatus::Other("BATTERY LOW".to_string())
        );
    }
}
