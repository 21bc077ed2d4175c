pub mod analysis;
pub mod config;
pub mod link;
pub mod preferences;

pub use analysis::{AnalysisClient, AnalysisError, AnalysisRequest, Diagnosis, HttpAnalysisClient};
pub use config::LinkConfig;
pub use link::{
    Command, ConnectionState, DeviceAddress, DeviceLink, DeviceStatus, Lead, LeadSnapshot,
    LinkError, LinkResult, ProtocolEvent,
};
pub use preferences::{PreferenceStore, Preferences};
