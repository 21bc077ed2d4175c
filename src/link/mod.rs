// Real-time link to an ECG acquisition device
//
// This module connects to the device over WebSocket, decodes its line
// protocol into per-lead sample buffers and issues acquisition commands.
//
// Architecture:
// - `address`: IPv4 validation of the user-supplied device address
// - `protocol`: Line classifier and byte-stream line splitter
// - `buffer`: Per-lead capture and bounded live preview window
// - `transport`: Pluggable message transport (WebSocket by default)
// - `connection`: Socket lifecycle and bounded auto-reconnect
// - `session`: `DeviceLink`, the event loop tying the pieces together
// - `observer`: Single-subscriber notification slots

pub mod address;
pub mod buffer;
pub mod connection;
pub mod observer;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;

pub use address::{validate, DeviceAddress};
pub use buffer::{BufferUpdate, ChannelBuffer, LeadBuffers, LeadSnapshot, LIVE_WINDOW_CAPACITY};
pub use connection::{ConnectionEvent, ConnectionManager, ReconnectPolicy};
pub use protocol::{decode_line, FieldPolicy, LineSplitter, ProtocolDecoder, ProtocolEvent};
pub use session::DeviceLink;
pub use transport::{Connector, EventSink, TransportEvent, TransportHandle, WebSocketConnector};
pub use types::{Command, ConnectionState, DeviceStatus, Lead, LinkError, LinkResult};
