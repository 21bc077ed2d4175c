// In-memory transport for driving a DeviceLink from tests

#![allow(dead_code)]

use async_trait::async_trait;
use ecg_link::link::{Connector, EventSink, TransportEvent, TransportHandle};
use ecg_link::{LinkConfig, LinkError, LinkResult};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct ScriptState {
    refuse: bool,
    close_during_open: Option<String>,
    opened_urls: Vec<String>,
    sink: Option<EventSink>,
    outbound: Option<mpsc::UnboundedReceiver<String>>,
    sent: Vec<String>,
    close_tokens: Vec<CancellationToken>,
}

/// Connector whose peer is the test itself
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent open attempts fail
    pub fn refuse_connections(&self, refuse: bool) {
        self.state.lock().refuse = refuse;
    }

    /// Accept subsequent handshakes but have the device close them before
    /// `open` returns, as a busy device does
    pub fn close_during_open(&self, reason: Option<&str>) {
        self.state.lock().close_during_open = reason.map(str::to_string);
    }

    /// Number of open attempts seen so far, successful or not
    pub fn open_attempts(&self) -> usize {
        self.state.lock().opened_urls.len()
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.state.lock().opened_urls.clone()
    }

    /// Commands written by the link on the current connection and all earlier ones
    pub fn sent(&self) -> Vec<String> {
        let mut state = self.state.lock();
        if let Some(mut rx) = state.outbound.take() {
            while let Ok(message) = rx.try_recv() {
                state.sent.push(message);
            }
            state.outbound = Some(rx);
        }
        state.sent.clone()
    }

    /// True if the link closed the transport returned by the `index`-th successful open
    pub fn was_closed(&self, index: usize) -> bool {
        self.state
            .lock()
            .close_tokens
            .get(index)
            .map(CancellationToken::is_cancelled)
            .unwrap_or(false)
    }

    pub fn push(&self, event: TransportEvent) {
        let sink = self.state.lock().sink.clone();
        if let Some(sink) = sink {
            sink.emit(event);
        }
    }

    pub fn push_text(&self, text: &str) {
        self.push(TransportEvent::Text(text.to_string()));
    }

    pub fn push_bytes(&self, bytes: &[u8]) {
        self.push(TransportEvent::Binary(bytes.to_vec()));
    }

    /// Simulate the device dropping the connection
    pub fn drop_connection(&self) {
        self.push(TransportEvent::Closed {
            reason: Some("1006 abnormal closure".to_string()),
        });
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self, url: &str, events: EventSink) -> LinkResult<TransportHandle> {
        let mut state = self.state.lock();
        state.opened_urls.push(url.to_string());

        if state.refuse {
            return Err(LinkError::Connect("connection refused".to_string()));
        }

        if let Some(mut rx) = state.outbound.take() {
            while let Ok(message) = rx.try_recv() {
                state.sent.push(message);
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let close = CancellationToken::new();
        if let Some(reason) = state.close_during_open.clone() {
            events.emit(TransportEvent::Closed {
                reason: Some(reason),
            });
        }

        state.sink = Some(events);
        state.outbound = Some(rx);
        state.close_tokens.push(close.clone());

        Ok(TransportHandle::new(tx, close))
    }
}

/// Config with the protocol defaults
pub fn test_config() -> LinkConfig {
    LinkConfig::default()
}
