// Device link - one measurement session against one device
//
// `DeviceLink` is the handle the UI holds. All work happens on a single
// event loop task that owns the `ConnectionManager`, the decoder and the
// write side of the lead buffers. The loop serves two queues: caller
// requests, and connection events (open results, inbound traffic, closes,
// reconnect timers). Connection events are drained first, so a request
// observes every message that arrived before it was issued.
//
// Readers get copies of the buffers, never references into them.

use crate::config::LinkConfig;
use crate::link::buffer::{BufferUpdate, LeadBuffers, LeadSnapshot};
use crate::link::connection::{ConnectionEvent, ConnectionManager, ConnectionOutput};
use crate::link::observer::LinkCallbacks;
use crate::link::protocol::{LineSplitter, ProtocolDecoder, ProtocolEvent};
use crate::link::transport::{Connector, WebSocketConnector};
use crate::link::types::{Command, ConnectionState, DeviceStatus, Lead, LinkError, LinkResult};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

enum Request {
    Connect {
        address: String,
        reply: oneshot::Sender<LinkResult<()>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    SelectLead {
        lead: Lead,
        reply: oneshot::Sender<LinkResult<()>>,
    },
    StartRecording {
        reply: oneshot::Sender<LinkResult<()>>,
    },
    StopRecording {
        reply: oneshot::Sender<LinkResult<()>>,
    },
    Send {
        command: Command,
        reply: oneshot::Sender<LinkResult<()>>,
    },
    ClearCaptures {
        reply: oneshot::Sender<()>,
    },
    Sync {
        reply: oneshot::Sender<()>,
    },
}

/// Session-scoped link to one ECG device
///
/// Must be created inside a tokio runtime. Dropping the link stops its
/// event loop, closes the socket and cancels any pending reconnect.
pub struct DeviceLink {
    id: String,
    requests: mpsc::UnboundedSender<Request>,
    buffers: Arc<RwLock<LeadBuffers>>,
    state: Arc<RwLock<ConnectionState>>,
    callbacks: Arc<LinkCallbacks>,
    cancel_token: CancellationToken,
}

impl DeviceLink {
    /// Create a link that talks WebSocket to the device
    pub fn new(config: &LinkConfig) -> Self {
        Self::with_connector(config, Arc::new(WebSocketConnector))
    }

    /// Create a link over a custom transport
    pub fn with_connector(config: &LinkConfig, connector: Arc<dyn Connector>) -> Self {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let buffers = Arc::new(RwLock::new(LeadBuffers::new(config.live_window_capacity)));
        let state = Arc::new(RwLock::new(ConnectionState::Disconnected));
        let callbacks = Arc::new(LinkCallbacks::default());
        let cancel_token = CancellationToken::new();

        let manager = ConnectionManager::new(
            connector,
            config.reconnect_policy(),
            event_tx,
            Arc::clone(&callbacks),
            Arc::clone(&state),
        );

        let worker = LinkWorker {
            manager,
            decoder: ProtocolDecoder::new(config.field_policy),
            splitter: LineSplitter::new(),
            buffers: Arc::clone(&buffers),
            callbacks: Arc::clone(&callbacks),
            device_lead: None,
        };

        tokio::spawn(worker.run(request_rx, event_rx, cancel_token.clone()));

        let id = uuid::Uuid::new_v4().to_string();
        log::debug!("Device link {} created", id);

        Self {
            id,
            requests: request_tx,
            buffers,
            state,
            callbacks,
            cancel_token,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Connect to the device at `address`, closing any previous connection
    pub async fn connect(&self, address: &str) -> LinkResult<()> {
        let address = address.to_string();
        self.call(|reply| Request::Connect { address, reply }).await?
    }

    /// Close the connection; never fails and may be called repeatedly
    pub async fn disconnect(&self) {
        let _ = self.call(|reply| Request::Disconnect { reply }).await;
    }

    /// Make `lead` the recording target, telling the device if connected
    pub async fn select_lead(&self, lead: Lead) -> LinkResult<()> {
        self.call(|reply| Request::SelectLead { lead, reply }).await?
    }

    /// Arm acquisition on the active lead
    pub async fn start_recording(&self) -> LinkResult<()> {
        self.call(|reply| Request::StartRecording { reply }).await?
    }

    /// Disarm acquisition and commit whatever the in-flight buffer holds
    pub async fn stop_recording(&self) -> LinkResult<()> {
        self.call(|reply| Request::StopRecording { reply }).await?
    }

    /// Send a raw command
    pub async fn send_command(&self, command: Command) -> LinkResult<()> {
        self.call(|reply| Request::Send { command, reply }).await?
    }

    /// Drop all captures, e.g. before measuring a new patient
    pub async fn clear_captures(&self) -> LinkResult<()> {
        self.call(|reply| Request::ClearCaptures { reply }).await
    }

    /// Wait until every message received so far has been applied
    pub async fn sync(&self) -> LinkResult<()> {
        self.call(|reply| Request::Sync { reply }).await
    }

    async fn call<T>(
        &self,
        request: impl FnOnce(oneshot::Sender<T>) -> Request,
    ) -> LinkResult<T> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(request(tx))
            .map_err(|_| LinkError::ChannelClosed)?;
        rx.await.map_err(|_| LinkError::ChannelClosed)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn active_lead(&self) -> Lead {
        self.buffers.read().active()
    }

    pub fn device_status(&self) -> DeviceStatus {
        self.buffers.read().status().clone()
    }

    /// Committed capture of `lead`
    pub fn captured(&self, lead: Lead) -> Vec<i32> {
        self.buffers.read().captured(lead)
    }

    /// Most recent samples of `lead` for preview
    pub fn live_window(&self, lead: Lead) -> Vec<i32> {
        self.buffers.read().live_window(lead)
    }

    pub fn snapshot(&self) -> LeadSnapshot {
        self.buffers.read().snapshot()
    }

    pub fn on_connection_changed<F>(&self, callback: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.callbacks.set_connection_changed(Some(Arc::new(callback)));
    }

    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.set_error(Some(Arc::new(callback)));
    }

    pub fn on_sample_update<F>(&self, callback: F)
    where
        F: Fn(Lead) + Send + Sync + 'static,
    {
        self.callbacks.set_sample_update(Some(Arc::new(callback)));
    }

    pub fn on_status<F>(&self, callback: F)
    where
        F: Fn(&DeviceStatus) + Send + Sync + 'static,
    {
        self.callbacks.set_status(Some(Arc::new(callback)));
    }

    /// Unsubscribe every observer
    pub fn clear_observers(&self) {
        self.callbacks.clear();
    }
}

impl Drop for DeviceLink {
    fn drop(&mut self) {
        self.cancel_token.cancel();
        log::debug!("Device link {} dropped", self.id);
    }
}

struct LinkWorker {
    manager: ConnectionManager,
    decoder: ProtocolDecoder,
    splitter: LineSplitter,
    buffers: Arc<RwLock<LeadBuffers>>,
    callbacks: Arc<LinkCallbacks>,
    // Lead last announced to the device on the current connection
    device_lead: Option<Lead>,
}

impl LinkWorker {
    async fn run(
        mut self,
        mut requests: mpsc::UnboundedReceiver<Request>,
        mut events: mpsc::UnboundedReceiver<ConnectionEvent>,
        cancel_token: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;

                _ = cancel_token.cancelled() => break,

                Some(event) = events.recv() => self.on_connection_event(event),

                request = requests.recv() => match request {
                    Some(request) => self.on_request(request),
                    None => break,
                },
            }
        }

        self.manager.disconnect();
        log::debug!("Device link event loop stopped");
    }

    fn on_request(&mut self, request: Request) {
        match request {
            Request::Connect { address, reply } => {
                self.device_lead = None;
                self.manager.connect(&address, reply);
            }
            Request::Disconnect { reply } => {
                self.manager.disconnect();
                self.device_lead = None;
                self.splitter.reset();
                let _ = reply.send(());
            }
            Request::SelectLead { lead, reply } => {
                let _ = reply.send(self.select_lead(lead));
            }
            Request::StartRecording { reply } => {
                let _ = reply.send(self.start_recording());
            }
            Request::StopRecording { reply } => {
                let _ = reply.send(self.stop_recording());
            }
            Request::Send { command, reply } => {
                let _ = reply.send(self.send(command));
            }
            Request::ClearCaptures { reply } => {
                self.buffers.write().reset();
                let _ = reply.send(());
            }
            Request::Sync { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn select_lead(&mut self, lead: Lead) -> LinkResult<()> {
        let changed = self.buffers.write().set_active(lead);
        log::info!("Active lead: {}", lead);

        if changed && self.manager.state().is_connected() {
            self.send(Command::SelectLead(lead))?;
        }
        Ok(())
    }

    fn start_recording(&mut self) -> LinkResult<()> {
        self.manager.ensure_connected()?;

        let lead = self.buffers.read().active();
        if self.device_lead != Some(lead) {
            self.send(Command::SelectLead(lead))?;
        }

        self.buffers.write().clear_live_window(lead);
        self.send(Command::Start)
    }

    fn stop_recording(&mut self) -> LinkResult<()> {
        let sent = self.send(Command::Stop);

        let flushed = self.buffers.write().flush();
        if let Some((lead, len)) = flushed {
            log::info!("Committed {} samples to {} on stop", len, lead);
            self.callbacks.sample_update(lead);
        }

        sent
    }

    fn send(&mut self, command: Command) -> LinkResult<()> {
        self.manager.send(command)?;
        if let Command::SelectLead(lead) = command {
            self.device_lead = Some(lead);
        }
        Ok(())
    }

    fn on_connection_event(&mut self, event: ConnectionEvent) {
        match self.manager.handle(event) {
            ConnectionOutput::Nothing => {}
            ConnectionOutput::Opened | ConnectionOutput::Closed => {
                self.splitter.reset();
                self.device_lead = None;
            }
            ConnectionOutput::Text(text) => {
                for event in self.decoder.decode_payload(&text) {
                    self.apply(event);
                }
            }
            ConnectionOutput::Binary(data) => {
                for line in self.splitter.push(&data) {
                    if let Some(event) = self.decoder.decode_line(&line) {
                        self.apply(event);
                    }
                }
            }
        }
    }

    fn apply(&mut self, event: ProtocolEvent) {
        let update = self.buffers.write().apply(&event);

        match update {
            BufferUpdate::Samples { lead, .. } => self.callbacks.sample_update(lead),
            BufferUpdate::Committed { lead, len } => {
                log::info!("Committed {} samples to {}", len, lead);
                self.callbacks.sample_update(lead);
            }
            BufferUpdate::Discarded { len } => {
                if len > 0 {
                    log::debug!("Discarded {} uncommitted samples", len);
                }
            }
            BufferUpdate::Status(status) => {
                log::info!("Device status: {:?}", status);
                self.callbacks.status(&status);
            }
            BufferUpdate::Unchanged => {
                if let ProtocolEvent::Unrecognized(line) = event {
                    log::debug!("Dropping unrecognized line: {:?}", line);
                }
            }
        }
    }
}
