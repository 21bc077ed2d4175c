// Connection manager - owns the device socket lifecycle
//
// The manager is a state machine driven by the link's event loop. Every
// asynchronous step (transport open, inbound traffic, close, reconnect timer)
// comes back as a `ConnectionEvent` on one channel, tagged with the
// generation of the connection attempt that produced it. Events from a
// superseded generation are dropped, so a new `connect` or a `disconnect`
// never races with leftovers of the previous socket.
//
// Reconnection policy:
// - only a connection that reached `Connected` is ever re-established
// - each unsolicited close (or failed reconnect attempt) schedules exactly
//   one attempt after a fixed delay while `attempts < max_attempts`
// - a successful open resets `attempts`; `disconnect` saturates it and
//   cancels any pending timer
// - a close that arrives before the open completes fails that attempt, so
//   a socket the device dropped during the handshake is never reported open

use crate::link::address::DeviceAddress;
use crate::link::observer::LinkCallbacks;
use crate::link::transport::{Connector, EventSink, TransportEvent, TransportHandle};
use crate::link::types::{Command, ConnectionState, LinkError, LinkResult};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Bounded retry policy for dropped connections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub connect_timeout: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(3),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Asynchronous completions delivered to the event loop
#[derive(Debug)]
pub enum ConnectionEvent {
    /// A connect attempt finished
    Opened {
        generation: u64,
        outcome: LinkResult<TransportHandle>,
    },
    /// Traffic from an open transport
    Transport {
        generation: u64,
        event: TransportEvent,
    },
    /// The reconnect delay elapsed
    ReconnectDue { generation: u64 },
}

/// What the event loop should do after the manager handled an event
#[derive(Debug, PartialEq, Eq)]
pub enum ConnectionOutput {
    Nothing,
    /// A new connection is open
    Opened,
    /// The current connection dropped
    Closed,
    /// Inbound text message
    Text(String),
    /// Inbound byte chunk
    Binary(Vec<u8>),
}

pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    callbacks: Arc<LinkCallbacks>,
    state: Arc<RwLock<ConnectionState>>,

    address: Option<DeviceAddress>,
    generation: u64,
    attempts: u32,
    // Set once the current address reached `Connected`; gates auto-reconnect
    established: bool,
    transport: Option<TransportHandle>,
    // Close reason seen for the current generation before its open completed
    closed_while_opening: Option<String>,
    reconnect_timer: Option<CancellationToken>,
    pending_connect: Option<oneshot::Sender<LinkResult<()>>>,
}

impl ConnectionManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        policy: ReconnectPolicy,
        events: mpsc::UnboundedSender<ConnectionEvent>,
        callbacks: Arc<LinkCallbacks>,
        state: Arc<RwLock<ConnectionState>>,
    ) -> Self {
        Self {
            connector,
            policy,
            events,
            callbacks,
            state,
            address: None,
            generation: 0,
            attempts: 0,
            established: false,
            transport: None,
            closed_while_opening: None,
            reconnect_timer: None,
            pending_connect: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Start connecting to `address`; `reply` resolves when the transport
    /// opens or the attempt fails
    pub fn connect(&mut self, address: &str, reply: oneshot::Sender<LinkResult<()>>) {
        let address = match DeviceAddress::parse(address) {
            Ok(address) => address,
            Err(e) => {
                self.callbacks.error(&e.to_string());
                let _ = reply.send(Err(e));
                return;
            }
        };

        if self.address.is_some() || self.state() != ConnectionState::Disconnected {
            self.disconnect();
        }

        log::info!("Connecting to: {}", address);
        self.address = Some(address);
        self.established = false;
        self.pending_connect = Some(reply);
        self.open(address);
    }

    /// Close the connection and suppress further reconnection
    ///
    /// Safe to call in any state.
    pub fn disconnect(&mut self) {
        self.attempts = self.policy.max_attempts;
        self.generation += 1;

        if let Some(timer) = self.reconnect_timer.take() {
            timer.cancel();
        }

        let was_connected = self.state().is_connected();

        if let Some(transport) = self.transport.take() {
            log::info!("Disconnecting WebSocket...");
            self.set_state(ConnectionState::Closing);
            transport.close();
        }

        if let Some(reply) = self.pending_connect.take() {
            let _ = reply.send(Err(LinkError::Connect(
                "connection attempt cancelled".to_string(),
            )));
        }

        self.address = None;
        self.established = false;
        self.set_state(ConnectionState::Disconnected);

        if was_connected {
            self.callbacks.connection_changed(false);
            log::info!("Disconnected successfully");
        }
    }

    /// Write one command as a single message
    pub fn send(&mut self, command: Command) -> LinkResult<()> {
        self.send_text(&command.to_wire())
    }

    pub fn send_text(&mut self, text: &str) -> LinkResult<()> {
        let transport = match (&self.transport, self.state()) {
            (Some(transport), ConnectionState::Connected) => transport,
            _ => {
                let err = LinkError::NotConnected;
                self.callbacks.error(&err.to_string());
                return Err(err);
            }
        };

        log::debug!("Sending command: {}", text);
        transport.send(text).map_err(|e| {
            self.callbacks.error(&e.to_string());
            e
        })
    }

    /// Check the link can carry commands, reporting through `on_error` if not
    pub fn ensure_connected(&self) -> LinkResult<()> {
        if self.state().is_connected() {
            Ok(())
        } else {
            let err = LinkError::NotConnected;
            self.callbacks.error(&err.to_string());
            Err(err)
        }
    }

    pub fn handle(&mut self, event: ConnectionEvent) -> ConnectionOutput {
        match event {
            ConnectionEvent::Opened {
                generation,
                outcome,
            } => {
                if generation != self.generation {
                    // Dropping a stale handle closes its socket
                    return ConnectionOutput::Nothing;
                }
                let outcome = match (outcome, self.closed_while_opening.take()) {
                    (Ok(_dead), Some(reason)) => Err(LinkError::Connect(format!(
                        "connection closed during handshake: {}",
                        reason
                    ))),
                    (outcome, _) => outcome,
                };
                self.on_open_result(outcome)
            }
            ConnectionEvent::Transport { generation, event } => {
                if generation != self.generation {
                    return ConnectionOutput::Nothing;
                }
                self.on_transport_event(event)
            }
            ConnectionEvent::ReconnectDue { generation } => {
                if generation != self.generation || self.reconnect_timer.take().is_none() {
                    return ConnectionOutput::Nothing;
                }
                if let Some(address) = self.address {
                    log::info!(
                        "Attempting to reconnect ({}/{})...",
                        self.attempts,
                        self.policy.max_attempts
                    );
                    self.open(address);
                }
                ConnectionOutput::Nothing
            }
        }
    }

    fn on_open_result(&mut self, outcome: LinkResult<TransportHandle>) -> ConnectionOutput {
        match outcome {
            Ok(transport) => {
                if let Some(timer) = self.reconnect_timer.take() {
                    timer.cancel();
                }
                self.transport = Some(transport);
                self.attempts = 0;
                self.established = true;
                self.set_state(ConnectionState::Connected);
                self.callbacks.connection_changed(true);

                if let Some(reply) = self.pending_connect.take() {
                    let _ = reply.send(Ok(()));
                }

                ConnectionOutput::Opened
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);

                match self.pending_connect.take() {
                    Some(reply) => {
                        // Initial attempts are reported, never retried
                        self.address = None;
                        self.callbacks.error(&e.to_string());
                        let _ = reply.send(Err(e));
                    }
                    None => {
                        log::warn!("Reconnect attempt failed: {}", e);
                        self.schedule_reconnect();
                    }
                }

                ConnectionOutput::Nothing
            }
        }
    }

    fn on_transport_event(&mut self, event: TransportEvent) -> ConnectionOutput {
        match event {
            TransportEvent::Text(text) => ConnectionOutput::Text(text),
            TransportEvent::Binary(data) => ConnectionOutput::Binary(data),
            TransportEvent::Error(message) => {
                self.callbacks.error(&message);
                ConnectionOutput::Nothing
            }
            TransportEvent::Closed { reason } => {
                if self.transport.is_none() && self.state() == ConnectionState::Connecting {
                    let reason = reason.unwrap_or_else(|| "no reason given".to_string());
                    log::warn!("WebSocket closed before the open completed: {}", reason);
                    self.closed_while_opening = Some(reason);
                    return ConnectionOutput::Nothing;
                }

                log::info!(
                    "WebSocket closed: {}",
                    reason.as_deref().unwrap_or("no reason given")
                );

                let was_connected = self.state().is_connected();
                self.transport = None;
                self.set_state(ConnectionState::Disconnected);
                if was_connected {
                    self.callbacks.connection_changed(false);
                }

                self.schedule_reconnect();
                ConnectionOutput::Closed
            }
        }
    }

    fn schedule_reconnect(&mut self) -> bool {
        if !self.established || self.address.is_none() {
            return false;
        }

        if self.attempts >= self.policy.max_attempts {
            log::warn!(
                "Giving up after {} reconnect attempts",
                self.policy.max_attempts
            );
            self.address = None;
            self.established = false;
            self.callbacks.error(&format!(
                "Connection lost after {} reconnect attempts",
                self.policy.max_attempts
            ));
            return false;
        }

        self.attempts += 1;

        let timer = CancellationToken::new();
        let generation = self.generation;
        let delay = self.policy.delay;
        let events = self.events.clone();
        let cancelled = timer.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = events.send(ConnectionEvent::ReconnectDue { generation });
                }
            }
        });

        log::info!(
            "Reconnect {}/{} scheduled in {:?}",
            self.attempts,
            self.policy.max_attempts,
            delay
        );
        self.reconnect_timer = Some(timer);
        true
    }

    fn open(&mut self, address: DeviceAddress) {
        self.generation += 1;
        self.closed_while_opening = None;
        self.set_state(ConnectionState::Connecting);

        let generation = self.generation;
        let connector = Arc::clone(&self.connector);
        let events = self.events.clone();
        let timeout = self.policy.connect_timeout;
        let url = address.url();

        tokio::spawn(async move {
            let sink = EventSink::new(generation, events.clone());
            let outcome = match tokio::time::timeout(timeout, connector.open(&url, sink)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(LinkError::Connect(format!(
                    "timed out after {:?} connecting to {}",
                    timeout, url
                ))),
            };
            let _ = events.send(ConnectionEvent::Opened {
                generation,
                outcome,
            });
        });
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.cancel();
        }
    }
}
