// Message transport for the device socket
//
// A `Connector` opens one duplex message channel. Once open, inbound traffic
// is pushed into the link's event channel through an `EventSink` tagged with
// the connection generation, and outbound text goes through the returned
// `TransportHandle`. Dropping or closing the handle tears the socket down.

use crate::link::connection::ConnectionEvent;
use crate::link::types::{LinkError, LinkResult};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Traffic observed on an open transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A complete text message
    Text(String),
    /// A binary message, treated as an arbitrary chunk of the byte stream
    Binary(Vec<u8>),
    /// Transport-level failure; does not by itself end the connection
    Error(String),
    /// The peer or the network closed the connection
    Closed { reason: Option<String> },
}

/// Delivers transport events for one connection generation
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<ConnectionEvent>,
}

impl EventSink {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<ConnectionEvent>) -> Self {
        Self { generation, tx }
    }

    /// Returns false once the link has gone away
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx
            .send(ConnectionEvent::Transport {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// Outbound side of an open transport
#[derive(Debug)]
pub struct TransportHandle {
    outbound: mpsc::UnboundedSender<String>,
    close: CancellationToken,
}

impl TransportHandle {
    pub fn new(outbound: mpsc::UnboundedSender<String>, close: CancellationToken) -> Self {
        Self { outbound, close }
    }

    /// Queue one text message
    pub fn send(&self, text: &str) -> LinkResult<()> {
        self.outbound
            .send(text.to_string())
            .map_err(|_| LinkError::Send("transport is closed".to_string()))
    }

    pub fn close(&self) {
        self.close.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.close.is_cancelled() || self.outbound.is_closed()
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        self.close.cancel();
    }
}

/// Opens transports to a device URL
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection and start forwarding its traffic into `events`
    ///
    /// Resolves only once the transport reports itself open.
    async fn open(&self, url: &str, events: EventSink) -> LinkResult<TransportHandle>;
}

/// WebSocket transport built on tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, url: &str, events: EventSink) -> LinkResult<TransportHandle> {
        log::info!("Connecting to WebSocket: {}", url);

        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| LinkError::Connect(format!("Error connecting to WebSocket: {}", e)))?;

        log::info!("WebSocket connection successful");

        let (write, read) = ws_stream.split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
        let close = CancellationToken::new();

        tokio::spawn(write_task(write, outbound_rx, events.clone(), close.clone()));
        tokio::spawn(read_task(read, events, close.clone()));

        Ok(TransportHandle::new(outbound_tx, close))
    }
}

/// WebSocket write task
async fn write_task(
    mut write: futures_util::stream::SplitSink<WsStream, Message>,
    mut rx: mpsc::UnboundedReceiver<String>,
    events: EventSink,
    close: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            _ = close.cancelled() => {
                if let Err(e) = write.send(Message::Close(None)).await {
                    log::debug!("Close frame not delivered: {}", e);
                }
                break;
            }

            command = rx.recv() => {
                let Some(command) = command else { break };
                log::debug!("Sending command: {}", command);
                if let Err(e) = write.send(Message::Text(command.into())).await {
                    events.emit(TransportEvent::Error(
                        LinkError::Send(e.to_string()).to_string(),
                    ));
                    break;
                }
            }
        }
    }

    log::debug!("WebSocket write task ended");
}

/// WebSocket read task
async fn read_task(
    mut read: futures_util::stream::SplitStream<WsStream>,
    events: EventSink,
    close: CancellationToken,
) {
    let reason = loop {
        let message = tokio::select! {
            biased;

            _ = close.cancelled() => {
                log::debug!("WebSocket read task cancelled");
                return;
            }

            message = read.next() => message,
        };

        match message {
            Some(Ok(Message::Text(text))) => {
                if !events.emit(TransportEvent::Text(text.as_str().to_string())) {
                    return;
                }
            }
            Some(Ok(Message::Binary(data))) => {
                if !events.emit(TransportEvent::Binary(data.to_vec())) {
                    return;
                }
            }
            Some(Ok(Message::Close(frame))) => {
                break frame.map(|f| format!("{} {}", f.code, f.reason));
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {
                // Control frames are answered by tungstenite
            }
            Some(Err(e)) => {
                events.emit(TransportEvent::Error(
                    LinkError::WebSocket(e.to_string()).to_string(),
                ));
                break Some(e.to_string());
            }
            None => break None,
        }
    };

    log::info!("WebSocket closed: {}", reason.as_deref().unwrap_or("no reason"));
    close.cancel();
    events.emit(TransportEvent::Closed { reason });
}
