/*
[INPUT]:  WebSocket URL, outbound text frames, close requests
[OUTPUT]: SocketHandle pairing an outbound command channel with ordered inbound events
[POS]:    WebSocket layer - transport seam and tokio-tungstenite pump
[UPDATE]: When changing connection logic, close handling, or transport trait
*/

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, info, warn};

use crate::error::{Result, StreamError};

/// Close code for a client-requested (clean) disconnect.
pub const NORMAL_CLOSURE: u16 = 1000;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Something that happened on the socket, in receipt order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Text(String),
    /// The socket closed; `None` means no close frame was received.
    Closed { code: Option<u16> },
    Error(String),
}

impl SocketEvent {
    pub fn is_clean_close(&self) -> bool {
        matches!(self, SocketEvent::Closed { code: Some(NORMAL_CLOSURE) })
    }
}

/// Instruction for the transport side of a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketCommand {
    Send(String),
    Close { code: u16, reason: String },
}

/// Client side of one live socket.
#[derive(Debug)]
pub struct SocketHandle {
    outbound: mpsc::UnboundedSender<SocketCommand>,
    inbound: mpsc::UnboundedReceiver<SocketEvent>,
}

/// Transport side of one live socket: receives commands, emits events.
#[derive(Debug)]
pub struct SocketPeer {
    pub commands: mpsc::UnboundedReceiver<SocketCommand>,
    pub events: mpsc::UnboundedSender<SocketEvent>,
}

impl SocketHandle {
    /// Create a connected handle/peer pair.
    pub fn pair() -> (SocketHandle, SocketPeer) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        (
            SocketHandle {
                outbound: outbound_tx,
                inbound: inbound_rx,
            },
            SocketPeer {
                commands: outbound_rx,
                events: inbound_tx,
            },
        )
    }

    /// Whether the transport side is still accepting commands.
    pub fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }

    pub fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.outbound
            .send(SocketCommand::Send(text.into()))
            .map_err(|_| StreamError::NotConnected)
    }

    /// Request a close with the given code. Best effort: a dead transport is already closed.
    pub fn close(&self, code: u16, reason: impl Into<String>) {
        let _ = self.outbound.send(SocketCommand::Close {
            code,
            reason: reason.into(),
        });
    }

    /// Next socket event; `None` once the transport has gone away.
    pub async fn next_event(&mut self) -> Option<SocketEvent> {
        self.inbound.recv().await
    }
}

/// Opens sockets. One call, one socket.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<SocketHandle>;
}

/// tokio-tungstenite backed connector.
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new() -> Self {
        Self::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn with_connect_timeout(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<SocketHandle> {
        info!(ws_url = %url, "Connecting to market WebSocket");
        let (ws_stream, _response) = tokio::time::timeout(self.connect_timeout, connect_async(url))
            .await
            .map_err(|_| StreamError::Timeout {
                duration_ms: self.connect_timeout.as_millis() as u64,
            })??;

        let (handle, peer) = SocketHandle::pair();
        tokio::spawn(pump(ws_stream, peer));
        Ok(handle)
    }
}

async fn pump<S>(ws_stream: tokio_tungstenite::WebSocketStream<S>, mut peer: SocketPeer)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            command = peer.commands.recv() => {
                match command {
                    Some(SocketCommand::Send(text)) => {
                        if let Err(err) = write.send(WsMessage::Text(text.into())).await {
                            let _ = peer.events.send(SocketEvent::Error(err.to_string()));
                            break;
                        }
                    }
                    Some(SocketCommand::Close { code, reason }) => {
                        let frame = CloseFrame {
                            code: CloseCode::from(code),
                            reason: reason.into(),
                        };
                        let _ = write.send(WsMessage::Close(Some(frame))).await;
                        let _ = peer.events.send(SocketEvent::Closed { code: Some(code) });
                        break;
                    }
                    None => {
                        let _ = write.send(WsMessage::Close(None)).await;
                        break;
                    }
                }
            }
            incoming = read.next() => {
                match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        if peer.events.send(SocketEvent::Text(text.to_string())).is_err() {
                            let _ = write.send(WsMessage::Close(None)).await;
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => {
                            if peer.events.send(SocketEvent::Text(text)).is_err() {
                                break;
                            }
                        }
                        Err(_) => debug!(bytes = bytes.len(), "Dropping non-UTF-8 binary frame"),
                    },
                    Some(Ok(WsMessage::Close(frame))) => {
                        let code = frame.map(|frame| u16::from(frame.code));
                        debug!(?code, "WebSocket close frame received");
                        let _ = write.close().await;
                        let _ = peer.events.send(SocketEvent::Closed { code });
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(error = %err, "WebSocket read failed");
                        let _ = peer.events.send(SocketEvent::Error(err.to_string()));
                        break;
                    }
                    None => {
                        let _ = peer.events.send(SocketEvent::Closed { code: None });
                        break;
                    }
                }
            }
        }
    }
}
