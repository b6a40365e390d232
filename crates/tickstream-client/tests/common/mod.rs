/*
[INPUT]:  Connection scripts and local server requirements
[OUTPUT]: Scripted connector, loopback WebSocket server, event wait helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for tickstream-client tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;

use tickstream_adapter::{
    Connector, Result, SocketCommand, SocketHandle, SocketPeer, StreamError, SubscribeDirective,
};
use tickstream_client::{ClientConfig, ConnectionSnapshot, StreamEvent};

pub const WAIT: Duration = Duration::from_secs(5);
pub const TEST_URL: &str = "ws://127.0.0.1:9/stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Accept,
    Refuse,
}

/// Connector that follows a script of outcomes; refuses once the script runs out.
/// Accepted sockets hand their transport side to the test.
pub struct ScriptedConnector {
    plan: Mutex<VecDeque<ConnectOutcome>>,
    calls: AtomicUsize,
    peers: mpsc::UnboundedSender<SocketPeer>,
}

impl ScriptedConnector {
    pub fn new(
        plan: impl IntoIterator<Item = ConnectOutcome>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<SocketPeer>) {
        let (peers, peers_rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            plan: Mutex::new(plan.into_iter().collect()),
            calls: AtomicUsize::new(0),
            peers,
        });
        (connector, peers_rx)
    }

    pub fn push(&self, outcome: ConnectOutcome) {
        self.plan.lock().unwrap().push_back(outcome);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, _url: &str) -> Result<SocketHandle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .plan
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ConnectOutcome::Refuse);

        match outcome {
            ConnectOutcome::Accept => {
                let (handle, peer) = SocketHandle::pair();
                let _ = self.peers.send(peer);
                Ok(handle)
            }
            ConnectOutcome::Refuse => Err(StreamError::WebSocket("connection refused".to_string())),
        }
    }
}

/// Fast, deterministic retry settings: 1s base, no jitter.
pub fn test_config(symbols: &[&str]) -> ClientConfig {
    let mut config = ClientConfig::new(TEST_URL);
    config.base_delay_ms = 1_000;
    config.max_delay_ms = 8_000;
    config.jitter_ms = 0;
    config.symbols = symbols.iter().map(|symbol| symbol.to_string()).collect();
    config
}

pub fn directive(symbols: &[&str]) -> SocketCommand {
    SocketCommand::Send(
        SubscribeDirective::new(symbols.iter().copied())
            .to_text()
            .unwrap(),
    )
}

pub fn text(payload: &str) -> SocketCommand {
    SocketCommand::Send(payload.to_string())
}

pub async fn next_peer(peers: &mut mpsc::UnboundedReceiver<SocketPeer>) -> SocketPeer {
    timeout(WAIT, peers.recv())
        .await
        .expect("timed out waiting for a connection")
        .expect("connector dropped")
}

pub async fn next_command(peer: &mut SocketPeer) -> SocketCommand {
    timeout(WAIT, peer.commands.recv())
        .await
        .expect("timed out waiting for an outbound command")
        .expect("socket handle dropped")
}

/// Wait for the first event matching `pred`, skipping others.
pub async fn wait_for_event<F>(events: &mut broadcast::Receiver<StreamEvent>, mut pred: F) -> StreamEvent
where
    F: FnMut(&StreamEvent) -> bool,
{
    timeout(WAIT, async {
        loop {
            let event = events.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

pub async fn wait_for_state<F>(state: &mut watch::Receiver<ConnectionSnapshot>, pred: F) -> ConnectionSnapshot
where
    F: FnMut(&ConnectionSnapshot) -> bool,
{
    timeout(WAIT, state.wait_for(pred))
        .await
        .expect("timed out waiting for state")
        .expect("state channel closed")
        .clone()
}

/// Start a loopback WebSocket server; every accepted socket is handed to the test.
pub async fn spawn_ws_server() -> (String, mpsc::UnboundedReceiver<WebSocketStream<TcpStream>>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback listener");
    let addr = listener.local_addr().expect("listener address");
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            if let Ok(ws) = tokio_tungstenite::accept_async(stream).await
                && tx.send(ws).is_err()
            {
                break;
            }
        }
    });

    (format!("ws://{addr}"), rx)
}
