/*
[INPUT]:  ClientConfig, a socket Connector, caller commands (connect/disconnect/send/set_symbols)
[OUTPUT]: Connection state, directed ticks, market status and retry notifications for listeners
[POS]:    Connection layer - single-socket state machine with reconnection
[UPDATE]: When changing state transitions, retry rules, or the listener surface
*/

use std::future::{Future, pending};
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tickstream_adapter::{
    Connector, FrameRouter, MarketStatus, NORMAL_CLOSURE, Result, RoutedFrame, SocketEvent,
    SocketHandle, StreamError, WsConnector,
};

use crate::config::ClientConfig;
use crate::direction::PriceDirectionTracker;
use crate::events::{
    ConnectionSnapshot, ConnectionState, StreamEvent, StreamStats, StreamStatsSnapshot,
};
use crate::outbound::OutboundQueue;
use crate::reconnect::ReconnectionPolicy;
use crate::subscription::SubscriptionRegistry;
use crate::timer::RetryTimer;

const DIRECTIVE_LOG_LIMIT: u64 = 5;
const MANUAL_DISCONNECT_REASON: &str = "manual disconnect";

type PendingConnect = Pin<Box<dyn Future<Output = Result<SocketHandle>> + Send>>;

#[derive(Debug)]
enum ManagerCommand {
    Connect,
    Disconnect,
    Send(String),
    SetSymbols(Vec<String>),
    Shutdown,
}

/// Handle to the connection worker.
///
/// Every operation is non-blocking: it enqueues a command for the worker task and returns.
/// Outcomes are observed through [`ConnectionManager::subscribe_events`] and
/// [`ConnectionManager::subscribe_state`]. Dropping the last handle stops the worker and
/// closes the socket cleanly.
#[derive(Debug)]
pub struct ConnectionManager {
    cmd_tx: mpsc::UnboundedSender<ManagerCommand>,
    events: broadcast::Sender<StreamEvent>,
    state_rx: watch::Receiver<ConnectionSnapshot>,
    market_status_rx: watch::Receiver<Option<MarketStatus>>,
    stats: Arc<StreamStats>,
    worker: JoinHandle<()>,
}

impl ConnectionManager {
    /// Create a manager backed by the tokio-tungstenite connector.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let connector = WsConnector::with_connect_timeout(config.connect_timeout());
        Self::with_connector(config, Arc::new(connector))
    }

    /// Create a manager with a custom socket connector.
    pub fn with_connector(config: &ClientConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        config.validate()?;
        let policy = config.reconnection_policy()?;

        tokio::runtime::Handle::try_current()
            .map_err(|err| StreamError::Runtime(err.to_string()))?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.event_buffer);
        let (snapshot_tx, state_rx) = watch::channel(ConnectionSnapshot::disconnected(
            policy.limit().max_attempts(),
        ));
        let (market_status_tx, market_status_rx) = watch::channel(None);
        let stats = Arc::new(StreamStats::default());

        let queue = match config.queue_limit() {
            Some(capacity) => OutboundQueue::bounded(capacity),
            None => OutboundQueue::unbounded(),
        };

        let worker = ConnectionWorker {
            url: config.url.clone(),
            connector,
            policy,
            auto_reconnect: config.auto_reconnect,
            registry: SubscriptionRegistry::with_symbols(&config.symbols),
            queue,
            tracker: PriceDirectionTracker::new(),
            router: FrameRouter::new(),
            retry_timer: RetryTimer::new(),
            attempt: 0,
            state: ConnectionState::Disconnected,
            socket: None,
            connecting: None,
            directives_sent: 0,
            cmd_rx,
            events: events.clone(),
            snapshot_tx,
            market_status_tx,
            stats: Arc::clone(&stats),
        };

        let worker = tokio::spawn(worker.run());

        Ok(Self {
            cmd_tx,
            events,
            state_rx,
            market_status_rx,
            stats,
            worker,
        })
    }

    /// Start connecting. No-op while already connecting or connected.
    pub fn connect(&self) -> Result<()> {
        self.command(ManagerCommand::Connect)
    }

    /// Close the socket with a normal closure and cancel any pending retry.
    ///
    /// Terminal until [`ConnectionManager::connect`] is called again.
    pub fn disconnect(&self) -> Result<()> {
        self.command(ManagerCommand::Disconnect)
    }

    /// Transmit now if connected, otherwise queue for the next connection.
    pub fn send(&self, payload: impl Into<String>) -> Result<()> {
        self.command(ManagerCommand::Send(payload.into()))
    }

    pub fn send_json<T: Serialize>(&self, value: &T) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        self.send(payload)
    }

    /// Replace the subscription set. Sends a fresh directive right away when connected.
    pub fn set_symbols<I, S>(&self, symbols: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let symbols = symbols.into_iter().map(Into::into).collect();
        self.command(ManagerCommand::SetSymbols(symbols))
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<StreamEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.state_rx.clone()
    }

    pub fn state(&self) -> ConnectionSnapshot {
        self.state_rx.borrow().clone()
    }

    /// Latest market status; `None` before the first status frame and after `disconnect`.
    pub fn market_status(&self) -> Option<MarketStatus> {
        self.market_status_rx.borrow().clone()
    }

    pub fn subscribe_market_status(&self) -> watch::Receiver<Option<MarketStatus>> {
        self.market_status_rx.clone()
    }

    pub fn stats(&self) -> StreamStatsSnapshot {
        self.stats.snapshot()
    }

    /// Disconnect and wait for the worker to exit.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.cmd_tx.send(ManagerCommand::Shutdown);
        self.worker
            .await
            .map_err(|err| StreamError::Runtime(err.to_string()))
    }

    fn command(&self, command: ManagerCommand) -> Result<()> {
        self.cmd_tx
            .send(command)
            .map_err(|_| StreamError::ClientClosed)
    }
}

/// Owns the socket, attempt counter, queue, registry and tracker. Runs on one task,
/// so every socket event and command is handled sequentially in arrival order.
struct ConnectionWorker {
    url: String,
    connector: Arc<dyn Connector>,
    policy: ReconnectionPolicy,
    auto_reconnect: bool,
    registry: SubscriptionRegistry,
    queue: OutboundQueue,
    tracker: PriceDirectionTracker,
    router: FrameRouter,
    retry_timer: RetryTimer,
    attempt: u32,
    state: ConnectionState,
    socket: Option<SocketHandle>,
    connecting: Option<PendingConnect>,
    directives_sent: u64,
    cmd_rx: mpsc::UnboundedReceiver<ManagerCommand>,
    events: broadcast::Sender<StreamEvent>,
    snapshot_tx: watch::Sender<ConnectionSnapshot>,
    market_status_tx: watch::Sender<Option<MarketStatus>>,
    stats: Arc<StreamStats>,
}

impl ConnectionWorker {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(ManagerCommand::Connect) => self.connect(true),
                        Some(ManagerCommand::Disconnect) => self.disconnect(),
                        Some(ManagerCommand::Send(payload)) => self.send(payload),
                        Some(ManagerCommand::SetSymbols(symbols)) => self.set_symbols(symbols),
                        Some(ManagerCommand::Shutdown) | None => {
                            self.disconnect();
                            debug!("Connection worker stopped");
                            break;
                        }
                    }
                }
                outcome = connect_outcome(&mut self.connecting), if self.connecting.is_some() => {
                    self.connecting = None;
                    match outcome {
                        Ok(socket) => self.on_open(socket),
                        Err(err) => self.on_abnormal_close(format!("connect failed: {err}")),
                    }
                }
                event = next_socket_event(&mut self.socket), if self.socket.is_some() => {
                    self.on_socket_event(event);
                }
                _ = self.retry_timer.fired(), if self.retry_timer.is_armed() => {
                    debug!(attempt = self.attempt, "Retry timer fired");
                    self.connect(false);
                }
            }
        }
    }

    /// `explicit` distinguishes a caller's `connect()` from a retry timer firing.
    fn connect(&mut self, explicit: bool) {
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            debug!(state = ?self.state, "Connect ignored; already active");
            return;
        }

        if explicit {
            self.retry_timer.cancel();
            if self.state == ConnectionState::Error {
                self.attempt = 0;
            }
        }

        info!(url = %self.url, attempt = self.attempt, "Connecting");
        let connector = Arc::clone(&self.connector);
        let url = self.url.clone();
        self.connecting = Some(Box::pin(async move { connector.connect(&url).await }));
        self.set_state(ConnectionState::Connecting, None);
    }

    fn on_open(&mut self, socket: SocketHandle) {
        self.attempt = 0;
        self.stats.record_connection();

        let drained = self.queue.drain_into(&socket);
        self.socket = Some(socket);
        self.set_state(ConnectionState::Connected, None);
        info!(
            url = %self.url,
            flushed = drained.sent,
            still_queued = drained.remaining,
            "Connected"
        );

        self.registry.clear_sent();
        self.send_directive();
    }

    fn on_socket_event(&mut self, event: Option<SocketEvent>) {
        match event {
            Some(SocketEvent::Text(raw)) => self.on_frame(&raw),
            Some(event @ SocketEvent::Closed { .. }) if event.is_clean_close() => {
                info!("Server closed the connection normally; not reconnecting");
                self.drop_socket();
                self.set_state(
                    ConnectionState::Disconnected,
                    Some("closed by server".to_string()),
                );
            }
            Some(SocketEvent::Closed { code }) => {
                let reason = match code {
                    Some(code) => format!("closed with code {code}"),
                    None => "closed without close frame".to_string(),
                };
                self.on_abnormal_close(reason);
            }
            Some(SocketEvent::Error(err)) => self.on_abnormal_close(format!("socket error: {err}")),
            None => self.on_abnormal_close("transport ended".to_string()),
        }
    }

    fn on_frame(&mut self, raw: &str) {
        self.stats.record_frame();
        match self.router.route(raw) {
            RoutedFrame::MarketStatus(status) => {
                debug!(is_open = status.is_open, timezone = %status.timezone, "Market status updated");
                self.market_status_tx.send_replace(Some(status.clone()));
                self.emit(StreamEvent::MarketStatus(status));
            }
            RoutedFrame::PriceTick(tick) => {
                let tick = self.tracker.apply(tick);
                debug!(
                    symbol = %tick.symbol(),
                    price = %tick.price(),
                    direction = tick.direction.as_str(),
                    "Tick"
                );
                self.stats.record_tick();
                self.emit(StreamEvent::Tick(tick));
            }
            RoutedFrame::Unrecognized => self.stats.record_unrecognized(),
        }
    }

    /// Retry rule for any non-manual loss of the socket or a failed connect.
    fn on_abnormal_close(&mut self, reason: String) {
        self.drop_socket();

        if !self.auto_reconnect {
            warn!(%reason, "Connection lost; auto-reconnect disabled");
            self.set_state(ConnectionState::Disconnected, Some(reason));
            return;
        }

        if !self.policy.should_retry(self.attempt) {
            warn!(
                attempts = self.attempt,
                %reason,
                "Reconnect attempts exhausted; giving up"
            );
            let attempts = self.attempt;
            self.set_state(ConnectionState::Error, Some(reason));
            self.emit(StreamEvent::GaveUp { attempts });
            return;
        }

        let delay = self.policy.delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        self.retry_timer.cancel();
        self.retry_timer.arm(delay);

        warn!(
            attempt = self.attempt,
            max_attempts = ?self.policy.limit().max_attempts(),
            ?delay,
            %reason,
            "Connection lost; reconnect scheduled"
        );
        self.set_state(ConnectionState::Disconnected, Some(reason));
        self.emit(StreamEvent::RetryScheduled {
            attempt: self.attempt,
            delay,
        });
    }

    fn disconnect(&mut self) {
        let had_retry = self.retry_timer.cancel();
        let was_connecting = self.connecting.take().is_some();

        if let Some(socket) = self.socket.take() {
            socket.close(NORMAL_CLOSURE, MANUAL_DISCONNECT_REASON);
        }

        self.attempt = 0;
        self.registry.clear_sent();
        self.tracker.clear();
        self.market_status_tx.send_replace(None);

        if self.state != ConnectionState::Disconnected || had_retry || was_connecting {
            info!(had_retry, was_connecting, "Disconnected");
        }
        self.set_state(
            ConnectionState::Disconnected,
            Some(MANUAL_DISCONNECT_REASON.to_string()),
        );
    }

    fn send(&mut self, payload: String) {
        if self.state == ConnectionState::Connected
            && let Some(socket) = &self.socket
        {
            match socket.send_text(payload.clone()) {
                Ok(()) => return,
                Err(err) => debug!(error = %err, "Send failed on live socket; queueing"),
            }
        }

        if self.queue.enqueue(payload).is_some() {
            self.stats.record_queue_drop();
        }
        debug!(queued = self.queue.len(), "Message queued until connected");
    }

    fn set_symbols(&mut self, symbols: Vec<String>) {
        let changed = self.registry.set_symbols(&symbols);
        debug!(changed, symbols = ?self.registry.current(), "Subscription set updated");

        if self.state == ConnectionState::Connected && self.registry.needs_directive() {
            self.send_directive();
        }
    }

    fn send_directive(&mut self) {
        let Some(socket) = &self.socket else {
            return;
        };

        let directive = self.registry.build_directive();
        let text = match directive.to_text() {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "Failed to encode subscribe directive");
                return;
            }
        };

        match socket.send_text(text) {
            Ok(()) => {
                self.registry.mark_sent();
                self.directives_sent += 1;
                if self.directives_sent <= DIRECTIVE_LOG_LIMIT {
                    info!(symbols = ?directive.symbols, "Subscribe directive sent");
                } else {
                    debug!(symbols = ?directive.symbols, "Subscribe directive sent");
                }
            }
            Err(err) => warn!(error = %err, "Failed to send subscribe directive"),
        }
    }

    fn drop_socket(&mut self) {
        self.socket = None;
        self.connecting = None;
        self.registry.clear_sent();
    }

    fn set_state(&mut self, state: ConnectionState, reason: Option<String>) {
        self.state = state;
        let snapshot = ConnectionSnapshot {
            state,
            attempt: self.attempt,
            max_attempts: self.policy.limit().max_attempts(),
            reason,
        };
        self.snapshot_tx.send_replace(snapshot.clone());
        self.emit(StreamEvent::StateChanged(snapshot));
    }

    fn emit(&self, event: StreamEvent) {
        let _ = self.events.send(event);
    }
}

async fn connect_outcome(connecting: &mut Option<PendingConnect>) -> Result<SocketHandle> {
    match connecting.as_mut() {
        Some(future) => future.as_mut().await,
        None => pending().await,
    }
}

async fn next_socket_event(socket: &mut Option<SocketHandle>) -> Option<SocketEvent> {
    match socket.as_mut() {
        Some(socket) => socket.next_event().await,
        None => pending().await,
    }
}
