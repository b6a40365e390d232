/*
[INPUT]:  Connection worker transitions, routed frames, counters
[OUTPUT]: Listener-facing events, connection snapshots, stream statistics
[POS]:    Connection layer - observable surface of the connection manager
[UPDATE]: When adding listener notifications or snapshot fields
*/

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tickstream_adapter::{DirectedTick, MarketStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Current connection state plus retry progress, for "reconnecting (n/max)" displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    pub attempt: u32,
    /// `None` when retries are unbounded.
    pub max_attempts: Option<u32>,
    pub reason: Option<String>,
}

impl ConnectionSnapshot {
    pub fn disconnected(max_attempts: Option<u32>) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempt: 0,
            max_attempts,
            reason: None,
        }
    }

    /// Whether the client has stopped retrying on its own.
    pub fn is_terminal_failure(&self) -> bool {
        self.state == ConnectionState::Error
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    StateChanged(ConnectionSnapshot),
    Tick(DirectedTick),
    MarketStatus(MarketStatus),
    /// A reconnect was scheduled; `attempt` is the 1-based retry number.
    RetryScheduled { attempt: u32, delay: Duration },
    /// Retries are exhausted. Terminal until `connect` is called again.
    GaveUp { attempts: u32 },
}

#[derive(Debug, Default)]
pub struct StreamStats {
    frames_received: AtomicU64,
    ticks_emitted: AtomicU64,
    frames_unrecognized: AtomicU64,
    queue_dropped: AtomicU64,
    connections_opened: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStatsSnapshot {
    pub frames_received: u64,
    pub ticks_emitted: u64,
    pub frames_unrecognized: u64,
    pub queue_dropped: u64,
    pub connections_opened: u64,
}

impl StreamStats {
    pub(crate) fn record_frame(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_tick(&self) {
        self.ticks_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unrecognized(&self) {
        self.frames_unrecognized.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_queue_drop(&self) {
        self.queue_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_connection(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StreamStatsSnapshot {
        StreamStatsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            ticks_emitted: self.ticks_emitted.load(Ordering::Relaxed),
            frames_unrecognized: self.frames_unrecognized.load(Ordering::Relaxed),
            queue_dropped: self.queue_dropped.load(Ordering::Relaxed),
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
        }
    }
}
