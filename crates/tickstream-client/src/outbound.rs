/*
[INPUT]:  Outbound payloads issued while the socket is not open
[OUTPUT]: FIFO replay of queued payloads once a socket opens
[POS]:    Connection layer - offline send buffer
[UPDATE]: When changing queue capacity or overflow policy
*/

use std::collections::VecDeque;

use tickstream_adapter::{Result, SocketHandle};
use tracing::warn;

/// Anything that can transmit a text frame right now.
pub trait FrameSink {
    fn send_frame(&self, payload: &str) -> Result<()>;
}

impl FrameSink for SocketHandle {
    fn send_frame(&self, payload: &str) -> Result<()> {
        self.send_text(payload)
    }
}

/// An opaque payload plus its enqueue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub seq: u64,
    pub payload: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainOutcome {
    pub sent: usize,
    pub remaining: usize,
}

/// FIFO buffer, optionally bounded; on overflow the oldest message is dropped.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    messages: VecDeque<QueuedMessage>,
    capacity: Option<usize>,
    next_seq: u64,
    dropped: u64,
}

impl OutboundQueue {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn bounded(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            ..Self::default()
        }
    }

    /// Append a payload. Returns the evicted message if the queue was full.
    pub fn enqueue(&mut self, payload: impl Into<String>) -> Option<QueuedMessage> {
        let evicted = match self.capacity {
            Some(capacity) if self.messages.len() >= capacity => {
                let evicted = self.messages.pop_front();
                if let Some(message) = &evicted {
                    self.dropped += 1;
                    warn!(
                        seq = message.seq,
                        capacity,
                        dropped_total = self.dropped,
                        "Outbound queue full; dropping oldest message"
                    );
                }
                evicted
            }
            _ => None,
        };

        self.messages.push_back(QueuedMessage {
            seq: self.next_seq,
            payload: payload.into(),
        });
        self.next_seq += 1;
        evicted
    }

    /// Send queued messages in order, stopping at the first send the sink rejects.
    pub fn drain_into<S: FrameSink + ?Sized>(&mut self, sink: &S) -> DrainOutcome {
        let mut sent = 0;
        while let Some(message) = self.messages.pop_front() {
            if sink.send_frame(&message.payload).is_err() {
                self.messages.push_front(message);
                break;
            }
            sent += 1;
        }
        DrainOutcome {
            sent,
            remaining: self.messages.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedMessage> {
        self.messages.iter()
    }
}
