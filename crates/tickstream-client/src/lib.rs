/*
[INPUT]:  Public API exports for the tickstream-client crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod config;
pub mod direction;
pub mod events;
pub mod feed;
pub mod manager;
pub mod outbound;
pub mod reconnect;
pub mod subscription;
pub mod timer;

// Re-export main types for convenience
pub use config::ClientConfig;
pub use direction::{Observation, PriceDirectionTracker};
pub use events::{ConnectionSnapshot, ConnectionState, StreamEvent, StreamStatsSnapshot};
pub use feed::{SymbolFeed, SymbolFeedHub};
pub use manager::ConnectionManager;
pub use outbound::{DrainOutcome, FrameSink, OutboundQueue, QueuedMessage};
pub use reconnect::{ReconnectionPolicy, RetryLimit};
pub use subscription::SubscriptionRegistry;
pub use timer::RetryTimer;
