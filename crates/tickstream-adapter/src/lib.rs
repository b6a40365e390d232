/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public tickstream adapter crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod error;
pub mod types;
pub mod ws;

pub use error::{Result, StreamError};

// Re-export all types
pub use types::*;

// Re-export commonly used types from ws
pub use ws::{
    Connector,
    FrameRouter,
    NORMAL_CLOSURE,
    RoutedFrame,
    SocketCommand,
    SocketEvent,
    SocketHandle,
    SocketPeer,
    SubscribeDirective,
    WsConnector,
};
