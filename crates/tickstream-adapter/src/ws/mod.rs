/*
[INPUT]:  WebSocket URL, outbound frames, raw inbound frames
[OUTPUT]: Socket handles, routed inbound payloads, subscribe directives
[POS]:    WebSocket layer - transport seam and frame classification
[UPDATE]: When adding new frame kinds or changing connection logic
*/

pub mod client;
pub mod message;
pub mod router;

pub use client::{
    Connector, NORMAL_CLOSURE, SocketCommand, SocketEvent, SocketHandle, SocketPeer, WsConnector,
};
pub use message::SubscribeDirective;
pub use router::{FrameRouter, RoutedFrame};
