/*
[INPUT]:  Desired symbol set
[OUTPUT]: Outbound control frames in their JSON wire form
[POS]:    WebSocket layer - outbound message construction
[UPDATE]: When adding new control actions or changing format
*/

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const SUBSCRIBE_ACTION: &str = "subscribe";

/// Control message telling the server which symbols to stream.
///
/// Replaces the server-side set wholesale; there is no incremental form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeDirective {
    pub action: String,
    pub symbols: Vec<String>,
}

impl SubscribeDirective {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            action: SUBSCRIBE_ACTION.to_string(),
            symbols: symbols.into_iter().map(Into::into).collect(),
        }
    }

    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
