/*
[INPUT]:  Raw inbound WebSocket frames (text or pre-parsed JSON)
[OUTPUT]: RoutedFrame variants: market status, price tick, or unrecognized
[POS]:    WebSocket layer - inbound message classification
[UPDATE]: When adding new inbound frame kinds or changing discriminators
*/

use serde_json::Value;
use tracing::{debug, info};

use crate::types::{MarketStatus, RawTick};

pub const MARKET_STATUS_TYPE: &str = "market_status";

const UNRECOGNIZED_LOG_LIMIT: usize = 3;
const PARSE_FAIL_LOG_LIMIT: usize = 3;
const RAW_LOG_MAX_BYTES: usize = 1024;

/// Closed set of inbound payload kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutedFrame {
    MarketStatus(MarketStatus),
    PriceTick(RawTick),
    Unrecognized,
}

impl RoutedFrame {
    pub fn kind(&self) -> &'static str {
        match self {
            RoutedFrame::MarketStatus(_) => "market_status",
            RoutedFrame::PriceTick(_) => "price_tick",
            RoutedFrame::Unrecognized => "unrecognized",
        }
    }
}

/// Classifies inbound frames. Never fails: anything malformed becomes `Unrecognized`.
#[derive(Debug, Default)]
pub struct FrameRouter {
    unrecognized: usize,
    parse_failed: usize,
}

impl FrameRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a raw text frame.
    pub fn route(&mut self, raw: &str) -> RoutedFrame {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => self.route_value(value),
            Err(err) => {
                self.parse_failed += 1;
                log_parse_fail(self.parse_failed, &err.to_string(), raw);
                RoutedFrame::Unrecognized
            }
        }
    }

    /// Route an already-parsed JSON frame.
    pub fn route_value(&mut self, value: Value) -> RoutedFrame {
        if value.get("type").and_then(Value::as_str) == Some(MARKET_STATUS_TYPE) {
            return match serde_json::from_value::<MarketStatus>(value) {
                Ok(status) => RoutedFrame::MarketStatus(status),
                Err(err) => {
                    self.parse_failed += 1;
                    log_parse_fail(self.parse_failed, &err.to_string(), MARKET_STATUS_TYPE);
                    RoutedFrame::Unrecognized
                }
            };
        }

        if value.get("symbol").is_some() && value.get("price").is_some() {
            return match serde_json::from_value::<RawTick>(value) {
                Ok(mut tick) => {
                    tick.symbol = tick.symbol.trim().to_ascii_uppercase();
                    if tick.symbol.is_empty() {
                        self.note_unrecognized("price tick with empty symbol");
                        return RoutedFrame::Unrecognized;
                    }
                    RoutedFrame::PriceTick(tick)
                }
                Err(err) => {
                    self.parse_failed += 1;
                    log_parse_fail(self.parse_failed, &err.to_string(), "price tick");
                    RoutedFrame::Unrecognized
                }
            };
        }

        self.note_unrecognized(&value.to_string());
        RoutedFrame::Unrecognized
    }

    /// Frames that were valid JSON but matched no known shape.
    pub fn unrecognized_count(&self) -> usize {
        self.unrecognized
    }

    /// Frames that failed to decode.
    pub fn parse_failed_count(&self) -> usize {
        self.parse_failed
    }

    fn note_unrecognized(&mut self, raw: &str) {
        self.unrecognized += 1;
        let count = self.unrecognized;
        if count > UNRECOGNIZED_LOG_LIMIT {
            return;
        }
        info!(
            sample_index = count,
            sample_limit = UNRECOGNIZED_LOG_LIMIT,
            bytes = raw.len(),
            "ws frame unrecognized"
        );
        let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
        debug!(
            sample_index = count,
            sample_limit = UNRECOGNIZED_LOG_LIMIT,
            message = %preview,
            "ws frame unrecognized"
        );
    }
}

fn log_parse_fail(count: usize, err: &str, raw: &str) {
    if count > PARSE_FAIL_LOG_LIMIT {
        return;
    }
    info!(
        sample_index = count,
        sample_limit = PARSE_FAIL_LOG_LIMIT,
        error = %err,
        bytes = raw.len(),
        "ws frame parse failed"
    );
    let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
    debug!(
        sample_index = count,
        sample_limit = PARSE_FAIL_LOG_LIMIT,
        error = %err,
        message = %preview,
        "ws frame parse failed"
    );
}

pub(crate) fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + 3);
    out.push_str(&value[..end]);
    out.push_str("...");
    out
}
