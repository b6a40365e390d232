/*
[INPUT]:  Wire schema definitions and serde requirements
[OUTPUT]: Typed Rust structs with serialization support
[POS]:    Data layer - raw ticks, directed ticks, market status
[UPDATE]: When the wire schema changes or new fields are added
*/

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::Direction;

/// One inbound price update for a single symbol, as delivered on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTick {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub change: Option<Decimal>,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub change_pct: Option<Decimal>,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub volume: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl RawTick {
    pub fn new(symbol: impl Into<String>, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            change: None,
            change_pct: None,
            volume: None,
            timestamp: None,
        }
    }
}

/// A tick annotated with its direction relative to the last accepted price.
///
/// Derived on the client, never transmitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectedTick {
    #[serde(flatten)]
    pub tick: RawTick,
    pub direction: Direction,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub previous_price: Option<Decimal>,
}

impl DirectedTick {
    pub fn symbol(&self) -> &str {
        &self.tick.symbol
    }

    pub fn price(&self) -> Decimal {
        self.tick.price
    }
}

/// Exchange session status; the latest value replaces the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketStatus {
    pub is_open: bool,
    pub current_time: String,
    pub timezone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
