/*
[INPUT]:  Raw ticks in socket arrival order
[OUTPUT]: Directed ticks (up/down/unchanged + previous price)
[POS]:    Signal layer - per-symbol last-price cache
[UPDATE]: When changing how direction is derived
*/

use std::collections::HashMap;

use rust_decimal::Decimal;
use tickstream_adapter::{DirectedTick, Direction, RawTick};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub direction: Direction,
    pub previous_price: Option<Decimal>,
}

/// Last accepted price per symbol. Ordering is processing order; timestamps are ignored.
#[derive(Debug, Default)]
pub struct PriceDirectionTracker {
    last_prices: HashMap<String, Decimal>,
}

impl PriceDirectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare against the stored price, then overwrite it.
    pub fn observe(&mut self, symbol: &str, price: Decimal) -> Observation {
        let previous_price = self.last_prices.insert(symbol.to_string(), price);
        Observation {
            direction: Direction::between(previous_price.as_ref(), &price),
            previous_price,
        }
    }

    pub fn apply(&mut self, tick: RawTick) -> DirectedTick {
        let observation = self.observe(&tick.symbol, tick.price);
        DirectedTick {
            tick,
            direction: observation.direction,
            previous_price: observation.previous_price,
        }
    }

    pub fn last_price(&self, symbol: &str) -> Option<Decimal> {
        self.last_prices.get(symbol).copied()
    }

    pub fn len(&self) -> usize {
        self.last_prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_prices.is_empty()
    }

    pub fn clear(&mut self) {
        self.last_prices.clear();
    }
}
