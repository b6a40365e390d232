/*
[INPUT]:  Price comparisons between consecutive ticks
[OUTPUT]: Typed Rust enums with serialization support
[POS]:    Data layer - derived presentation signals
[UPDATE]: When new derived signals are added
*/

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Movement of a symbol's price relative to the previously accepted tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Unchanged,
}

impl Direction {
    /// Direction of `current` compared with `previous`; a first sighting is `Unchanged`.
    pub fn between<T: PartialOrd>(previous: Option<&T>, current: &T) -> Self {
        match previous.and_then(|previous| current.partial_cmp(previous)) {
            Some(Ordering::Greater) => Direction::Up,
            Some(Ordering::Less) => Direction::Down,
            Some(Ordering::Equal) | None => Direction::Unchanged,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Unchanged => "unchanged",
        }
    }
}
