/*
[INPUT]:  Desired symbol set from consumers
[OUTPUT]: Normalized symbol set and subscribe directives on demand
[POS]:    Subscription layer - authoritative record of what the server should stream
[UPDATE]: When changing symbol normalization or directive semantics
*/

use std::collections::BTreeSet;

use tickstream_adapter::SubscribeDirective;

/// Trim and uppercase a symbol; blank input yields `None`.
pub fn normalize_symbol(symbol: &str) -> Option<String> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return None;
    }
    Some(symbol.to_ascii_uppercase())
}

/// Tracks the desired symbol set and which set the live socket was last told about.
#[derive(Debug, Default, Clone)]
pub struct SubscriptionRegistry {
    desired: BTreeSet<String>,
    sent: Option<BTreeSet<String>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::new();
        registry.set_symbols(symbols);
        registry
    }

    /// Replace the desired set. Returns whether it changed.
    pub fn set_symbols<I, S>(&mut self, symbols: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let next: BTreeSet<String> = symbols
            .into_iter()
            .filter_map(|symbol| normalize_symbol(symbol.as_ref()))
            .collect();
        if next == self.desired {
            return false;
        }
        self.desired = next;
        true
    }

    pub fn current(&self) -> &BTreeSet<String> {
        &self.desired
    }

    pub fn contains(&self, symbol: &str) -> bool {
        normalize_symbol(symbol).is_some_and(|symbol| self.desired.contains(&symbol))
    }

    pub fn build_directive(&self) -> SubscribeDirective {
        SubscribeDirective::new(self.desired.iter().cloned())
    }

    /// Whether the live socket is subscribed with something other than the desired set.
    pub fn needs_directive(&self) -> bool {
        self.sent.as_ref() != Some(&self.desired)
    }

    /// Record that the current set was transmitted on the live socket.
    pub fn mark_sent(&mut self) {
        self.sent = Some(self.desired.clone());
    }

    /// Forget what the previous socket was subscribed to.
    pub fn clear_sent(&mut self) {
        self.sent = None;
    }
}
