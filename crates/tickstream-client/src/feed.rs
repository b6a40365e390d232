/*
[INPUT]:  One shared ConnectionManager, per-symbol interest from many consumers
[OUTPUT]: Latest directed tick per symbol via `watch`; subscription set = union of live interest
[POS]:    Facade layer - single-symbol views over a shared connection
[UPDATE]: When changing interest accounting or fan-out semantics
*/

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use tickstream_adapter::{DirectedTick, Result, StreamError};

use crate::events::StreamEvent;
use crate::manager::ConnectionManager;
use crate::subscription::normalize_symbol;

#[derive(Debug)]
struct SymbolSlot {
    refs: usize,
    tx: watch::Sender<Option<DirectedTick>>,
}

#[derive(Debug, Default)]
struct FeedInterests {
    base: BTreeSet<String>,
    symbols: HashMap<String, SymbolSlot>,
}

impl FeedInterests {
    fn union(&self) -> BTreeSet<String> {
        self.base
            .iter()
            .cloned()
            .chain(self.symbols.keys().cloned())
            .collect()
    }
}

fn lock(shared: &Mutex<FeedInterests>) -> MutexGuard<'_, FeedInterests> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Hands out per-symbol feeds that all share one connection.
#[derive(Debug)]
pub struct SymbolFeedHub {
    manager: Arc<ConnectionManager>,
    shared: Arc<Mutex<FeedInterests>>,
    fanout: JoinHandle<()>,
}

impl SymbolFeedHub {
    /// `base` symbols stay subscribed for the hub's lifetime regardless of live feeds.
    pub fn new<I, S>(manager: Arc<ConnectionManager>, base: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tokio::runtime::Handle::try_current()
            .map_err(|err| StreamError::Runtime(err.to_string()))?;

        let interests = FeedInterests {
            base: base
                .into_iter()
                .filter_map(|symbol| normalize_symbol(symbol.as_ref()))
                .collect(),
            symbols: HashMap::new(),
        };
        manager.set_symbols(interests.union())?;

        let shared = Arc::new(Mutex::new(interests));
        let fanout = tokio::spawn(fan_out(manager.subscribe_events(), Arc::clone(&shared)));

        Ok(Self {
            manager,
            shared,
            fanout,
        })
    }

    /// Open a feed for one symbol. The symbol joins the subscription set while any feed for it lives.
    pub fn feed(&self, symbol: &str) -> Result<SymbolFeed> {
        let symbol =
            normalize_symbol(symbol).ok_or_else(|| StreamError::InvalidSymbol(symbol.to_string()))?;

        let mut interests = lock(&self.shared);
        let existing = interests.symbols.get_mut(&symbol).map(|slot| {
            slot.refs += 1;
            slot.tx.subscribe()
        });
        let rx = match existing {
            Some(rx) => rx,
            None => {
                let (tx, rx) = watch::channel(None);
                interests
                    .symbols
                    .insert(symbol.clone(), SymbolSlot { refs: 1, tx });
                debug!(%symbol, "First feed for symbol; widening subscription");
                if let Err(err) = self.manager.set_symbols(interests.union()) {
                    interests.symbols.remove(&symbol);
                    return Err(err);
                }
                rx
            }
        };
        drop(interests);

        Ok(SymbolFeed {
            symbol,
            rx,
            shared: Arc::clone(&self.shared),
            manager: Arc::clone(&self.manager),
        })
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// Current union of base symbols and symbols with live feeds.
    pub fn symbols(&self) -> BTreeSet<String> {
        lock(&self.shared).union()
    }

    pub fn feed_count(&self, symbol: &str) -> usize {
        normalize_symbol(symbol)
            .and_then(|symbol| lock(&self.shared).symbols.get(&symbol).map(|slot| slot.refs))
            .unwrap_or(0)
    }
}

impl Drop for SymbolFeedHub {
    fn drop(&mut self) {
        self.fanout.abort();
    }
}

async fn fan_out(mut events: broadcast::Receiver<StreamEvent>, shared: Arc<Mutex<FeedInterests>>) {
    loop {
        match events.recv().await {
            Ok(StreamEvent::Tick(tick)) => {
                let interests = lock(&shared);
                if let Some(slot) = interests.symbols.get(tick.symbol()) {
                    slot.tx.send_replace(Some(tick));
                }
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Symbol feed fan-out lagged; some ticks were skipped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Latest tick for one symbol. Dropping the last feed for a symbol unsubscribes it.
#[derive(Debug)]
pub struct SymbolFeed {
    symbol: String,
    rx: watch::Receiver<Option<DirectedTick>>,
    shared: Arc<Mutex<FeedInterests>>,
    manager: Arc<ConnectionManager>,
}

impl SymbolFeed {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Most recent tick, if any has arrived since the feed's symbol was first requested.
    pub fn latest(&self) -> Option<DirectedTick> {
        self.rx.borrow().clone()
    }

    /// Wait for the next tick.
    pub async fn changed(&mut self) -> Result<Option<DirectedTick>> {
        self.rx
            .changed()
            .await
            .map_err(|_| StreamError::ClientClosed)?;
        Ok(self.rx.borrow_and_update().clone())
    }
}

impl Drop for SymbolFeed {
    fn drop(&mut self) {
        let mut interests = lock(&self.shared);
        let Some(slot) = interests.symbols.get_mut(&self.symbol) else {
            return;
        };
        slot.refs = slot.refs.saturating_sub(1);
        if slot.refs > 0 {
            return;
        }

        interests.symbols.remove(&self.symbol);
        debug!(symbol = %self.symbol, "Last feed dropped; narrowing subscription");
        let _ = self.manager.set_symbols(interests.union());
    }
}
