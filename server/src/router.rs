// Symbol routing: who wants what, upstream interest, trade fan-out
use crate::finnhub::FeedHandler;
use crate::registry::ClientRegistry;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tickrelay_common::{
    ClientEnvelope, ClientId, FeedTick, MetricsCollector, PriceData, Result, Symbol,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// The upstream side the router drives. `FinnhubLink` in production.
#[async_trait]
pub trait UpstreamFeed: Send + Sync {
    fn is_connected(&self) -> bool;
    async fn subscribe(&self, symbols: &[Symbol]) -> Result<()>;
    async fn unsubscribe(&self, symbols: &[Symbol]) -> Result<()>;
}

/// The two mirror maps. Pure data, no I/O: mutators report which symbols
/// became net-new or net-abandoned so the caller can adjust upstream
/// interest.
#[derive(Default)]
struct RouterState {
    by_client: HashMap<ClientId, HashSet<Symbol>>,
    by_symbol: HashMap<Symbol, HashSet<ClientId>>,
}

impl RouterState {
    /// Adds interest; returns the symbols nobody wanted before.
    fn subscribe(&mut self, id: ClientId, symbols: &[Symbol]) -> Vec<Symbol> {
        let mut net_new = Vec::new();
        let wanted = self.by_client.entry(id).or_default();
        for symbol in symbols {
            wanted.insert(symbol.clone());
            let takers = self.by_symbol.entry(symbol.clone()).or_default();
            if takers.is_empty() {
                net_new.push(symbol.clone());
            }
            takers.insert(id);
        }
        net_new
    }

    /// Drops interest; returns the symbols now wanted by nobody. Unknown
    /// ids and never-wanted symbols are no-ops. The per-client entry stays,
    /// even when it empties, until the client disconnects.
    fn unsubscribe(&mut self, id: ClientId, symbols: &[Symbol]) -> Vec<Symbol> {
        let mut net_abandoned = Vec::new();
        let wanted = match self.by_client.get_mut(&id) {
            Some(wanted) => wanted,
            None => return net_abandoned,
        };
        for symbol in symbols {
            if !wanted.remove(symbol) {
                continue;
            }
            if let Some(takers) = self.by_symbol.get_mut(symbol) {
                takers.remove(&id);
                if takers.is_empty() {
                    self.by_symbol.remove(symbol);
                    net_abandoned.push(symbol.clone());
                }
            }
        }
        net_abandoned
    }

    /// Removes every trace of a client; returns its net-abandoned symbols.
    fn remove_client(&mut self, id: ClientId) -> Vec<Symbol> {
        let wanted = match self.by_client.remove(&id) {
            Some(wanted) => wanted,
            None => return Vec::new(),
        };
        let mut net_abandoned = Vec::new();
        for symbol in wanted {
            if let Some(takers) = self.by_symbol.get_mut(&symbol) {
                takers.remove(&id);
                if takers.is_empty() {
                    self.by_symbol.remove(&symbol);
                    net_abandoned.push(symbol);
                }
            }
        }
        net_abandoned
    }

    fn clients_for(&self, symbol: &Symbol) -> Vec<ClientId> {
        self.by_symbol
            .get(symbol)
            .map(|takers| takers.iter().copied().collect())
            .unwrap_or_default()
    }

    fn wanted_symbols(&self) -> Vec<Symbol> {
        self.by_symbol.keys().cloned().collect()
    }

    fn symbol_count(&self) -> usize {
        self.by_symbol.len()
    }
}

/// Routing facade. One mutex guards the maps and is held across the
/// upstream and registry calls, so map state and upstream traffic never
/// reorder against each other.
pub struct SymbolRouter {
    state: Mutex<RouterState>,
    feed: Arc<dyn UpstreamFeed>,
    registry: Arc<ClientRegistry>,
    metrics: Arc<MetricsCollector>,
}

impl SymbolRouter {
    pub fn new(
        feed: Arc<dyn UpstreamFeed>,
        registry: Arc<ClientRegistry>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            state: Mutex::new(RouterState::default()),
            feed,
            registry,
            metrics,
        }
    }

    /// Records interest and subscribes upstream to the symbols nobody
    /// wanted before. Upstream failures are logged, never surfaced: the
    /// maps stay the durable record and the replay on the next reconnect
    /// settles any difference.
    pub async fn subscribe(&self, id: ClientId, raw_symbols: &[String]) {
        let symbols: Vec<Symbol> = raw_symbols.iter().map(|s| Symbol::new(s)).collect();
        let mut state = self.state.lock().await;
        let net_new = state.subscribe(id, &symbols);
        self.metrics.record_subscription_count(state.symbol_count());
        info!(
            "📊 Client {} subscribed to {:?} ({} net new)",
            id,
            raw_symbols,
            net_new.len()
        );
        if !net_new.is_empty() && self.feed.is_connected() {
            if let Err(e) = self.feed.subscribe(&net_new).await {
                warn!("⚠️ Upstream subscribe failed: {}", e);
            }
        }
    }

    /// Drops interest and unsubscribes upstream from the symbols whose last
    /// taker just left.
    pub async fn unsubscribe(&self, id: ClientId, raw_symbols: &[String]) {
        let symbols: Vec<Symbol> = raw_symbols.iter().map(|s| Symbol::new(s)).collect();
        let mut state = self.state.lock().await;
        let net_abandoned = state.unsubscribe(id, &symbols);
        self.metrics.record_subscription_count(state.symbol_count());
        info!(
            "📊 Client {} unsubscribed from {:?} ({} abandoned)",
            id,
            raw_symbols,
            net_abandoned.len()
        );
        if !net_abandoned.is_empty() && self.feed.is_connected() {
            if let Err(e) = self.feed.unsubscribe(&net_abandoned).await {
                warn!("⚠️ Upstream unsubscribe failed: {}", e);
            }
        }
    }

    /// Full teardown for a departing client.
    pub async fn unsubscribe_all(&self, id: ClientId) {
        let mut state = self.state.lock().await;
        let net_abandoned = state.remove_client(id);
        self.metrics.record_subscription_count(state.symbol_count());
        if net_abandoned.is_empty() {
            return;
        }
        info!("📊 Client {} released {:?}", id, net_abandoned);
        if self.feed.is_connected() {
            if let Err(e) = self.feed.unsubscribe(&net_abandoned).await {
                warn!("⚠️ Upstream unsubscribe failed: {}", e);
            }
        }
    }

    /// Sorted symbol names for the health surface.
    pub async fn active_symbols(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut symbols: Vec<String> = state
            .wanted_symbols()
            .iter()
            .map(|symbol| symbol.to_string())
            .collect();
        symbols.sort();
        symbols
    }

    pub async fn symbol_count(&self) -> usize {
        self.state.lock().await.symbol_count()
    }
}

#[async_trait]
impl FeedHandler for SymbolRouter {
    async fn wanted_symbols(&self) -> Vec<Symbol> {
        self.state.lock().await.wanted_symbols()
    }

    /// Fans a trade batch out to interested clients. Ticks without a symbol
    /// or price are skipped; a failed delivery purges that client from the
    /// registry and both maps without aborting the batch, and the symbols
    /// those purges abandoned are unsubscribed upstream at the end.
    async fn on_trades(&self, ticks: Vec<FeedTick>) {
        let mut state = self.state.lock().await;
        let mut abandoned = Vec::new();
        for tick in ticks {
            if tick.symbol.is_empty() {
                debug!("Skipping trade tick without a symbol");
                continue;
            }
            let price = match tick.price {
                Some(price) => price,
                None => {
                    debug!("Skipping trade tick without a price for {}", tick.symbol);
                    continue;
                }
            };
            let symbol = Symbol::new(&tick.symbol);
            let takers = state.clients_for(&symbol);
            if takers.is_empty() {
                continue;
            }
            self.metrics.record_price_update(symbol.as_str());
            let envelope = ClientEnvelope::price_update(
                symbol,
                PriceData {
                    price,
                    volume: tick.volume,
                    timestamp: tick.timestamp,
                },
            );
            for id in takers {
                if let Err(e) = self.registry.send_to(id, &envelope).await {
                    // The registry already dropped the connection; tear the
                    // client out of the maps as a disconnect would.
                    warn!("Purging client {} after delivery failure: {}", id, e);
                    abandoned.extend(state.remove_client(id));
                }
            }
        }
        if !abandoned.is_empty() {
            self.metrics.record_subscription_count(state.symbol_count());
            if self.feed.is_connected() {
                if let Err(e) = self.feed.unsubscribe(&abandoned).await {
                    warn!("⚠️ Upstream unsubscribe failed: {}", e);
                }
            }
        }
    }
}
