//! Price Enricher (C4, §4.4)
//!
//! Queries `PriceSource` adapters in declared order until one yields a
//! value, caching hits for a short TTL — check cache, else compute and
//! insert. Staleness is tracked with `Instant` rather than a wall-clock
//! timestamp since this cache never needs to be serialized.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use crate::error::Result;
use crate::model::ChainId;
use crate::store::Store;
use crate::upstream::AdapterRegistry;

struct CacheEntry {
    price_usd: f64,
    cached_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() > ttl
    }
}

pub struct PriceEnricher<'a> {
    registry: &'a AdapterRegistry,
    store: &'a dyn Store,
    cache: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl<'a> PriceEnricher<'a> {
    pub fn new(registry: &'a AdapterRegistry, store: &'a dyn Store) -> Self {
        Self {
            registry,
            store,
            cache: DashMap::new(),
            ttl: Duration::from_secs(60),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn cache_key(chain: &ChainId, token: &str) -> String {
        format!("{}:{}", chain.0, token)
    }

    /// `None` means a full miss: no source had a price and no trade
    /// history exists to fall back on. Callers must never treat this as
    /// zero profit (§4.4, §7 `PriceMissing`).
    pub async fn price_of(&self, chain: &ChainId, token: &str) -> Result<Option<f64>> {
        let key = Self::cache_key(chain, token);
        if let Some(entry) = self.cache.get(&key) {
            if !entry.is_expired(self.ttl) {
                return Ok(Some(entry.price_usd));
            }
        }

        for source in self.registry.price_sources(chain) {
            match source.price_of(chain, token).await {
                Ok(Some(price)) => {
                    self.cache.insert(
                        key,
                        CacheEntry {
                            price_usd: price,
                            cached_at: Instant::now(),
                        },
                    );
                    return Ok(Some(price));
                }
                Ok(None) => continue,
                Err(e) if e.is_retryable() => {
                    debug!(provider = source.name(), error = %e, "price source unavailable this tick");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        debug!(chain = %chain, token = %token, "all price sources missed, falling back to last trade price");
        self.store.last_trade_price(chain, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::upstream::{AdapterRegistry, PriceSource};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct CountingSource {
        calls: Arc<AtomicU32>,
        price: Option<f64>,
    }

    #[async_trait]
    impl PriceSource for CountingSource {
        fn name(&self) -> &str {
            "counting"
        }
        async fn price_of(&self, _chain: &ChainId, _token: &str) -> Result<Option<f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.price)
        }
    }

    #[tokio::test]
    async fn caches_hits_within_ttl() {
        let store = InMemoryStore::new();
        let chain = ChainId::from("eth");
        let calls = Arc::new(AtomicU32::new(0));
        let registry = AdapterRegistry::builder()
            .with_prices(
                chain.clone(),
                Arc::new(CountingSource { calls: calls.clone(), price: Some(2.5) }),
            )
            .build();
        let enricher = PriceEnricher::new(&registry, &store).with_ttl(Duration::from_secs(60));

        assert_eq!(enricher.price_of(&chain, "tok").await.unwrap(), Some(2.5));
        assert_eq!(enricher.price_of(&chain, "tok").await.unwrap(), Some(2.5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn falls_back_to_last_trade_price_on_full_miss() {
        use crate::model::{Side, Trade};

        let store = InMemoryStore::new();
        let chain = ChainId::from("eth");
        store
            .insert_trade(Trade {
                tx_hash: "0x1".to_string(),
                chain: chain.clone(),
                wallet: "w".to_string(),
                token: "tok".to_string(),
                side: Side::Buy,
                quantity: 1.0,
                unit_price_usd: 9.0,
                usd_value: 9.0,
                venue: "uniswap".to_string(),
                timestamp: chrono::Utc::now(),
            })
            .await
            .unwrap();
        let registry = AdapterRegistry::default();
        let enricher = PriceEnricher::new(&registry, &store);
        assert_eq!(enricher.price_of(&chain, "tok").await.unwrap(), Some(9.0));
    }

    #[tokio::test]
    async fn returns_none_on_total_miss() {
        let store = InMemoryStore::new();
        let chain = ChainId::from("eth");
        let registry = AdapterRegistry::default();
        let enricher = PriceEnricher::new(&registry, &store);
        assert_eq!(enricher.price_of(&chain, "tok").await.unwrap(), None);
    }
}
