//! Token Ingestor (C2, §4.2)
//!
//! Runs every `T_ingest`. Queries all enabled `TrendingSource` adapters for
//! a chain, unions and normalizes the results, upserts `Token`, and
//! appends one `SeedToken` per `(source, token)` that clears the safety
//! gate. Rejections are logged at debug level and never persisted.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::SafetyGateConfig;
use crate::error::Result;
use crate::model::{normalize_address, ChainId, SeedToken, Token};
use crate::store::Store;
use crate::upstream::AdapterRegistry;

pub struct TokenIngestor<'a> {
    store: &'a dyn Store,
    registry: &'a AdapterRegistry,
    gate: &'a SafetyGateConfig,
}

impl<'a> TokenIngestor<'a> {
    pub fn new(store: &'a dyn Store, registry: &'a AdapterRegistry, gate: &'a SafetyGateConfig) -> Self {
        Self { store, registry, gate }
    }

    pub async fn run_for_chain(&self, chain: &ChainId) -> Result<IngestOutcome> {
        let mut outcome = IngestOutcome::default();
        let now = Utc::now();

        for source in self.registry.trending_sources(chain) {
            let snapshots = match source.fetch_trending(chain).await {
                Ok(s) => s,
                Err(e) if e.is_retryable() => {
                    warn!(provider = source.name(), error = %e, "trending fetch failed, skipping this tick");
                    continue;
                }
                Err(e) => return Err(e),
            };

            for snapshot in snapshots {
                let address = normalize_address(chain, &snapshot.address);

                let safety = self
                    .registry
                    .safety_sources(chain)
                    .first()
                    .map(|s| s.safety_check(chain, &address));
                let safety_info = match safety {
                    Some(fut) => fut.await.unwrap_or_default(),
                    None => Default::default(),
                };

                let token = Token {
                    chain: chain.clone(),
                    address: address.clone(),
                    symbol: snapshot.symbol.clone(),
                    display_name: snapshot.symbol.clone(),
                    liquidity_usd: snapshot.liquidity_usd,
                    volume_24h_usd: snapshot.volume_24h_usd,
                    last_price_usd: snapshot.price_usd,
                    tax_buy_pct: safety_info.tax_buy_pct,
                    tax_sell_pct: safety_info.tax_sell_pct,
                    is_honeypot: safety_info.is_honeypot,
                    created_at: now,
                };
                self.store.upsert_token(token).await?;
                outcome.tokens_upserted += 1;

                if let Some(reason) = self.reject_reason(&address, &snapshot, &safety_info) {
                    debug!(chain = %chain, address = %address, reason, "token rejected by safety gate");
                    outcome.rejected += 1;
                    continue;
                }

                self.store
                    .append_seed_token(SeedToken {
                        chain: chain.clone(),
                        address: address.clone(),
                        source: source.name().to_string(),
                        snapshot_ts: now,
                    })
                    .await?;
                outcome.seeds_appended += 1;
            }
        }

        info!(
            chain = %chain,
            tokens = outcome.tokens_upserted,
            seeds = outcome.seeds_appended,
            rejected = outcome.rejected,
            "ingest tick complete"
        );
        Ok(outcome)
    }

    fn reject_reason(
        &self,
        address: &str,
        snapshot: &crate::upstream::TokenSnapshot,
        safety: &crate::upstream::SafetyInfo,
    ) -> Option<&'static str> {
        if self.gate.stablecoin_exclusions.iter().any(|a| a == address) {
            return Some("stablecoin_or_wrapped_native_exclusion");
        }
        if snapshot.liquidity_usd < self.gate.min_liquidity_usd {
            return Some("min_liquidity");
        }
        if snapshot.volume_24h_usd < self.gate.min_volume_24h_usd {
            return Some("min_volume_24h");
        }
        if safety.tax_buy_pct > self.gate.max_tax_pct || safety.tax_sell_pct > self.gate.max_tax_pct {
            return Some("max_tax_pct");
        }
        if safety.is_honeypot {
            return Some("honeypot");
        }
        None
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IngestOutcome {
    pub tokens_upserted: u32,
    pub seeds_appended: u32,
    pub rejected: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::upstream::{AdapterRegistry, TokenSnapshot, TrendingSource};
    use async_trait::async_trait;

    struct StubTrending(Vec<TokenSnapshot>);

    #[async_trait]
    impl TrendingSource for StubTrending {
        fn name(&self) -> &str {
            "stub"
        }
        async fn fetch_trending(&self, _chain: &ChainId) -> Result<Vec<TokenSnapshot>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn rejects_low_liquidity_tokens() {
        let store = InMemoryStore::new();
        let chain = ChainId::from("eth");
        let registry = AdapterRegistry::builder()
            .with_trending(
                chain.clone(),
                std::sync::Arc::new(StubTrending(vec![TokenSnapshot {
                    address: "0xdead".to_string(),
                    symbol: "LOW".to_string(),
                    price_usd: Some(1.0),
                    liquidity_usd: 10.0,
                    volume_24h_usd: 10.0,
                }])),
            )
            .build();
        let gate = SafetyGateConfig::default();
        let ingestor = TokenIngestor::new(&store, &registry, &gate);
        let outcome = ingestor.run_for_chain(&chain).await.unwrap();
        assert_eq!(outcome.tokens_upserted, 1);
        assert_eq!(outcome.seeds_appended, 0);
        assert_eq!(outcome.rejected, 1);
    }

    #[tokio::test]
    async fn accepts_token_clearing_the_gate() {
        let store = InMemoryStore::new();
        let chain = ChainId::from("eth");
        let registry = AdapterRegistry::builder()
            .with_trending(
                chain.clone(),
                std::sync::Arc::new(StubTrending(vec![TokenSnapshot {
                    address: "0xBEEF".to_string(),
                    symbol: "GOOD".to_string(),
                    price_usd: Some(1.0),
                    liquidity_usd: 100_000.0,
                    volume_24h_usd: 100_000.0,
                }])),
            )
            .build();
        let gate = SafetyGateConfig::default();
        let ingestor = TokenIngestor::new(&store, &registry, &gate);
        let outcome = ingestor.run_for_chain(&chain).await.unwrap();
        assert_eq!(outcome.seeds_appended, 1);

        let seeds = store
            .recent_seed_tokens(&chain, chrono::Duration::hours(1), Utc::now())
            .await
            .unwrap();
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].address, "0xbeef");
    }
}
