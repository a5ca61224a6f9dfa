//! Wallet Discoverer (C3, §4.3) and the shared DEX-pool heuristic also
//! used by the Wallet Monitor (C8, §4.8).
//!
//! The heuristic (Scenario F): tally each address's outgoing transfer
//! count within the window; any address sending the token more than
//! `pool_send_threshold` times is treated as a liquidity pool. A transfer
//! *from* a pool is a buy; a transfer *to* a pool (from the wallet in
//! question) is a sell. Anything else is discarded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use crate::config::DiscoveryConfig;
use crate::error::Result;
use crate::model::{normalize_address, ChainId, SeedToken, Side, Trade, Wallet};
use crate::price::PriceEnricher;
use crate::store::Store;
use crate::upstream::{AdapterRegistry, Transfer};

/// Upper bound on concurrently in-flight seed tokens within one chain's
/// discovery tick (§9: wallet/seed fetches are independent and should run
/// in parallel up to a pool cap).
const MAX_CONCURRENT_SEEDS: usize = 8;

/// A transfer classified against the pool-send-count heuristic: `side` is
/// from the perspective of `wallet` (the non-pool party).
#[derive(Debug, Clone)]
pub struct ClassifiedTransfer {
    pub transfer: Transfer,
    pub wallet: String,
    pub side: Side,
}

/// Classify a batch of transfers of one token using the pool-send-count
/// heuristic.
pub fn classify_transfers(transfers: &[Transfer], pool_send_threshold: u32) -> Vec<ClassifiedTransfer> {
    let mut outgoing_counts: HashMap<&str, u32> = HashMap::new();
    for t in transfers {
        *outgoing_counts.entry(t.from.as_str()).or_insert(0) += 1;
    }

    let pools: std::collections::HashSet<&str> = outgoing_counts
        .iter()
        .filter(|(_, &count)| count > pool_send_threshold)
        .map(|(addr, _)| *addr)
        .collect();

    let mut classified = Vec::new();
    for t in transfers {
        let from_is_pool = pools.contains(t.from.as_str());
        let to_is_pool = pools.contains(t.to.as_str());
        match (from_is_pool, to_is_pool) {
            (true, false) => classified.push(ClassifiedTransfer {
                transfer: t.clone(),
                wallet: t.to.clone(),
                side: Side::Buy,
            }),
            (false, true) => classified.push(ClassifiedTransfer {
                transfer: t.clone(),
                wallet: t.from.clone(),
                side: Side::Sell,
            }),
            _ => continue,
        }
    }
    classified
}

pub struct WalletDiscoverer<'a> {
    store: &'a dyn Store,
    registry: &'a AdapterRegistry,
    config: &'a DiscoveryConfig,
    prices: &'a PriceEnricher<'a>,
}

impl<'a> WalletDiscoverer<'a> {
    pub fn new(
        store: &'a dyn Store,
        registry: &'a AdapterRegistry,
        config: &'a DiscoveryConfig,
        prices: &'a PriceEnricher<'a>,
    ) -> Self {
        Self { store, registry, config, prices }
    }

    pub async fn run_for_chain(&self, chain: &ChainId) -> Result<DiscoverOutcome> {
        let lookback = chrono::Duration::hours(self.config.lookback_hours);
        let seeds = self.store.recent_seed_tokens(chain, lookback, Utc::now()).await?;

        let mut seen_tokens = std::collections::HashSet::new();
        let seeds: Vec<SeedToken> = seeds
            .into_iter()
            .filter(|s| seen_tokens.insert(s.address.clone()))
            .collect();

        let trades_inserted = AtomicU32::new(0);
        stream::iter(seeds.into_iter().map(Ok::<_, crate::error::Error>))
            .try_for_each_concurrent(Some(MAX_CONCURRENT_SEEDS), |seed| {
                let trades_inserted = &trades_inserted;
                async move {
                    let count = self.discover_seed(chain, seed).await?;
                    trades_inserted.fetch_add(count, Ordering::Relaxed);
                    Ok(())
                }
            })
            .await?;

        let outcome = DiscoverOutcome { trades_inserted: trades_inserted.load(Ordering::Relaxed) };
        info!(chain = %chain, trades = outcome.trades_inserted, "discovery tick complete");
        Ok(outcome)
    }

    async fn discover_seed(&self, chain: &ChainId, seed: SeedToken) -> Result<u32> {
        let Some(source) = self.registry.transfer_sources(chain).first() else {
            warn!(chain = %chain, "no transfer source configured, skipping discovery");
            return Ok(0);
        };

        let transfers = match source
            .fetch_token_transfers(chain, &seed.address, self.config.transfer_fetch_limit)
            .await
        {
            Ok(t) => t,
            Err(e) if e.is_retryable() => {
                warn!(token = %seed.address, error = %e, "transfer fetch failed, skipping this token");
                return Ok(0);
            }
            Err(e) => return Err(e),
        };

        let classified = classify_transfers(&transfers, self.config.pool_send_threshold);
        debug!(token = %seed.address, accepted = classified.len(), "discovery classified transfers");

        let mut inserted = 0u32;
        for c in classified {
            let wallet_address = normalize_address(chain, &c.wallet);

            let now = Utc::now();
            if self.store.get_wallet(chain, &wallet_address).await?.is_none() {
                self.store
                    .upsert_wallet(Wallet::new(chain.clone(), wallet_address.clone(), now))
                    .await?;
            }

            // A full price miss must never be treated as a zero-value trade:
            // that would fabricate either a free cost basis or a worthless
            // sale. Skip recording this transfer rather than guess a price.
            let Some(unit_price_usd) = self.prices.price_of(chain, &seed.address).await.ok().flatten() else {
                debug!(token = %seed.address, "no price available, skipping transfer");
                continue;
            };

            let trade_inserted = self
                .store
                .insert_trade(Trade {
                    tx_hash: c.transfer.tx_hash,
                    chain: chain.clone(),
                    wallet: wallet_address,
                    token: seed.address.clone(),
                    side: c.side,
                    quantity: c.transfer.quantity,
                    unit_price_usd,
                    usd_value: unit_price_usd * c.transfer.quantity,
                    venue: "dex".to_string(),
                    timestamp: c.transfer.timestamp,
                })
                .await?;
            if trade_inserted {
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DiscoverOutcome {
    pub trades_inserted: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn transfer(from: &str, to: &str, hash: &str) -> Transfer {
        Transfer {
            tx_hash: hash.to_string(),
            token: "T".to_string(),
            from: from.to_string(),
            to: to.to_string(),
            quantity: 1.0,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn scenario_f_pool_detection() {
        let transfers = vec![
            transfer("A", "B", "t1"),
            transfer("A", "B", "t2"),
            transfer("A", "B", "t3"),
            transfer("A", "B", "t4"),
            transfer("A", "B", "t5"),
            transfer("A", "B", "t6"),
            transfer("A", "B", "t7"),
            transfer("A", "B", "t8"),
            transfer("A", "B", "t9"),
            transfer("A", "B", "t10"),
            transfer("A", "C", "t11"),
            transfer("D", "B", "t12"),
        ];
        let classified = classify_transfers(&transfers, 2);
        let buys: Vec<_> = classified.iter().filter(|c| c.side == Side::Buy).collect();
        assert_eq!(buys.len(), 11);
        assert!(classified
            .iter()
            .all(|c| !(c.transfer.from == "D" && c.transfer.to == "B")));
    }
}
