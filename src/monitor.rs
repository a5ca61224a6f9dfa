//! Wallet Monitor (C8, §4.8)
//!
//! Runs every `T_monitor`. Polls the active watchlist plus a user-curated
//! "always watch" set, fetching both transfer directions per wallet and
//! classifying with the same DEX-pool heuristic C3 uses. Each newly
//! observed trade is inserted idempotently, filtered against the
//! stablecoin exclusion list, then handed to C9 synchronously (§4.8 steps
//! 1-3). A failure fetching one wallet never blocks another (§4.9 failure
//! semantics).

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::alert::AlertTransport;
use crate::confluence::{ConfluenceDecision, ConfluenceDetector};
use crate::config::{ConfluenceConfig, DiscoveryConfig, WatchlistConfig};
use crate::discover::classify_transfers;
use crate::error::Result;
use crate::model::{normalize_address, AlertKind, ChainId, Side, Trade, Wallet};
use crate::price::PriceEnricher;
use crate::store::Store;
use crate::upstream::{AdapterRegistry, TransferDirection};

/// Upper bound on concurrently in-flight wallet polls within one chain's
/// monitor tick (§9: wallet fetches are independent and should run in
/// parallel up to a pool cap).
const MAX_CONCURRENT_WALLETS: usize = 8;

pub struct WalletMonitor<'a> {
    store: &'a dyn Store,
    registry: &'a AdapterRegistry,
    prices: &'a PriceEnricher<'a>,
    detector: &'a ConfluenceDetector<'a>,
    transport: &'a dyn AlertTransport,
    discovery: &'a DiscoveryConfig,
    watchlist_weights: (f64, f64, f64),
    stablecoin_exclusions: &'a [String],
}

#[derive(Debug, Default, Clone)]
pub struct MonitorOutcome {
    pub trades_observed: u32,
    pub alerts_fired: u32,
}

impl<'a> WalletMonitor<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: &'a dyn Store,
        registry: &'a AdapterRegistry,
        prices: &'a PriceEnricher<'a>,
        detector: &'a ConfluenceDetector<'a>,
        transport: &'a dyn AlertTransport,
        discovery: &'a DiscoveryConfig,
        watchlist: &'a WatchlistConfig,
        stablecoin_exclusions: &'a [String],
    ) -> Self {
        Self {
            store,
            registry,
            prices,
            detector,
            transport,
            discovery,
            watchlist_weights: watchlist.weights,
            stablecoin_exclusions,
        }
    }

    pub async fn run_for_chain(
        &self,
        chain: &ChainId,
        always_watch: &[String],
        confluence: &ConfluenceConfig,
    ) -> Result<MonitorOutcome> {
        let mut targets: Vec<String> = self
            .store
            .active_watchlist(chain)
            .await?
            .into_iter()
            .map(|e| e.wallet)
            .collect();
        for w in always_watch {
            if !targets.contains(w) {
                targets.push(w.clone());
            }
        }

        // Wallet fetches are independent; fan them out bounded by a pool
        // cap instead of polling one wallet at a time.
        let results: Vec<MonitorOutcome> = stream::iter(targets)
            .map(|wallet| async move {
                match self.poll_wallet(chain, &wallet, confluence).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(wallet = %wallet, error = %e, "wallet poll failed, continuing with remaining wallets");
                        MonitorOutcome::default()
                    }
                }
            })
            .buffer_unordered(MAX_CONCURRENT_WALLETS)
            .collect()
            .await;

        let mut outcome = MonitorOutcome::default();
        for r in results {
            outcome.trades_observed += r.trades_observed;
            outcome.alerts_fired += r.alerts_fired;
        }
        Ok(outcome)
    }

    async fn poll_wallet(
        &self,
        chain: &ChainId,
        wallet: &str,
        confluence: &ConfluenceConfig,
    ) -> Result<MonitorOutcome> {
        let mut outcome = MonitorOutcome::default();
        let Some(source) = self.registry.transfer_sources(chain).first() else {
            return Ok(outcome);
        };

        for direction in [TransferDirection::In, TransferDirection::Out] {
            let transfers = source
                .fetch_wallet_transfers(chain, wallet, direction, 100)
                .await?;

            let classified = classify_transfers(&transfers, self.discovery.pool_send_threshold);
            for c in classified {
                let observed_wallet = normalize_address(chain, &c.wallet);
                if observed_wallet != normalize_address(chain, wallet) {
                    continue;
                }

                if self.store.trade_exists(&c.transfer.tx_hash).await? {
                    continue;
                }

                // A full price miss must never be treated as a zero-value
                // trade: that would fabricate either a free cost basis or a
                // worthless sale. Skip recording this transfer entirely
                // rather than guess a price.
                let Some(unit_price_usd) = self.prices.price_of(chain, &c.transfer.token).await.ok().flatten() else {
                    debug!(token = %c.transfer.token, "no price available, skipping transfer");
                    continue;
                };

                if self.store.get_wallet(chain, &observed_wallet).await?.is_none() {
                    self.store
                        .upsert_wallet(Wallet::new(chain.clone(), observed_wallet.clone(), c.transfer.timestamp))
                        .await?;
                }

                let inserted = self
                    .store
                    .insert_trade(Trade {
                        tx_hash: c.transfer.tx_hash.clone(),
                        chain: chain.clone(),
                        wallet: observed_wallet.clone(),
                        token: c.transfer.token.clone(),
                        side: c.side,
                        quantity: c.transfer.quantity,
                        unit_price_usd,
                        usd_value: unit_price_usd * c.transfer.quantity,
                        venue: "dex".to_string(),
                        timestamp: c.transfer.timestamp,
                    })
                    .await?;
                if !inserted {
                    continue;
                }
                outcome.trades_observed += 1;

                if self
                    .stablecoin_exclusions
                    .iter()
                    .any(|addr| addr == &c.transfer.token)
                {
                    debug!(token = %c.transfer.token, "stablecoin/wrapped-native transfer recorded, skipping confluence check");
                    continue;
                }

                let fired = self
                    .evaluate_confluence(chain, c.side, &c.transfer.token, &observed_wallet, c.transfer.timestamp, confluence)
                    .await?;
                if fired {
                    outcome.alerts_fired += 1;
                }
            }
        }
        Ok(outcome)
    }

    async fn evaluate_confluence(
        &self,
        chain: &ChainId,
        side: Side,
        token: &str,
        wallet: &str,
        event_ts: chrono::DateTime<chrono::Utc>,
        confluence: &ConfluenceConfig,
    ) -> Result<bool> {
        let decision = self
            .detector
            .record_and_evaluate(&chain.0, side, token, wallet, event_ts)
            .await?;

        if let ConfluenceDecision::Fired { wallets, dedup_key } = decision {
            let kind = if side.is_buy() { AlertKind::BuyConfluence } else { AlertKind::SellConfluence };
            let record = self
                .detector
                .commit_alert(
                    kind,
                    &chain.0,
                    token,
                    wallets,
                    dedup_key,
                    confluence.window_secs * 1000,
                    self.watchlist_weights,
                )
                .await?;
            self.transport.emit_alert(&record).await;
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::EmitOutcome;
    use crate::store::{InMemoryStore, InMemoryTimeWindowStore};
    use crate::upstream::{AdapterRegistry, Transfer};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StubTransfers {
        outgoing: Vec<Transfer>,
        incoming: Vec<Transfer>,
    }

    #[async_trait]
    impl crate::upstream::TransferSource for StubTransfers {
        fn name(&self) -> &str {
            "stub"
        }
        async fn fetch_token_transfers(&self, _c: &ChainId, _t: &str, _l: u32) -> Result<Vec<Transfer>> {
            Ok(vec![])
        }
        async fn fetch_wallet_transfers(
            &self,
            _chain: &ChainId,
            _wallet: &str,
            direction: TransferDirection,
            _limit: u32,
        ) -> Result<Vec<Transfer>> {
            Ok(match direction {
                TransferDirection::In => self.incoming.clone(),
                TransferDirection::Out => self.outgoing.clone(),
            })
        }
    }

    struct CountingTransport(AtomicU32);

    #[async_trait]
    impl AlertTransport for CountingTransport {
        async fn emit_alert(&self, _record: &crate::model::AlertRecord) -> EmitOutcome {
            self.0.fetch_add(1, Ordering::SeqCst);
            EmitOutcome::Ok
        }
    }

    struct FixedPrice(f64);

    #[async_trait]
    impl crate::upstream::PriceSource for FixedPrice {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn price_of(&self, _chain: &ChainId, _token: &str) -> Result<Option<f64>> {
            Ok(Some(self.0))
        }
    }

    fn sell_transfer(from: &str, to: &str, hash: &str, token: &str) -> Transfer {
        Transfer {
            tx_hash: hash.to_string(),
            token: token.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            quantity: 5.0,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn scenario_d_sell_confluence_fires_and_emits() {
        let store = InMemoryStore::new();
        let window_store = InMemoryTimeWindowStore::new();
        let chain = ChainId::from("eth");

        // Three wallets sell the token back to "POOL"; two extra POOL-outbound
        // transfers push POOL's outgoing count above pool_send_threshold so
        // the heuristic recognizes POOL as the pool side and classifies the
        // wallet->POOL transfers as sells.
        let pool_sends = vec![
            sell_transfer("w1", "POOL", "s1", "T"),
            sell_transfer("w2", "POOL", "s2", "T"),
            sell_transfer("w3", "POOL", "s3", "T"),
            sell_transfer("POOL", "buyerX", "bx1", "T"),
            sell_transfer("POOL", "buyerY", "bx2", "T"),
        ];
        let registry = AdapterRegistry::builder()
            .with_transfers(
                chain.clone(),
                std::sync::Arc::new(StubTransfers { outgoing: pool_sends.clone(), incoming: vec![] }),
            )
            .with_prices(chain.clone(), std::sync::Arc::new(FixedPrice(1.0)))
            .build();
        let prices = PriceEnricher::new(&registry, &store);
        let detector = ConfluenceDetector::new(&store, &window_store, 1800, 2);
        let transport = CountingTransport(AtomicU32::new(0));
        let discovery = DiscoveryConfig { pool_send_threshold: 1, ..Default::default() };
        let watchlist = WatchlistConfig::default();
        let confluence = ConfluenceConfig { window_secs: 1800, min_confluence: 2 };

        let monitor = WalletMonitor::new(
            &store, &registry, &prices, &detector, &transport, &discovery, &watchlist, &[],
        );

        for wallet in ["w1", "w2", "w3"] {
            monitor.poll_wallet(&chain, wallet, &confluence).await.unwrap();
        }

        assert!(transport.0.load(Ordering::SeqCst) >= 1, "sell confluence must emit at least one alert");
    }

    #[tokio::test]
    async fn stablecoin_exclusion_skips_confluence_but_still_records_trade() {
        let store = InMemoryStore::new();
        let window_store = InMemoryTimeWindowStore::new();
        let chain = ChainId::from("eth");

        let incoming = vec![
            sell_transfer("POOL", "w1", "b1", "USDC"),
            sell_transfer("POOL", "w1", "b2", "USDC"),
        ];
        let registry = AdapterRegistry::builder()
            .with_transfers(
                chain.clone(),
                std::sync::Arc::new(StubTransfers { outgoing: vec![], incoming: incoming.clone() }),
            )
            .with_prices(chain.clone(), std::sync::Arc::new(FixedPrice(1.0)))
            .build();
        let prices = PriceEnricher::new(&registry, &store);
        let detector = ConfluenceDetector::new(&store, &window_store, 1800, 2);
        let transport = CountingTransport(AtomicU32::new(0));
        let discovery = DiscoveryConfig { pool_send_threshold: 1, ..Default::default() };
        let watchlist = WatchlistConfig::default();
        let confluence = ConfluenceConfig { window_secs: 1800, min_confluence: 2 };
        let exclusions = vec!["USDC".to_string()];

        let monitor = WalletMonitor::new(
            &store, &registry, &prices, &detector, &transport, &discovery, &watchlist, &exclusions,
        );

        let outcome = monitor.poll_wallet(&chain, "w1", &confluence).await.unwrap();

        assert_eq!(outcome.trades_observed, 2, "stablecoin transfers are still recorded as trades");
        assert_eq!(outcome.alerts_fired, 0);
        assert_eq!(transport.0.load(Ordering::SeqCst), 0, "stablecoin transfers never reach the confluence detector");
    }
}
