//! Stats Roller (C6, §4.6)
//!
//! Runs every `T_stats`. For each wallet observed in the last 30 days,
//! re-runs the analytics engine over that wallet's full trade history and
//! writes a fresh `WalletStats30D` row. Full recomputation, not
//! incremental, to avoid drift (§4.6) — re-running twice with no new
//! trades must produce byte-identical rows (§8 round-trip law).

use chrono::{Duration, Utc};
use tracing::info;

use crate::analytics::{self, bot_heuristics, fifo, TokenBuyContext};
use crate::config::{AnalyticsConfig, DiscoveryConfig};
use crate::error::Result;
use crate::model::{sort_trades, ChainId, Side, WalletStats30D};
use crate::price::PriceEnricher;
use crate::store::Store;

const WINDOW_DAYS: i64 = 30;

pub struct StatsRoller<'a> {
    store: &'a dyn Store,
    prices: &'a PriceEnricher<'a>,
    pool_send_threshold: u32,
    analytics: AnalyticsConfig,
}

impl<'a> StatsRoller<'a> {
    pub fn new(store: &'a dyn Store, prices: &'a PriceEnricher<'a>, discovery: &DiscoveryConfig) -> Self {
        Self::with_analytics(store, prices, discovery, AnalyticsConfig::default())
    }

    pub fn with_analytics(
        store: &'a dyn Store,
        prices: &'a PriceEnricher<'a>,
        discovery: &DiscoveryConfig,
        analytics: AnalyticsConfig,
    ) -> Self {
        Self {
            store,
            prices,
            pool_send_threshold: discovery.pool_send_threshold,
            analytics,
        }
    }

    pub async fn run_for_chain(&self, chain: &ChainId) -> Result<u32> {
        let _ = self.pool_send_threshold; // reserved for router-allowlist enrichment, see DESIGN.md
        let now = Utc::now();
        let window_floor = now - Duration::days(WINDOW_DAYS);
        let wallets = self.store.list_wallets(chain).await?;
        let mut updated = 0u32;

        for wallet in &wallets {
            let mut trades = self.store.trades_for_wallet(chain, &wallet.address).await?;
            trades.retain(|t| t.timestamp >= window_floor);
            if trades.is_empty() {
                self.store
                    .put_wallet_stats(WalletStats30D::empty(chain.0.clone(), wallet.address.clone(), now))
                    .await?;
                updated += 1;
                continue;
            }
            sort_trades(&mut trades);

            let positions = analytics::rebuild_positions(&chain.0, &wallet.address, &trades);
            let mut realized_pnl_usd = 0.0;
            let mut unrealized_pnl_usd = 0.0;
            let mut best_multiple = 0.0_f64;
            let mut early_scores: Vec<f64> = Vec::new();
            let mut by_token: std::collections::HashMap<String, Vec<crate::model::Trade>> =
                std::collections::HashMap::new();

            for trade in &trades {
                by_token.entry(trade.token.clone()).or_default().push(trade.clone());
            }

            for (token, token_trades) in &by_token {
                if let Some(position) = positions.get(token) {
                    realized_pnl_usd += position.realized_pnl_usd;
                    let current_price = self.prices.price_of(chain, token).await.ok().flatten();
                    unrealized_pnl_usd += position.unrealized_pnl_usd(current_price);
                }
                best_multiple = best_multiple.max(fifo::best_trade_multiple(token_trades));

                if let Some(token_row) = self.store.get_token(chain, token).await? {
                    let all_buys: Vec<(String, crate::model::Trade)> = self
                        .store
                        .trades_for_token(chain, token)
                        .await?
                        .into_iter()
                        .filter(|t| t.side == Side::Buy)
                        .map(|t| (t.wallet.clone(), t))
                        .collect();
                    let ctx = TokenBuyContext {
                        all_buys,
                        market_cap_estimate: token_row.estimated_market_cap(),
                        volume_24h_usd: token_row.volume_24h_usd,
                    };
                    early_scores.extend(analytics::being_early_scores_for_wallet(token_trades, &ctx));
                }
            }

            let trades_by_token_vec: Vec<Vec<crate::model::Trade>> = by_token.into_values().collect();
            let mut is_bot = bot_heuristics::is_bot(&trades_by_token_vec, WINDOW_DAYS as f64);

            if !is_bot {
                if let Some(cluster) = self.store.cluster_for_wallet(&wallet.address).await? {
                    let mut member_trades = std::collections::HashMap::new();
                    for member in &cluster.wallets {
                        let mut mt = self.store.trades_for_wallet(chain, member).await?;
                        mt.retain(|t| t.timestamp >= window_floor);
                        member_trades.insert(member.clone(), mt);
                    }
                    is_bot = bot_heuristics::is_bundled_cluster(
                        &cluster,
                        &member_trades,
                        self.analytics.bundle_cluster_size,
                        self.analytics.cluster_correlation_threshold,
                    );
                }
            }

            let being_early_median = analytics::being_early::median_score(&early_scores);
            let max_drawdown_pct = analytics::max_drawdown_pct(&trades_by_token_vec);

            let last_7d_floor = now - Duration::days(7);
            let last_7d_daily_avg_pnl_usd =
                analytics::daily_avg_realized_pnl(&trades_by_token_vec, last_7d_floor, now, 7.0);
            let prior_23d_daily_avg_pnl_usd =
                analytics::daily_avg_realized_pnl(&trades_by_token_vec, window_floor, last_7d_floor, 23.0);

            let stats = WalletStats30D {
                chain: chain.0.clone(),
                wallet: wallet.address.clone(),
                trade_count: trades.len() as u32,
                realized_pnl_usd,
                unrealized_pnl_usd,
                best_trade_multiple: best_multiple,
                being_early_median,
                max_drawdown_pct,
                last_7d_daily_avg_pnl_usd,
                prior_23d_daily_avg_pnl_usd,
                is_bot,
                updated_at: now,
            };
            self.store.put_wallet_stats(stats).await?;
            updated += 1;
        }

        info!(chain = %chain, wallets = updated, "stats roller tick complete");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Side, Trade, Wallet};
    use crate::store::InMemoryStore;
    use crate::upstream::AdapterRegistry;

    #[tokio::test]
    async fn recomputes_to_identical_rows_with_no_new_trades() {
        let store = InMemoryStore::new();
        let chain = ChainId::from("eth");
        let now = Utc::now();

        store
            .upsert_wallet(Wallet::new(chain.clone(), "w1".to_string(), now))
            .await
            .unwrap();
        store
            .insert_trade(Trade {
                tx_hash: "0x1".to_string(),
                chain: chain.clone(),
                wallet: "w1".to_string(),
                token: "tok".to_string(),
                side: Side::Buy,
                quantity: 10.0,
                unit_price_usd: 1.0,
                usd_value: 10.0,
                venue: "dex".to_string(),
                timestamp: now - Duration::days(1),
            })
            .await
            .unwrap();

        let registry = AdapterRegistry::default();
        let prices = PriceEnricher::new(&registry, &store);
        let discovery = DiscoveryConfig::default();
        let roller = StatsRoller::new(&store, &prices, &discovery);

        roller.run_for_chain(&chain).await.unwrap();
        let first = store.get_wallet_stats(&chain, "w1").await.unwrap().unwrap();
        roller.run_for_chain(&chain).await.unwrap();
        let second = store.get_wallet_stats(&chain, "w1").await.unwrap().unwrap();

        assert_eq!(first.trade_count, second.trade_count);
        assert!((first.realized_pnl_usd - second.realized_pnl_usd).abs() < 1e-9);
        assert_eq!(first.is_bot, second.is_bot);
    }

    #[tokio::test]
    async fn flags_wallet_bot_via_cluster_correlation() {
        let store = InMemoryStore::new();
        let chain = ChainId::from("eth");
        let now = Utc::now();

        let mut cluster = crate::model::WalletCluster::new("funder1", "w1", now);
        cluster.add_wallet("w2", now);
        cluster.add_wallet("w3", now);
        store.put_cluster(cluster).await.unwrap();

        for (wallet, offset_secs) in [("w1", 0), ("w2", 1), ("w3", 2)] {
            store
                .upsert_wallet(Wallet::new(chain.clone(), wallet.to_string(), now))
                .await
                .unwrap();
            store
                .insert_trade(Trade {
                    tx_hash: format!("tx-{wallet}"),
                    chain: chain.clone(),
                    wallet: wallet.to_string(),
                    token: "tok".to_string(),
                    side: Side::Buy,
                    quantity: 10.0,
                    unit_price_usd: 1.0,
                    usd_value: 10.0,
                    venue: "dex".to_string(),
                    timestamp: now - Duration::hours(1) + Duration::seconds(offset_secs),
                })
                .await
                .unwrap();
        }

        let registry = AdapterRegistry::default();
        let prices = PriceEnricher::new(&registry, &store);
        let discovery = DiscoveryConfig::default();
        let roller = StatsRoller::with_analytics(&store, &prices, &discovery, crate::config::AnalyticsConfig::default());

        roller.run_for_chain(&chain).await.unwrap();
        let stats = store.get_wallet_stats(&chain, "w1").await.unwrap().unwrap();
        assert!(stats.is_bot, "wallet in a tightly correlated cluster should be flagged bot");
    }
}
