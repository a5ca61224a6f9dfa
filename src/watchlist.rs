//! Watchlist Maintainer (C7, §4.7)
//!
//! Runs daily at a configured wall-clock hour. Computes a composite score
//! per wallet from percentile-ranked inputs, applies the add/remove rules,
//! and caps the active set at `top_n` per chain. Never removes a wallet
//! mid-confluence (§4.7) — the caller passes in the set of wallets
//! currently Armed/Fired in C9 so this pass can defer their removal.

use std::collections::HashSet;

use chrono::Utc;
use tracing::info;

use crate::config::WatchlistConfig;
use crate::error::Result;
use crate::model::{ChainId, WalletStats30D, WatchlistEntry, WatchlistStatus};
use crate::store::Store;

/// Empirical percentile rank of `value` among `population`, scaled to
/// `[0, 100]`. A clamp-to-range normalization generalized from a fixed
/// min/max to an empirical distribution.
pub fn percentile_rank(value: f64, population: &[f64]) -> f64 {
    if population.is_empty() {
        return 0.0;
    }
    let below = population.iter().filter(|&&v| v < value).count();
    (below as f64 / population.len() as f64 * 100.0).clamp(0.0, 100.0)
}

pub fn composite_score(stats: &WalletStats30D, all_stats: &[WalletStats30D], weights: (f64, f64, f64)) -> f64 {
    let unrealized: Vec<f64> = all_stats.iter().map(|s| s.unrealized_pnl_usd).collect();
    let activity: Vec<f64> = all_stats.iter().map(|s| s.trade_count as f64).collect();
    let early: Vec<f64> = all_stats.iter().map(|s| s.being_early_median).collect();

    let (w_pnl, w_act, w_early) = weights;
    let p_pnl = percentile_rank(stats.unrealized_pnl_usd, &unrealized);
    let p_act = percentile_rank(stats.trade_count as f64, &activity);
    let p_early = percentile_rank(stats.being_early_median, &early);

    (w_pnl * p_pnl + w_act * p_act + w_early * p_early).clamp(0.0, 100.0)
}

pub struct WatchlistMaintainer<'a> {
    store: &'a dyn Store,
    config: &'a WatchlistConfig,
}

impl<'a> WatchlistMaintainer<'a> {
    pub fn new(store: &'a dyn Store, config: &'a WatchlistConfig) -> Self {
        Self { store, config }
    }

    /// `wallets_in_active_confluence` holds addresses that must not be
    /// removed on this run regardless of the remove rules (§4.7).
    pub async fn run_for_chain(
        &self,
        chain: &ChainId,
        wallets_in_active_confluence: &HashSet<String>,
    ) -> Result<WatchlistRunOutcome> {
        let now = Utc::now();
        let all_stats = self.store.all_wallet_stats(chain).await?;
        let mut outcome = WatchlistRunOutcome::default();

        let mut scored: Vec<(WalletStats30D, f64)> = all_stats
            .iter()
            .filter(|s| !s.is_bot)
            .map(|s| {
                let score = composite_score(s, &all_stats, self.config.weights);
                (s.clone(), score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

        let top_n_threshold: HashSet<String> = scored
            .iter()
            .take(self.config.top_n)
            .map(|(s, _)| s.wallet.clone())
            .collect();

        for (stats, score) in &scored {
            let existing = self.store.get_watchlist_entry(chain, &stats.wallet).await?;
            let eligible_to_add = top_n_threshold.contains(&stats.wallet)
                && stats.trade_count >= self.config.min_trades
                && stats.best_trade_multiple >= self.config.min_multiple;

            // Remove rule 5 (§4.7): recent daily PnL has decayed to less
            // than half the prior period's average. Only applies when the
            // prior baseline was actually profitable; a negative baseline
            // makes "< 0.5x" directionally meaningless.
            let pnl_decayed = stats.prior_23d_daily_avg_pnl_usd > 0.0
                && stats.last_7d_daily_avg_pnl_usd < 0.5 * stats.prior_23d_daily_avg_pnl_usd;

            let should_remove = if wallets_in_active_confluence.contains(&stats.wallet) {
                false
            } else {
                stats.unrealized_pnl_usd < self.config.neg_pnl_threshold
                    || stats.trade_count == 0
                    || stats.being_early_median < self.config.remove_min_early_score
                    || stats.best_trade_multiple < self.config.remove_min_multiple
                    || pnl_decayed
            };

            let new_status = match existing {
                Some(ref entry) if entry.is_active() && should_remove => {
                    outcome.removed += 1;
                    WatchlistStatus::Removed
                }
                Some(ref entry) if entry.is_active() => WatchlistStatus::Active,
                _ if eligible_to_add && !should_remove => {
                    outcome.added += 1;
                    WatchlistStatus::Active
                }
                Some(ref entry) => entry.status,
                None => WatchlistStatus::Pending,
            };

            self.store
                .put_watchlist_entry(WatchlistEntry {
                    chain: chain.0.clone(),
                    wallet: stats.wallet.clone(),
                    composite_score: *score,
                    status: new_status,
                    added_at: existing.as_ref().map(|e| e.added_at).unwrap_or(now),
                    last_evaluated_at: now,
                })
                .await?;
        }

        let active_count = self.store.active_watchlist(chain).await?.len();
        info!(
            chain = %chain,
            active = active_count,
            added = outcome.added,
            removed = outcome.removed,
            "watchlist maintainer run complete"
        );
        outcome.active_count = active_count;
        Ok(outcome)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WatchlistRunOutcome {
    pub added: u32,
    pub removed: u32,
    pub active_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(wallet: &str, pnl: f64, trades: u32, early: f64, multiple: f64) -> WalletStats30D {
        WalletStats30D {
            chain: "eth".to_string(),
            wallet: wallet.to_string(),
            trade_count: trades,
            realized_pnl_usd: 0.0,
            unrealized_pnl_usd: pnl,
            best_trade_multiple: multiple,
            being_early_median: early,
            max_drawdown_pct: 0.0,
            last_7d_daily_avg_pnl_usd: 0.0,
            prior_23d_daily_avg_pnl_usd: 0.0,
            is_bot: false,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn percentile_rank_of_highest_value_is_100() {
        let pop = vec![1.0, 2.0, 3.0];
        assert_eq!(percentile_rank(3.0, &pop), 100.0);
        assert_eq!(percentile_rank(1.0, &pop), 0.0);
    }

    #[tokio::test]
    async fn caps_active_watchlist_at_top_n() {
        let store = crate::store::InMemoryStore::new();
        let chain = ChainId::from("eth");
        for i in 0..5 {
            store
                .put_wallet_stats(stats(&format!("w{i}"), 100.0 + i as f64, 10, 80.0, 3.0))
                .await
                .unwrap();
        }
        let mut config = WatchlistConfig::default();
        config.top_n = 2;
        let maintainer = WatchlistMaintainer::new(&store, &config);
        let outcome = maintainer.run_for_chain(&chain, &HashSet::new()).await.unwrap();
        assert!(outcome.active_count <= 2);
    }

    #[tokio::test]
    async fn never_removes_wallet_in_active_confluence() {
        let store = crate::store::InMemoryStore::new();
        let chain = ChainId::from("eth");
        store
            .put_watchlist_entry(WatchlistEntry {
                chain: "eth".to_string(),
                wallet: "w0".to_string(),
                composite_score: 90.0,
                status: WatchlistStatus::Active,
                added_at: Utc::now(),
                last_evaluated_at: Utc::now(),
            })
            .await
            .unwrap();
        store
            .put_wallet_stats(stats("w0", -100.0, 0, 0.0, 0.0))
            .await
            .unwrap();
        let config = WatchlistConfig::default();
        let maintainer = WatchlistMaintainer::new(&store, &config);
        let mut active = HashSet::new();
        active.insert("w0".to_string());
        maintainer.run_for_chain(&chain, &active).await.unwrap();
        let entry = store.get_watchlist_entry(&chain, "w0").await.unwrap().unwrap();
        assert_eq!(entry.status, WatchlistStatus::Active);
    }

    #[tokio::test]
    async fn removes_wallet_whose_recent_pnl_has_decayed() {
        let store = crate::store::InMemoryStore::new();
        let chain = ChainId::from("eth");
        store
            .put_watchlist_entry(WatchlistEntry {
                chain: "eth".to_string(),
                wallet: "w0".to_string(),
                composite_score: 90.0,
                status: WatchlistStatus::Active,
                added_at: Utc::now(),
                last_evaluated_at: Utc::now(),
            })
            .await
            .unwrap();
        let mut decayed = stats("w0", 50.0, 10, 80.0, 3.0);
        decayed.prior_23d_daily_avg_pnl_usd = 100.0;
        decayed.last_7d_daily_avg_pnl_usd = 10.0; // well under half of 100
        store.put_wallet_stats(decayed).await.unwrap();
        let config = WatchlistConfig::default();
        let maintainer = WatchlistMaintainer::new(&store, &config);
        maintainer.run_for_chain(&chain, &HashSet::new()).await.unwrap();
        let entry = store.get_watchlist_entry(&chain, "w0").await.unwrap().unwrap();
        assert_eq!(entry.status, WatchlistStatus::Removed);
    }
}
