//! In-memory reference `Store`, keyed with composite string keys built
//! from chain + address rather than nested maps, which keeps the `DashMap`
//! locking granular and the lookups single-hop.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::error::Result;
use crate::model::{
    AlertRecord, ChainId, Position, SeedToken, Token, Trade, Wallet, WalletCluster,
    WalletStats30D, WatchlistEntry,
};

use super::Store;

fn key2(a: &str, b: &str) -> String {
    format!("{a}\u{1f}{b}")
}

fn key3(a: &str, b: &str, c: &str) -> String {
    format!("{a}\u{1f}{b}\u{1f}{c}")
}

/// Single-process `Store`. Every logical table is its own `DashMap`; there
/// is no cross-table transaction, matching §5's "independent commits" rule.
#[derive(Default)]
pub struct InMemoryStore {
    tokens: DashMap<String, Token>,
    seed_tokens: DashMap<String, Vec<SeedToken>>,
    wallets: DashMap<String, Wallet>,
    trades_by_hash: DashMap<String, Trade>,
    trades_by_wallet: DashMap<String, Vec<String>>,
    trades_by_wallet_token: DashMap<String, Vec<String>>,
    trades_by_token: DashMap<String, Vec<String>>,
    positions: DashMap<String, Position>,
    wallet_stats: DashMap<String, WalletStats30D>,
    watchlist: DashMap<String, WatchlistEntry>,
    clusters: DashMap<String, WalletCluster>,
    alerts_by_dedup: DashMap<String, AlertRecord>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_token(&self, token: Token) -> Result<()> {
        self.tokens.insert(key2(&token.chain.0, &token.address), token);
        Ok(())
    }

    async fn get_token(&self, chain: &ChainId, address: &str) -> Result<Option<Token>> {
        Ok(self.tokens.get(&key2(&chain.0, address)).map(|e| e.clone()))
    }

    async fn list_tokens(&self, chain: &ChainId) -> Result<Vec<Token>> {
        Ok(self
            .tokens
            .iter()
            .filter(|e| &e.value().chain == chain)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn append_seed_token(&self, seed: SeedToken) -> Result<()> {
        self.seed_tokens
            .entry(key2(&seed.chain.0, &seed.address))
            .or_default()
            .push(seed);
        Ok(())
    }

    async fn recent_seed_tokens(
        &self,
        chain: &ChainId,
        lookback: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<SeedToken>> {
        let floor = now - lookback;
        let mut out = Vec::new();
        for entry in self.seed_tokens.iter() {
            for seed in entry.value() {
                if &seed.chain == chain && seed.snapshot_ts >= floor {
                    out.push(seed.clone());
                }
            }
        }
        Ok(out)
    }

    async fn upsert_wallet(&self, wallet: Wallet) -> Result<()> {
        self.wallets.insert(key2(&wallet.chain.0, &wallet.address), wallet);
        Ok(())
    }

    async fn get_wallet(&self, chain: &ChainId, address: &str) -> Result<Option<Wallet>> {
        Ok(self.wallets.get(&key2(&chain.0, address)).map(|e| e.clone()))
    }

    async fn list_wallets(&self, chain: &ChainId) -> Result<Vec<Wallet>> {
        Ok(self
            .wallets
            .iter()
            .filter(|e| &e.value().chain == chain)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn insert_trade(&self, trade: Trade) -> Result<bool> {
        if self.trades_by_hash.contains_key(&trade.tx_hash) {
            return Ok(false);
        }
        let hash = trade.tx_hash.clone();
        let wallet_key = key2(&trade.chain.0, &trade.wallet);
        let wallet_token_key = key3(&trade.chain.0, &trade.wallet, &trade.token);
        let token_key = key2(&trade.chain.0, &trade.token);

        self.trades_by_hash.insert(hash.clone(), trade);
        self.trades_by_wallet.entry(wallet_key).or_default().push(hash.clone());
        self.trades_by_wallet_token
            .entry(wallet_token_key)
            .or_default()
            .push(hash.clone());
        self.trades_by_token.entry(token_key).or_default().push(hash);
        Ok(true)
    }

    async fn trades_for_wallet(&self, chain: &ChainId, wallet: &str) -> Result<Vec<Trade>> {
        Ok(self
            .trades_by_wallet
            .get(&key2(&chain.0, wallet))
            .map(|hashes| {
                hashes
                    .iter()
                    .filter_map(|h| self.trades_by_hash.get(h).map(|t| t.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn trades_for_wallet_token(
        &self,
        chain: &ChainId,
        wallet: &str,
        token: &str,
    ) -> Result<Vec<Trade>> {
        Ok(self
            .trades_by_wallet_token
            .get(&key3(&chain.0, wallet, token))
            .map(|hashes| {
                hashes
                    .iter()
                    .filter_map(|h| self.trades_by_hash.get(h).map(|t| t.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn trades_for_token(&self, chain: &ChainId, token: &str) -> Result<Vec<Trade>> {
        Ok(self
            .trades_by_token
            .get(&key2(&chain.0, token))
            .map(|hashes| {
                hashes
                    .iter()
                    .filter_map(|h| self.trades_by_hash.get(h).map(|t| t.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn trade_exists(&self, tx_hash: &str) -> Result<bool> {
        Ok(self.trades_by_hash.contains_key(tx_hash))
    }

    async fn last_trade_price(&self, chain: &ChainId, token: &str) -> Result<Option<f64>> {
        let trades = self.trades_for_token(chain, token).await?;
        Ok(trades
            .iter()
            .max_by_key(|t| t.timestamp)
            .map(|t| t.unit_price_usd))
    }

    async fn put_position(&self, position: Position) -> Result<()> {
        self.positions.insert(
            key3(&position.chain, &position.wallet, &position.token),
            position,
        );
        Ok(())
    }

    async fn get_position(
        &self,
        chain: &ChainId,
        wallet: &str,
        token: &str,
    ) -> Result<Option<Position>> {
        Ok(self
            .positions
            .get(&key3(&chain.0, wallet, token))
            .map(|e| e.clone()))
    }

    async fn put_wallet_stats(&self, stats: WalletStats30D) -> Result<()> {
        self.wallet_stats
            .insert(key2(&stats.chain, &stats.wallet), stats);
        Ok(())
    }

    async fn get_wallet_stats(
        &self,
        chain: &ChainId,
        wallet: &str,
    ) -> Result<Option<WalletStats30D>> {
        Ok(self
            .wallet_stats
            .get(&key2(&chain.0, wallet))
            .map(|e| e.clone()))
    }

    async fn all_wallet_stats(&self, chain: &ChainId) -> Result<Vec<WalletStats30D>> {
        Ok(self
            .wallet_stats
            .iter()
            .filter(|e| e.value().chain == chain.0)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn put_watchlist_entry(&self, entry: WatchlistEntry) -> Result<()> {
        self.watchlist.insert(key2(&entry.chain, &entry.wallet), entry);
        Ok(())
    }

    async fn get_watchlist_entry(
        &self,
        chain: &ChainId,
        wallet: &str,
    ) -> Result<Option<WatchlistEntry>> {
        Ok(self
            .watchlist
            .get(&key2(&chain.0, wallet))
            .map(|e| e.clone()))
    }

    async fn active_watchlist(&self, chain: &ChainId) -> Result<Vec<WatchlistEntry>> {
        Ok(self
            .watchlist
            .iter()
            .filter(|e| e.value().chain == chain.0 && e.value().is_active())
            .map(|e| e.value().clone())
            .collect())
    }

    async fn put_cluster(&self, cluster: WalletCluster) -> Result<()> {
        self.clusters.insert(cluster.cluster_id.clone(), cluster);
        Ok(())
    }

    async fn cluster_for_wallet(&self, wallet: &str) -> Result<Option<WalletCluster>> {
        Ok(self
            .clusters
            .iter()
            .find(|e| e.value().contains(wallet))
            .map(|e| e.value().clone()))
    }

    async fn insert_alert(&self, alert: AlertRecord) -> Result<()> {
        self.alerts_by_dedup.insert(alert.dedup_key.clone(), alert);
        Ok(())
    }

    async fn alert_by_dedup_key(&self, dedup_key: &str) -> Result<Option<AlertRecord>> {
        Ok(self.alerts_by_dedup.get(dedup_key).map(|e| e.clone()))
    }
}
