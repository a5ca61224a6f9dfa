//! Persistence access pattern (§6.1, §9)
//!
//! `Store` is the only strongly-consistent shared resource (§5): every
//! worker task uses it independently and commits per-entity. In
//! production this is backed by a relational database; the
//! `InMemoryStore` reference implementation here exists for tests and
//! single-node deployments, and is the thing Scenario tests (§8) run
//! against.
//!
//! `TimeWindowStore` stands in for the external Redis-like sorted-set
//! store that backs ConfluenceKey membership (§4.9, §9): score = event
//! timestamp, member = wallet address, one key per `(chain, side, token)`.

mod memory;
mod window;

pub use memory::InMemoryStore;
pub use window::InMemoryTimeWindowStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{
    AlertRecord, ChainId, Position, SeedToken, Token, Trade, Wallet, WalletCluster,
    WalletStats30D, WatchlistEntry,
};

/// The logical tables of §6: `tokens`, `seed_tokens`, `wallets`, `trades`,
/// `positions`, `wallet_stats_30d`, `watchlist`, `alerts`, plus the
/// advisory `wallet_clusters` table used only by the cluster-aware bot
/// heuristic — never persisted as primary truth.
#[async_trait]
pub trait Store: Send + Sync {
    async fn upsert_token(&self, token: Token) -> Result<()>;
    async fn get_token(&self, chain: &ChainId, address: &str) -> Result<Option<Token>>;
    async fn list_tokens(&self, chain: &ChainId) -> Result<Vec<Token>>;

    async fn append_seed_token(&self, seed: SeedToken) -> Result<()>;
    /// Seed tokens whose latest snapshot is within `lookback` of `now` (§4.3).
    async fn recent_seed_tokens(
        &self,
        chain: &ChainId,
        lookback: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<SeedToken>>;

    async fn upsert_wallet(&self, wallet: Wallet) -> Result<()>;
    async fn get_wallet(&self, chain: &ChainId, address: &str) -> Result<Option<Wallet>>;
    async fn list_wallets(&self, chain: &ChainId) -> Result<Vec<Wallet>>;

    /// Idempotent on `tx_hash` (§3 Trade invariant). Returns `true` if this
    /// call actually inserted a new row (`false` if it was a duplicate).
    async fn insert_trade(&self, trade: Trade) -> Result<bool>;
    async fn trades_for_wallet(&self, chain: &ChainId, wallet: &str) -> Result<Vec<Trade>>;
    async fn trades_for_wallet_token(
        &self,
        chain: &ChainId,
        wallet: &str,
        token: &str,
    ) -> Result<Vec<Trade>>;
    async fn trades_for_token(&self, chain: &ChainId, token: &str) -> Result<Vec<Trade>>;
    async fn trade_exists(&self, tx_hash: &str) -> Result<bool>;
    /// Most recent trade price for a token, used as C4's fallback (§4.4).
    async fn last_trade_price(&self, chain: &ChainId, token: &str) -> Result<Option<f64>>;

    async fn put_position(&self, position: Position) -> Result<()>;
    async fn get_position(&self, chain: &ChainId, wallet: &str, token: &str) -> Result<Option<Position>>;

    async fn put_wallet_stats(&self, stats: WalletStats30D) -> Result<()>;
    async fn get_wallet_stats(&self, chain: &ChainId, wallet: &str) -> Result<Option<WalletStats30D>>;
    async fn all_wallet_stats(&self, chain: &ChainId) -> Result<Vec<WalletStats30D>>;

    async fn put_watchlist_entry(&self, entry: WatchlistEntry) -> Result<()>;
    async fn get_watchlist_entry(&self, chain: &ChainId, wallet: &str) -> Result<Option<WatchlistEntry>>;
    async fn active_watchlist(&self, chain: &ChainId) -> Result<Vec<WatchlistEntry>>;

    async fn put_cluster(&self, cluster: WalletCluster) -> Result<()>;
    async fn cluster_for_wallet(&self, wallet: &str) -> Result<Option<WalletCluster>>;

    async fn insert_alert(&self, alert: AlertRecord) -> Result<()>;
    async fn alert_by_dedup_key(&self, dedup_key: &str) -> Result<Option<AlertRecord>>;
}

/// Sorted-set member used by `TimeWindowStore`.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowMember {
    pub wallet: String,
    pub event_ts: DateTime<Utc>,
}

#[async_trait]
pub trait TimeWindowStore: Send + Sync {
    /// Add `(wallet, ts)` to the bag for `key`, evict members older than
    /// `window`, and set the key's TTL to `window` (§4.9).
    async fn record(
        &self,
        key: &str,
        wallet: &str,
        ts: DateTime<Utc>,
        window: chrono::Duration,
    ) -> Result<()>;

    /// Current distinct-wallet membership for `key` within `window` of `now`.
    async fn members(
        &self,
        key: &str,
        window: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<WindowMember>>;
}
