//! Trade (§3)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ChainId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }
}

/// Identity `tx_hash` (unique within a chain). Produced by C3 and C8;
/// never mutated after insert.
///
/// Invariants: `side` is never null (enforced by the type); `quantity` is
/// non-negative; a given `tx_hash` is inserted at most once (idempotent
/// ingest — enforced by the store, see `Store::insert_trade`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub tx_hash: String,
    pub chain: ChainId,
    pub wallet: String,
    pub token: String,
    pub side: Side,
    pub quantity: f64,
    pub unit_price_usd: f64,
    pub usd_value: f64,
    pub venue: String,
    pub timestamp: DateTime<Utc>,
}

impl Trade {
    /// Sort key used everywhere trades must be processed deterministically:
    /// `(timestamp asc, tx_hash asc)` (§5).
    pub fn sort_key(&self) -> (DateTime<Utc>, &str) {
        (self.timestamp, self.tx_hash.as_str())
    }
}

/// Deterministically order a mutable slice of trades by `(timestamp, tx_hash)`.
pub fn sort_trades(trades: &mut [Trade]) {
    trades.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}
