//! Token and SeedToken (§3)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ChainId;

/// Identity `(chain_id, token_address)`. Created on first ingestion by C2,
/// mutated only by C2/C4, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub chain: ChainId,
    pub address: String,
    pub symbol: String,
    pub display_name: String,
    pub liquidity_usd: f64,
    pub volume_24h_usd: f64,
    pub last_price_usd: Option<f64>,
    pub tax_buy_pct: f64,
    pub tax_sell_pct: f64,
    pub is_honeypot: bool,
    pub created_at: DateTime<Utc>,
}

impl Token {
    /// Market cap estimate used by the Being-Early score when an explicit
    /// market cap is unavailable: liquidity * 3 (§4.5).
    pub fn estimated_market_cap(&self) -> f64 {
        self.liquidity_usd * 3.0
    }
}

/// Append-only snapshot `(chain_id, token_address, source, snapshot_ts)`.
/// Records that `token` appeared in `source`'s trending list at a point in
/// time. Produced by C2, consumed by C3 to pick discovery targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedToken {
    pub chain: ChainId,
    pub address: String,
    pub source: String,
    pub snapshot_ts: DateTime<Utc>,
}
