//! AlertRecord (§3, §4.9) — append-only ledger of emitted alerts, keyed by
//! the content-hash dedup key described in §4.9.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    BuyConfluence,
    SellConfluence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub dedup_key: String,
    pub kind: AlertKind,
    pub chain: String,
    pub token: String,
    pub wallets: Vec<String>,
    pub window_ms: i64,
    /// Weights in effect when this alert was emitted, for causal
    /// attribution if adaptive weighting is ever enabled (§9). Fixed
    /// defaults in this implementation (see DESIGN.md).
    pub weights_snapshot: (f64, f64, f64),
    pub emitted_at: DateTime<Utc>,
}
