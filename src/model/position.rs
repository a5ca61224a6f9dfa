//! Position (§3) — derived FIFO lot state, rebuilt from Trades.
//!
//! Positions are never a primary source of truth (§9): they are a
//! materialized view keyed by `(chain, wallet, token)`, rebuilt
//! deterministically from the trade history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single open FIFO lot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lot {
    pub qty_remaining: f64,
    pub unit_cost_usd: f64,
    pub acquired_ts: DateTime<Utc>,
}

/// Identity `(chain, wallet, token)`. A FIFO queue of open lots plus a
/// running realized-PnL total.
///
/// Invariant: sum of `qty_remaining` >= 0. A sell that exceeds open
/// quantity clamps to available; the excess is realized at zero cost with
/// a warning (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub chain: String,
    pub wallet: String,
    pub token: String,
    pub lots: Vec<Lot>,
    pub realized_pnl_usd: f64,
    /// Watermark: id (tx_hash) of the last trade folded into this position.
    pub rebuilt_through_tx: Option<String>,
}

impl Position {
    pub fn new(chain: String, wallet: String, token: String) -> Self {
        Self {
            chain,
            wallet,
            token,
            lots: Vec::new(),
            realized_pnl_usd: 0.0,
            rebuilt_through_tx: None,
        }
    }

    pub fn open_quantity(&self) -> f64 {
        self.lots.iter().map(|l| l.qty_remaining).sum()
    }

    /// Unrealized PnL using a current price; `None` price contributes 0,
    /// per C4's "never fabricate" rule (§4.4, §8 boundary behavior).
    pub fn unrealized_pnl_usd(&self, current_price_usd: Option<f64>) -> f64 {
        match current_price_usd {
            Some(price) => self
                .lots
                .iter()
                .map(|l| l.qty_remaining * (price - l.unit_cost_usd))
                .sum(),
            None => 0.0,
        }
    }
}
