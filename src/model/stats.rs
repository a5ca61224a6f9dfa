//! WalletStats30D (§3) — rolling 30-day aggregates, recomputed in full by C6.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletStats30D {
    pub chain: String,
    pub wallet: String,
    pub trade_count: u32,
    pub realized_pnl_usd: f64,
    pub unrealized_pnl_usd: f64,
    /// Max `sell_price / paired_buy_price` across closed lots (realized only, §9).
    pub best_trade_multiple: f64,
    pub being_early_median: f64,
    pub max_drawdown_pct: f64,
    /// Daily-average realized PnL over the last 7 days, used by the
    /// watchlist's remove rule 5 (§4.7).
    pub last_7d_daily_avg_pnl_usd: f64,
    /// Daily-average realized PnL over the 23 days prior to the last 7
    /// (i.e. days 8-30 of the window), the baseline remove rule 5 compares
    /// against.
    pub prior_23d_daily_avg_pnl_usd: f64,
    pub is_bot: bool,
    pub updated_at: DateTime<Utc>,
}

impl WalletStats30D {
    pub fn empty(chain: impl Into<String>, wallet: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            chain: chain.into(),
            wallet: wallet.into(),
            trade_count: 0,
            realized_pnl_usd: 0.0,
            unrealized_pnl_usd: 0.0,
            best_trade_multiple: 0.0,
            being_early_median: 0.0,
            max_drawdown_pct: 0.0,
            last_7d_daily_avg_pnl_usd: 0.0,
            prior_23d_daily_avg_pnl_usd: 0.0,
            is_bot: false,
            updated_at: now,
        }
    }
}
