//! Analytics Engine (C5, §4.5) — three pure functions over trade history:
//! FIFO PnL, Being-Early scoring, and bot heuristics. Nothing in this
//! module touches the store or the network; callers (C6's stats roller)
//! gather the inputs and persist the outputs.

pub mod being_early;
pub mod bot_heuristics;
pub mod fifo;

use std::collections::HashMap;

use crate::model::{sort_trades, Position, Side, Trade};

pub use being_early::BuySignal;

/// Buyer-rank context needed for Being-Early scoring: every buy of a token
/// across all wallets, used to compute `rank_pct` for one wallet's buys.
pub struct TokenBuyContext {
    /// All buys of the token, in the order first observed, one entry per
    /// `(wallet, trade)`.
    pub all_buys: Vec<(String, Trade)>,
    pub market_cap_estimate: f64,
    pub volume_24h_usd: f64,
}

impl TokenBuyContext {
    /// `rank_pct` for a given buy: its 0-based position among `all_buys`
    /// (ordered by timestamp) divided by the total buyer count.
    fn rank_pct_for(&self, trade: &Trade) -> f64 {
        let mut ordered: Vec<&Trade> = self.all_buys.iter().map(|(_, t)| t).collect();
        ordered.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        let total = ordered.len().max(1);
        let rank = ordered
            .iter()
            .position(|t| t.tx_hash == trade.tx_hash)
            .unwrap_or(total - 1);
        rank as f64 / total as f64
    }
}

/// Being-Early scores for one wallet's buys of one token, using shared
/// market context across all buyers of that token.
pub fn being_early_scores_for_wallet(trades: &[Trade], ctx: &TokenBuyContext) -> Vec<f64> {
    trades
        .iter()
        .filter(|t| t.side == Side::Buy)
        .map(|t| {
            let volume_participation = if ctx.volume_24h_usd > 0.0 {
                t.usd_value / ctx.volume_24h_usd
            } else {
                0.0
            };
            being_early::score_buy(&BuySignal {
                rank_pct: ctx.rank_pct_for(t),
                mcap_at_buy: ctx.market_cap_estimate,
                volume_participation,
            })
        })
        .collect()
}

/// Rebuild every `(token -> Position)` for one wallet from its full trade
/// history. Trades are grouped by token and sorted deterministically
/// before FIFO processing (§5 ordering rule).
pub fn rebuild_positions(chain: &str, wallet: &str, trades: &[Trade]) -> HashMap<String, Position> {
    let mut by_token: HashMap<String, Vec<Trade>> = HashMap::new();
    for trade in trades {
        by_token.entry(trade.token.clone()).or_default().push(trade.clone());
    }

    by_token
        .into_iter()
        .map(|(token, mut token_trades)| {
            sort_trades(&mut token_trades);
            let position = fifo::rebuild_position(chain, wallet, &token, &token_trades);
            (token, position)
        })
        .collect()
}

/// Max drawdown %: the largest peak-to-trough decline in a wallet's
/// running realized-PnL equity curve across all its tokens (§3
/// `WalletStats30D`). The curve starts at 0 and accumulates each sell's
/// realized delta in timestamp order; the peak is floored at $1 so an
/// always-losing wallet's tiny peak doesn't produce a meaningless
/// near-infinite drawdown (see DESIGN.md for the reasoning).
pub fn max_drawdown_pct(trades_by_token: &[Vec<Trade>]) -> f64 {
    let mut deltas: Vec<(chrono::DateTime<chrono::Utc>, f64)> = trades_by_token
        .iter()
        .flat_map(|trades| fifo::realized_pnl_deltas(trades))
        .collect();
    deltas.sort_by_key(|(ts, _)| *ts);

    let mut equity = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut max_dd = 0.0_f64;
    for (_, delta) in deltas {
        equity += delta;
        peak = peak.max(equity);
        let floor = peak.max(1.0);
        max_dd = max_dd.max(((peak - equity) / floor * 100.0).max(0.0));
    }
    max_dd
}

/// Daily-average realized PnL over `[floor, now)`, used for the watchlist's
/// last-7-day-vs-prior-23-day remove rule (§4.7 remove rule 5).
pub fn daily_avg_realized_pnl(
    trades_by_token: &[Vec<Trade>],
    floor: chrono::DateTime<chrono::Utc>,
    ceiling: chrono::DateTime<chrono::Utc>,
    days: f64,
) -> f64 {
    let total: f64 = trades_by_token
        .iter()
        .flat_map(|trades| fifo::realized_pnl_deltas(trades))
        .filter(|(ts, _)| *ts >= floor && *ts < ceiling)
        .map(|(_, delta)| delta)
        .sum();
    total / days.max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChainId;
    use chrono::{TimeZone, Utc};

    fn buy(hash: &str, secs: i64, usd_value: f64) -> Trade {
        Trade {
            tx_hash: hash.to_string(),
            chain: ChainId::from("eth"),
            wallet: "w".to_string(),
            token: "T".to_string(),
            side: Side::Buy,
            quantity: 1.0,
            unit_price_usd: usd_value,
            usd_value,
            venue: "uniswap".to_string(),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn first_buyer_gets_best_rank_component() {
        let first = buy("a", 0, 10.0);
        let second = buy("b", 10, 10.0);
        let ctx = TokenBuyContext {
            all_buys: vec![("w1".to_string(), first.clone()), ("w2".to_string(), second.clone())],
            market_cap_estimate: 500_000.0,
            volume_24h_usd: 1000.0,
        };
        let scores_first = being_early_scores_for_wallet(&[first], &ctx);
        let scores_second = being_early_scores_for_wallet(&[second], &ctx);
        assert!(scores_first[0] > scores_second[0]);
    }

    fn trade(hash: &str, side: Side, qty: f64, price: f64, secs: i64) -> Trade {
        Trade {
            tx_hash: hash.to_string(),
            chain: ChainId::from("eth"),
            wallet: "w".to_string(),
            token: "T".to_string(),
            side,
            quantity: qty,
            unit_price_usd: price,
            usd_value: qty * price,
            venue: "uniswap".to_string(),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn drawdown_reflects_peak_to_trough_equity_decline() {
        let token_trades = vec![
            trade("b1", Side::Buy, 10.0, 1.0, 0),
            trade("s1", Side::Sell, 10.0, 3.0, 10), // +20, equity 20, peak 20
            trade("b2", Side::Buy, 10.0, 3.0, 20),
            trade("s2", Side::Sell, 10.0, 1.0, 30), // -20, equity 0, trough
        ];
        let dd = max_drawdown_pct(&[token_trades]);
        assert!((dd - 100.0).abs() < 1e-9, "expected full round-trip drawdown, got {dd}");
    }

    #[test]
    fn no_sells_means_no_drawdown() {
        let token_trades = vec![trade("b1", Side::Buy, 10.0, 1.0, 0)];
        assert_eq!(max_drawdown_pct(&[token_trades]), 0.0);
    }
}
