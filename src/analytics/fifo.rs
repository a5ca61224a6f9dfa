//! FIFO PnL accounting (C5, §4.5, §8 property 2, Scenario E)
//!
//! A queue of lots, popped from the head on sell. Matching is
//! quantity-aware rather than whole-trade, since a sell here rarely closes
//! a buy exactly.

use crate::model::{Lot, Position, Side, Trade};

/// Rebuild a `Position` from a wallet's full trade history on one token.
/// Trades must already be in `(timestamp asc, tx_hash asc)` order — callers
/// use `model::trade::sort_trades` before calling this (§5 ordering rule).
///
/// A sell whose quantity exceeds all open lots is matched at zero cost for
/// the residual, per §4.5: real sells can precede observed buys when
/// history is partial.
pub fn rebuild_position(chain: &str, wallet: &str, token: &str, trades: &[Trade]) -> Position {
    let mut position = Position::new(chain.to_string(), wallet.to_string(), token.to_string());

    for trade in trades {
        match trade.side {
            Side::Buy => {
                position.lots.push(Lot {
                    qty_remaining: trade.quantity,
                    unit_cost_usd: trade.unit_price_usd,
                    acquired_ts: trade.timestamp,
                });
            }
            Side::Sell => {
                let mut remaining = trade.quantity;
                while remaining > 0.0 {
                    let Some(lot) = position.lots.first_mut() else {
                        // Residual beyond all known lots: realize at zero
                        // cost and stop. Not logged here; the caller
                        // decides whether to surface a warning.
                        position.realized_pnl_usd += (trade.unit_price_usd - 0.0) * remaining;
                        remaining = 0.0;
                        break;
                    };
                    let matched = remaining.min(lot.qty_remaining);
                    position.realized_pnl_usd +=
                        matched * (trade.unit_price_usd - lot.unit_cost_usd);
                    lot.qty_remaining -= matched;
                    remaining -= matched;
                    if lot.qty_remaining <= f64::EPSILON {
                        position.lots.remove(0);
                    }
                }
            }
        }
        position.rebuilt_through_tx = Some(trade.tx_hash.clone());
    }

    position
}

/// Best trade multiple across closed lots: `max(sell_price / lot_cost)`,
/// realized only per the documented Open Question decision (§9, DESIGN.md).
pub fn best_trade_multiple(trades: &[Trade]) -> f64 {
    let mut lots: Vec<Lot> = Vec::new();
    let mut best = 0.0_f64;

    for trade in trades {
        match trade.side {
            Side::Buy => lots.push(Lot {
                qty_remaining: trade.quantity,
                unit_cost_usd: trade.unit_price_usd,
                acquired_ts: trade.timestamp,
            }),
            Side::Sell => {
                let mut remaining = trade.quantity;
                while remaining > 0.0 {
                    let Some(lot) = lots.first_mut() else { break };
                    if lot.unit_cost_usd > 0.0 {
                        best = best.max(trade.unit_price_usd / lot.unit_cost_usd);
                    }
                    let matched = remaining.min(lot.qty_remaining);
                    lot.qty_remaining -= matched;
                    remaining -= matched;
                    if lot.qty_remaining <= f64::EPSILON {
                        lots.remove(0);
                    }
                }
            }
        }
    }

    best
}

/// Per-sell realized-PnL deltas, in trade order, for one wallet's trades
/// on one token. Used to build a cross-token equity curve for drawdown and
/// recent-PnL trend (§3 `WalletStats30D`, §4.7 remove rule 5). Trades must
/// already be sorted per `rebuild_position`'s contract.
pub fn realized_pnl_deltas(trades: &[Trade]) -> Vec<(chrono::DateTime<chrono::Utc>, f64)> {
    let mut lots: Vec<Lot> = Vec::new();
    let mut deltas = Vec::new();

    for trade in trades {
        match trade.side {
            Side::Buy => lots.push(Lot {
                qty_remaining: trade.quantity,
                unit_cost_usd: trade.unit_price_usd,
                acquired_ts: trade.timestamp,
            }),
            Side::Sell => {
                let mut remaining = trade.quantity;
                let mut delta = 0.0;
                while remaining > 0.0 {
                    let Some(lot) = lots.first_mut() else {
                        delta += trade.unit_price_usd * remaining;
                        remaining = 0.0;
                        break;
                    };
                    let matched = remaining.min(lot.qty_remaining);
                    delta += matched * (trade.unit_price_usd - lot.unit_cost_usd);
                    lot.qty_remaining -= matched;
                    remaining -= matched;
                    if lot.qty_remaining <= f64::EPSILON {
                        lots.remove(0);
                    }
                }
                deltas.push((trade.timestamp, delta));
            }
        }
    }

    deltas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChainId;
    use chrono::{TimeZone, Utc};

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
    fn scenario_e_partial_history_fifo() {
        let trades = vec![
            trade("b1", Side::Buy, 100.0, 1.0, 0),
            trade("b2", Side::Buy, 50.0, 2.0, 10),
            trade("s1", Side::Sell, 120.0, 3.0, 20),
        ];
        let position = rebuild_position("eth", "w", "T", &trades);
        assert!((position.realized_pnl_usd - 220.0).abs() < 1e-9);
        assert_eq!(position.lots.len(), 1);
        assert!((position.lots[0].qty_remaining - 30.0).abs() < 1e-9);
        assert!((position.lots[0].unit_cost_usd - 2.0).abs() < 1e-9);
    }

    #[test]
    fn sell_exceeding_open_lots_realizes_residual_at_zero_cost() {
        let trades = vec![
            trade("b1", Side::Buy, 10.0, 1.0, 0),
            trade("s1", Side::Sell, 30.0, 5.0, 10),
        ];
        let position = rebuild_position("eth", "w", "T", &trades);
        // 10 matched at (5-1)=4 -> 40, plus 20 residual at 5*20=100
        assert!((position.realized_pnl_usd - 140.0).abs() < 1e-9);
        assert!(position.lots.is_empty());
    }

    #[test]
    fn best_trade_multiple_uses_realized_lots_only() {
        let trades = vec![
            trade("b1", Side::Buy, 10.0, 1.0, 0),
            trade("s1", Side::Sell, 10.0, 4.0, 10),
            trade("b2", Side::Buy, 10.0, 1.0, 20),
        ];
        // open lot from b2 is not realized; best multiple should be 4.0
        assert!((best_trade_multiple(&trades) - 4.0).abs() < 1e-9);
    }
}
