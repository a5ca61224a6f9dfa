//! Bot heuristics (C5, §4.5)
//!
//! A wallet is flagged `bot` if any of the three signals below trip.
//! Flagged wallets are excluded from the watchlist (§4.7) but remain in
//! the store, so this only produces a label, never a deletion.

use std::collections::HashMap;

use chrono::Duration;

use crate::model::{Side, Trade, WalletCluster};

const ROUND_TRIP_THRESHOLD: Duration = Duration::seconds(60);
const ROUND_TRIP_RATIO: f64 = 0.30;
const TRADES_PER_DAY_THRESHOLD: f64 = 100.0;
/// How close two cluster members' buys of the same token must land to
/// count as correlated.
const CLUSTER_CORRELATION_WINDOW: Duration = Duration::seconds(5);

/// (a) average trades/day over the observed window exceeds the threshold.
fn exceeds_trade_rate(trades: &[Trade], window_days: f64) -> bool {
    if window_days <= 0.0 {
        return false;
    }
    (trades.len() as f64 / window_days) > TRADES_PER_DAY_THRESHOLD
}

/// (b) a buy and sell of the same token separated by < 60s occurs in more
/// than 30% of trades. `trades` must already be sorted by `(token, timestamp)`.
fn exceeds_round_trip_ratio(trades_by_token: &[Vec<Trade>]) -> bool {
    let mut total = 0u32;
    let mut quick_round_trips = 0u32;

    for token_trades in trades_by_token {
        total += token_trades.len() as u32;
        for window in token_trades.windows(2) {
            let (a, b) = (&window[0], &window[1]);
            if a.side != b.side && (b.timestamp - a.timestamp) < ROUND_TRIP_THRESHOLD {
                quick_round_trips += 1;
            }
        }
    }

    if total == 0 {
        return false;
    }
    (quick_round_trips as f64 / total as f64) > ROUND_TRIP_RATIO
}

/// (c) every observed position is a single round-trip within one block —
/// approximated here as "buy immediately followed by sell, same token,
/// same timestamp", since block numbers aren't part of the `Trade` model.
fn all_positions_single_block_round_trip(trades_by_token: &[Vec<Trade>]) -> bool {
    if trades_by_token.is_empty() {
        return false;
    }
    trades_by_token.iter().all(|token_trades| {
        token_trades.len() == 2
            && token_trades[0].side == Side::Buy
            && token_trades[1].side == Side::Sell
            && token_trades[0].timestamp == token_trades[1].timestamp
    })
}

/// (d) cluster-aware bundle detection: a `WalletCluster` at or above
/// `min_cluster_size` is treated as a bundle
/// if more than `correlation_threshold` of its members' buys land within
/// `CLUSTER_CORRELATION_WINDOW` of another member's buy of the same token.
/// `member_trades` holds each cluster member's trades, keyed by address.
pub fn is_bundled_cluster(
    cluster: &WalletCluster,
    member_trades: &HashMap<String, Vec<Trade>>,
    min_cluster_size: usize,
    correlation_threshold: f64,
) -> bool {
    if cluster.size() < min_cluster_size {
        return false;
    }

    let mut buys: Vec<&Trade> = member_trades
        .values()
        .flatten()
        .filter(|t| t.side == Side::Buy)
        .collect();
    if buys.is_empty() {
        return false;
    }
    buys.sort_by_key(|t| t.timestamp);

    let correlated = buys
        .iter()
        .filter(|t| {
            buys.iter().any(|other| {
                other.wallet != t.wallet
                    && other.token == t.token
                    && time_delta_abs(other.timestamp, t.timestamp) < CLUSTER_CORRELATION_WINDOW
            })
        })
        .count();

    (correlated as f64 / buys.len() as f64) > correlation_threshold
}

fn time_delta_abs(a: chrono::DateTime<chrono::Utc>, b: chrono::DateTime<chrono::Utc>) -> Duration {
    if a >= b {
        a - b
    } else {
        b - a
    }
}

/// Evaluate all three heuristics for one wallet's 30-day trade history.
/// `trades_by_token` is the wallet's trades partitioned by token, each
/// sub-slice sorted by timestamp.
pub fn is_bot(trades_by_token: &[Vec<Trade>], window_days: f64) -> bool {
    let all_trades: Vec<Trade> = trades_by_token.iter().flatten().cloned().collect();
    exceeds_trade_rate(&all_trades, window_days)
        || exceeds_round_trip_ratio(trades_by_token)
        || all_positions_single_block_round_trip(trades_by_token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChainId;
    use chrono::{TimeZone, Utc};

    fn trade(side: Side, secs: i64) -> Trade {
        Trade {
            tx_hash: format!("tx{secs}"),
            chain: ChainId::from("eth"),
            wallet: "w".to_string(),
            token: "T".to_string(),
            side,
            quantity: 1.0,
            unit_price_usd: 1.0,
            usd_value: 1.0,
            venue: "uniswap".to_string(),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn flags_high_frequency_trading() {
        let trades: Vec<Trade> = (0..200).map(|i| trade(Side::Buy, i * 10)).collect();
        assert!(is_bot(&[trades], 1.0));
    }

    #[test]
    fn flags_quick_round_trips() {
        let trades = vec![trade(Side::Buy, 0), trade(Side::Sell, 10)];
        assert!(is_bot(&[trades], 30.0));
    }

    #[test]
    fn does_not_flag_normal_activity() {
        let trades = vec![trade(Side::Buy, 0), trade(Side::Sell, 86_400)];
        assert!(!is_bot(&[trades], 30.0));
    }

    fn wallet_trade(wallet: &str, secs: i64) -> Trade {
        Trade {
            tx_hash: format!("{wallet}-{secs}"),
            chain: ChainId::from("eth"),
            wallet: wallet.to_string(),
            token: "T".to_string(),
            side: Side::Buy,
            quantity: 1.0,
            unit_price_usd: 1.0,
            usd_value: 1.0,
            venue: "uniswap".to_string(),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn flags_cluster_whose_members_buy_in_lockstep() {
        let cluster = WalletCluster::new("funder1", "w1", Utc::now());
        let mut cluster = cluster;
        cluster.add_wallet("w2", Utc::now());
        cluster.add_wallet("w3", Utc::now());

        let mut member_trades = HashMap::new();
        member_trades.insert("w1".to_string(), vec![wallet_trade("w1", 0)]);
        member_trades.insert("w2".to_string(), vec![wallet_trade("w2", 1)]);
        member_trades.insert("w3".to_string(), vec![wallet_trade("w3", 2)]);

        assert!(is_bundled_cluster(&cluster, &member_trades, 3, 0.5));
    }

    #[test]
    fn does_not_flag_cluster_below_min_size() {
        let cluster = WalletCluster::new("funder1", "w1", Utc::now());
        let mut member_trades = HashMap::new();
        member_trades.insert("w1".to_string(), vec![wallet_trade("w1", 0)]);
        assert!(!is_bundled_cluster(&cluster, &member_trades, 3, 0.5));
    }

    #[test]
    fn does_not_flag_cluster_with_uncorrelated_buys() {
        let mut cluster = WalletCluster::new("funder1", "w1", Utc::now());
        cluster.add_wallet("w2", Utc::now());
        cluster.add_wallet("w3", Utc::now());

        let mut member_trades = HashMap::new();
        member_trades.insert("w1".to_string(), vec![wallet_trade("w1", 0)]);
        member_trades.insert("w2".to_string(), vec![wallet_trade("w2", 3_600)]);
        member_trades.insert("w3".to_string(), vec![wallet_trade("w3", 7_200)]);

        assert!(!is_bundled_cluster(&cluster, &member_trades, 3, 0.5));
    }
}
