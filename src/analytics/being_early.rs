//! Being-Early score (C5, §4.5, §8 property 3)
//!
//! A weighted-component score: normalize each signal to `[0, 1]`, weight,
//! sum, scale. The weights and component definitions are fixed by the
//! scoring formula rather than a tunable `*Config` struct, since the
//! formula is exact rather than a heuristic blend.

/// Inputs for a single buy's Being-Early score.
pub struct BuySignal {
    /// 0-based rank of this wallet among all observed buyers of the token,
    /// divided by total buyer count.
    pub rank_pct: f64,
    /// Token's market cap estimate at the time of this buy.
    pub mcap_at_buy: f64,
    /// This buy's USD value divided by the token's 24h USD volume.
    pub volume_participation: f64,
}

fn clip(value: f64, lo: f64, hi: f64) -> f64 {
    value.clamp(lo, hi)
}

/// `score = 40*(1-rank_pct) + 40*clip((1e6-mcap)/1e6, 0, 1) + 20*volume_participation`
pub fn score_buy(signal: &BuySignal) -> f64 {
    let rank_component = 40.0 * (1.0 - signal.rank_pct.clamp(0.0, 1.0));
    let mcap_component = 40.0 * clip((1_000_000.0 - signal.mcap_at_buy) / 1_000_000.0, 0.0, 1.0);
    let volume_component = 20.0 * clip(signal.volume_participation, 0.0, 1.0);
    (rank_component + mcap_component + volume_component).clamp(0.0, 100.0)
}

/// Per-wallet Being-Early is the median over the wallet's buys in the
/// 30-day window.
pub fn median_score(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_is_bounded_0_to_100() {
        let best = score_buy(&BuySignal {
            rank_pct: 0.0,
            mcap_at_buy: 0.0,
            volume_participation: 1.0,
        });
        assert!((best - 100.0).abs() < 1e-9);

        let worst = score_buy(&BuySignal {
            rank_pct: 1.0,
            mcap_at_buy: 10_000_000.0,
            volume_participation: 0.0,
        });
        assert!((worst - 0.0).abs() < 1e-9);
    }

    #[test]
    fn median_of_odd_and_even_sets() {
        assert!((median_score(&[10.0, 20.0, 30.0]) - 20.0).abs() < 1e-9);
        assert!((median_score(&[10.0, 20.0, 30.0, 40.0]) - 25.0).abs() < 1e-9);
        assert_eq!(median_score(&[]), 0.0);
    }
}
