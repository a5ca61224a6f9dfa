//! Confluence Detector (C9, §4.9, §9)
//!
//! A time-windowed bag per `(chain, side, token)`. Record adds a member
//! and evicts stale ones; Evaluate reads distinct-wallet count and decides
//! whether to emit. The decision is an explicit, named enum rather than a
//! bare bool, so callers (C8) can log and branch without re-deriving the
//! state.
//!
//! Bucket truncation is deliberately distinct from the sliding window
//! (§9): eviction uses `now - CONFLUENCE_WINDOW` as a score floor; dedup
//! uses `floor(now / CONFLUENCE_WINDOW)` as a coarse bucket index. These
//! must never be conflated.

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::Result;
use crate::model::{AlertKind, AlertRecord, Side};
use crate::store::{Store, TimeWindowStore};

#[derive(Debug, Clone, PartialEq)]
pub enum ConfluenceDecision {
    /// Fewer than one member: nothing to report.
    Empty,
    /// At least one member, fewer than `MIN_CONFLUENCE`.
    Partial { members: usize },
    /// `MIN_CONFLUENCE` or more members, but this bucket already fired
    /// for the current wallet set (or a subset of it).
    Armed { members: usize },
    /// `MIN_CONFLUENCE` or more members, this wallet set not yet alerted
    /// in the current bucket: an alert should be emitted.
    Fired { wallets: Vec<String>, dedup_key: String },
}

fn window_bucket(now: chrono::DateTime<chrono::Utc>, window_secs: i64) -> i64 {
    now.timestamp() / window_secs.max(1)
}

fn dedup_key(chain: &str, side: Side, token: &str, wallets: &[String], bucket: i64) -> String {
    let mut sorted = wallets.to_vec();
    sorted.sort();
    let side_str = if side.is_buy() { "buy" } else { "sell" };
    let mut hasher = Sha256::new();
    hasher.update(chain.as_bytes());
    hasher.update(side_str.as_bytes());
    hasher.update(token.as_bytes());
    hasher.update(sorted.join(",").as_bytes());
    hasher.update(bucket.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct ConfluenceDetector<'a> {
    store: &'a dyn Store,
    window_store: &'a dyn TimeWindowStore,
    window_secs: i64,
    min_confluence: usize,
}

impl<'a> ConfluenceDetector<'a> {
    pub fn new(
        store: &'a dyn Store,
        window_store: &'a dyn TimeWindowStore,
        window_secs: i64,
        min_confluence: usize,
    ) -> Self {
        Self { store, window_store, window_secs, min_confluence }
    }

    fn key(chain: &str, side: Side, token: &str) -> String {
        let side_str = if side.is_buy() { "buy" } else { "sell" };
        format!("{chain}:{side_str}:{token}")
    }

    /// Record an observed trade and evaluate confluence for its key.
    /// Individual wallet fetch failures upstream of this call must be
    /// isolated by the caller (§4.9 failure semantics) — this call itself
    /// only fails on `StoreUnavailable`, which the caller should treat as
    /// "no confluence possible this tick".
    pub async fn record_and_evaluate(
        &self,
        chain: &str,
        side: Side,
        token: &str,
        wallet: &str,
        event_ts: chrono::DateTime<chrono::Utc>,
    ) -> Result<ConfluenceDecision> {
        let key = Self::key(chain, side, token);
        let window = chrono::Duration::seconds(self.window_secs);

        self.window_store.record(&key, wallet, event_ts, window).await?;
        let members = self.window_store.members(&key, window, event_ts).await?;

        if members.is_empty() {
            return Ok(ConfluenceDecision::Empty);
        }
        if members.len() < self.min_confluence {
            return Ok(ConfluenceDecision::Partial { members: members.len() });
        }

        let wallets: Vec<String> = members.into_iter().map(|m| m.wallet).collect();
        let bucket = window_bucket(event_ts, self.window_secs);
        let dk = dedup_key(chain, side, token, &wallets, bucket);

        if self.store.alert_by_dedup_key(&dk).await?.is_some() {
            return Ok(ConfluenceDecision::Armed { members: wallets.len() });
        }

        Ok(ConfluenceDecision::Fired { wallets, dedup_key: dk })
    }

    /// Persist the `AlertRecord` for a `Fired` decision. Separated from
    /// evaluation so C8 can apply the stablecoin exclusion (§4.8 step 2)
    /// before committing to an emission.
    pub async fn commit_alert(
        &self,
        kind: AlertKind,
        chain: &str,
        token: &str,
        wallets: Vec<String>,
        dedup_key: String,
        window_ms: i64,
        weights_snapshot: (f64, f64, f64),
    ) -> Result<AlertRecord> {
        let record = AlertRecord {
            dedup_key,
            kind,
            chain: chain.to_string(),
            token: token.to_string(),
            wallets,
            window_ms,
            weights_snapshot,
            emitted_at: chrono::Utc::now(),
        };
        self.store.insert_alert(record.clone()).await?;
        if record.wallets.is_empty() {
            warn!("confluence alert committed with zero wallets, check caller logic");
        }
        info!(chain, token, wallets = record.wallets.len(), "confluence alert committed");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, InMemoryTimeWindowStore};
    use chrono::Duration;

    #[tokio::test]
    async fn scenario_a_basic_confluence() {
        let store = InMemoryStore::new();
        let window_store = InMemoryTimeWindowStore::new();
        let detector = ConfluenceDetector::new(&store, &window_store, 1800, 2);

        let t0 = chrono::Utc::now();
        let d1 = detector
            .record_and_evaluate("eth", Side::Buy, "T", "W1", t0)
            .await
            .unwrap();
        assert_eq!(d1, ConfluenceDecision::Partial { members: 1 });

        let t1 = t0 + Duration::seconds(120);
        let d2 = detector
            .record_and_evaluate("eth", Side::Buy, "T", "W2", t1)
            .await
            .unwrap();
        match d2 {
            ConfluenceDecision::Fired { wallets, .. } => {
                assert_eq!(wallets.len(), 2);
            }
            other => panic!("expected Fired, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn scenario_b_idempotent_replay_yields_one_alert() {
        let store = InMemoryStore::new();
        let window_store = InMemoryTimeWindowStore::new();
        let detector = ConfluenceDetector::new(&store, &window_store, 1800, 2);
        let t0 = chrono::Utc::now();
        let mut fired_count = 0;

        for _ in 0..3 {
            detector.record_and_evaluate("eth", Side::Buy, "T", "W1", t0).await.unwrap();
            let decision = detector
                .record_and_evaluate("eth", Side::Buy, "T", "W2", t0 + Duration::seconds(120))
                .await
                .unwrap();
            if let ConfluenceDecision::Fired { wallets, dedup_key } = decision {
                fired_count += 1;
                detector
                    .commit_alert(AlertKind::BuyConfluence, "eth", "T", wallets, dedup_key, 120_000, (0.3, 0.3, 0.4))
                    .await
                    .unwrap();
            }
        }

        assert_eq!(fired_count, 1, "replaying the same feed must fire exactly once");
    }

    #[tokio::test]
    async fn scenario_c_below_threshold_no_alert() {
        let store = InMemoryStore::new();
        let window_store = InMemoryTimeWindowStore::new();
        let detector = ConfluenceDetector::new(&store, &window_store, 1800, 2);
        let decision = detector
            .record_and_evaluate("eth", Side::Buy, "T", "W1", chrono::Utc::now())
            .await
            .unwrap();
        assert_eq!(decision, ConfluenceDecision::Partial { members: 1 });
    }
}
