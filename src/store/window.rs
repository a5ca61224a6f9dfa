//! In-memory `TimeWindowStore`, modeled on the bagged-by-key sliding
//! window pattern (score = timestamp, member = wallet) rather than a
//! nested per-wallet map, so eviction is a single linear scan over one
//! key's bag instead of a scan over every wallet.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::error::Result;

use super::{TimeWindowStore, WindowMember};

#[derive(Default)]
pub struct InMemoryTimeWindowStore {
    bags: DashMap<String, Vec<WindowMember>>,
}

impl InMemoryTimeWindowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TimeWindowStore for InMemoryTimeWindowStore {
    async fn record(
        &self,
        key: &str,
        wallet: &str,
        ts: DateTime<Utc>,
        window: Duration,
    ) -> Result<()> {
        let mut bag = self.bags.entry(key.to_string()).or_default();
        bag.push(WindowMember {
            wallet: wallet.to_string(),
            event_ts: ts,
        });
        let floor = ts - window;
        bag.retain(|m| m.event_ts >= floor);
        Ok(())
    }

    async fn members(
        &self,
        key: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<WindowMember>> {
        let floor = now - window;
        let Some(bag) = self.bags.get(key) else {
            return Ok(Vec::new());
        };
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for m in bag.iter().filter(|m| m.event_ts >= floor) {
            if seen.insert(m.wallet.clone()) {
                out.push(m.clone());
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn evicts_members_older_than_window() {
        let store = InMemoryTimeWindowStore::new();
        let now = Utc::now();
        let window = Duration::seconds(60);
        store
            .record("buy:eth:tok", "w1", now - Duration::seconds(120), window)
            .await
            .unwrap();
        store
            .record("buy:eth:tok", "w2", now - Duration::seconds(10), window)
            .await
            .unwrap();
        let members = store.members("buy:eth:tok", window, now).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].wallet, "w2");
    }

    #[tokio::test]
    async fn dedups_repeated_wallet_within_window() {
        let store = InMemoryTimeWindowStore::new();
        let now = Utc::now();
        let window = Duration::seconds(60);
        store.record("k", "w1", now - Duration::seconds(30), window).await.unwrap();
        store.record("k", "w1", now - Duration::seconds(5), window).await.unwrap();
        let members = store.members("k", window, now).await.unwrap();
        assert_eq!(members.len(), 1);
    }
}
