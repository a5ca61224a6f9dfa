//! WalletCluster (§3 supplement) — advisory grouping of wallets that
//! appear coordinated by shared funding source, used only to refine the
//! bot heuristic, never accounting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletCluster {
    pub cluster_id: String,
    pub wallets: HashSet<String>,
    pub updated_at: DateTime<Utc>,
}

impl WalletCluster {
    pub fn new(cluster_id: impl Into<String>, initial_wallet: impl Into<String>, now: DateTime<Utc>) -> Self {
        let mut wallets = HashSet::new();
        wallets.insert(initial_wallet.into());
        Self {
            cluster_id: cluster_id.into(),
            wallets,
            updated_at: now,
        }
    }

    pub fn size(&self) -> usize {
        self.wallets.len()
    }

    pub fn contains(&self, wallet: &str) -> bool {
        self.wallets.contains(wallet)
    }

    pub fn add_wallet(&mut self, wallet: impl Into<String>, now: DateTime<Utc>) {
        self.wallets.insert(wallet.into());
        self.updated_at = now;
    }
}
