//! Wallet (§3)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::ChainId;

/// Identity `(chain_id, address)`. Created by C3 on first observation of a
/// trade by the wallet; labels are mutated by C5 and by human override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub chain: ChainId,
    pub address: String,
    pub first_seen: DateTime<Utc>,
    pub labels: HashSet<String>,
}

impl Wallet {
    pub fn new(chain: ChainId, address: String, first_seen: DateTime<Utc>) -> Self {
        Self {
            chain,
            address,
            first_seen,
            labels: HashSet::new(),
        }
    }

    pub fn is_bot(&self) -> bool {
        self.labels.contains("bot")
    }

    pub fn add_label(&mut self, label: impl Into<String>) {
        self.labels.insert(label.into());
    }
}
