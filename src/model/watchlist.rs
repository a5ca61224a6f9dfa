//! WatchlistEntry (§3), managed by C7.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchlistStatus {
    Active,
    Removed,
    Pending,
}

/// Identity `wallet`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub chain: String,
    pub wallet: String,
    pub composite_score: f64,
    pub status: WatchlistStatus,
    pub added_at: DateTime<Utc>,
    pub last_evaluated_at: DateTime<Utc>,
}

impl WatchlistEntry {
    pub fn is_active(&self) -> bool {
        self.status == WatchlistStatus::Active
    }
}
