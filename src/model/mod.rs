//! Core data model (§3) — entities and the invariants that hold across them.
//!
//! Ownership here is logical; the `Store` (an external collaborator in
//! production, an in-memory stand-in for tests) persists every entity.

mod alert;
mod cluster;
mod position;
mod stats;
mod token;
mod trade;
mod wallet;
mod watchlist;

pub use alert::{AlertKind, AlertRecord};
pub use cluster::WalletCluster;
pub use position::{Lot, Position};
pub use stats::WalletStats30D;
pub use token::{SeedToken, Token};
pub use trade::{sort_trades, Side, Trade};
pub use wallet::Wallet;
pub use watchlist::{WatchlistEntry, WatchlistStatus};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Chain identifier. Kept as a plain string rather than an enum so new
/// chains can be added purely via configuration (§6).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChainId(pub String);

impl ChainId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ChainId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Returns true for EVM-family chains, which use lowercased hex addresses.
/// Solana (and any other non-EVM chain) keeps native casing (§3).
pub fn is_evm_chain(chain: &ChainId) -> bool {
    matches!(chain.0.as_str(), "eth" | "base" | "arbitrum" | "optimism" | "polygon")
}

/// Normalize an address per chain-family casing rules.
pub fn normalize_address(chain: &ChainId, address: &str) -> String {
    if is_evm_chain(chain) {
        address.to_lowercase()
    } else {
        address.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evm_addresses_are_lowercased() {
        let chain = ChainId::from("eth");
        assert_eq!(normalize_address(&chain, "0xABCDEF"), "0xabcdef");
    }

    #[test]
    fn solana_addresses_keep_case() {
        let chain = ChainId::from("solana");
        assert_eq!(
            normalize_address(&chain, "DYw8jCTfwHNRJhhmFcbXvVDTqWMEVFBX6ZKUmG5CNSKK"),
            "DYw8jCTfwHNRJhhmFcbXvVDTqWMEVFBX6ZKUmG5CNSKK"
        );
    }
}
