//! Upstream capability interfaces (C1, §4.1, §9)
//!
//! All other components see only these four traits; provider quirks
//! (rate limits, pagination, response shape) live entirely behind the
//! concrete adapters in `dexscreener` and `chain_rpc`. An `AdapterRegistry`
//! is built once at startup and never mutated: clients are constructed in
//! `main` and handed down by reference.

pub mod chain_rpc;
pub mod dexscreener;

use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::model::ChainId;

/// Minimal shape a trending-token snapshot must carry (§4.1).
#[derive(Debug, Clone)]
pub struct TokenSnapshot {
    pub address: String,
    pub symbol: String,
    pub price_usd: Option<f64>,
    pub liquidity_usd: f64,
    pub volume_24h_usd: f64,
}

/// Direction requested from `fetchWalletTransfers` (§4.1): a buy moves the
/// token toward the wallet, a sell moves it away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    In,
    Out,
}

/// A single on-chain token transfer, pre-classification. C3/C8 run the
/// DEX-pool heuristic over a batch of these to decide buy/sell/discard.
#[derive(Debug, Clone)]
pub struct Transfer {
    pub tx_hash: String,
    pub token: String,
    pub from: String,
    pub to: String,
    pub quantity: f64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyInfo {
    pub tax_buy_pct: f64,
    pub tax_sell_pct: f64,
    pub is_honeypot: bool,
}

#[async_trait]
pub trait TrendingSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch_trending(&self, chain: &ChainId) -> Result<Vec<TokenSnapshot>>;
}

#[async_trait]
pub trait TransferSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_token_transfers(
        &self,
        chain: &ChainId,
        token: &str,
        limit: u32,
    ) -> Result<Vec<Transfer>>;

    async fn fetch_wallet_transfers(
        &self,
        chain: &ChainId,
        wallet: &str,
        direction: TransferDirection,
        limit: u32,
    ) -> Result<Vec<Transfer>>;
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &str;
    async fn price_of(&self, chain: &ChainId, token: &str) -> Result<Option<f64>>;
}

#[async_trait]
pub trait SafetySource: Send + Sync {
    fn name(&self) -> &str;
    async fn safety_check(&self, chain: &ChainId, token: &str) -> Result<SafetyInfo>;
}

/// `{chain -> [adapter]}` registries, built once at startup (§9 "Global
/// state"). Fallback order within a chain's list is the order adapters
/// were registered, i.e. explicit configuration, never implicit type
/// lookup.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    trending: HashMap<ChainId, Vec<Arc<dyn TrendingSource>>>,
    transfers: HashMap<ChainId, Vec<Arc<dyn TransferSource>>>,
    prices: HashMap<ChainId, Vec<Arc<dyn PriceSource>>>,
    safety: HashMap<ChainId, Vec<Arc<dyn SafetySource>>>,
}

impl AdapterRegistry {
    pub fn builder() -> AdapterRegistryBuilder {
        AdapterRegistryBuilder::default()
    }

    pub fn trending_sources(&self, chain: &ChainId) -> &[Arc<dyn TrendingSource>] {
        self.trending.get(chain).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn transfer_sources(&self, chain: &ChainId) -> &[Arc<dyn TransferSource>] {
        self.transfers.get(chain).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn price_sources(&self, chain: &ChainId) -> &[Arc<dyn PriceSource>] {
        self.prices.get(chain).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn safety_sources(&self, chain: &ChainId) -> &[Arc<dyn SafetySource>] {
        self.safety.get(chain).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

#[derive(Default)]
pub struct AdapterRegistryBuilder {
    registry: AdapterRegistry,
}

impl AdapterRegistryBuilder {
    pub fn with_trending(mut self, chain: ChainId, adapter: Arc<dyn TrendingSource>) -> Self {
        self.registry.trending.entry(chain).or_default().push(adapter);
        self
    }

    pub fn with_transfers(mut self, chain: ChainId, adapter: Arc<dyn TransferSource>) -> Self {
        self.registry.transfers.entry(chain).or_default().push(adapter);
        self
    }

    pub fn with_prices(mut self, chain: ChainId, adapter: Arc<dyn PriceSource>) -> Self {
        self.registry.prices.entry(chain).or_default().push(adapter);
        self
    }

    pub fn with_safety(mut self, chain: ChainId, adapter: Arc<dyn SafetySource>) -> Self {
        self.registry.safety.entry(chain).or_default().push(adapter);
        self
    }

    pub fn build(self) -> AdapterRegistry {
        self.registry
    }
}

/// Capped exponential backoff with jitter, bounded to 3 attempts (§4.1).
pub async fn retry_with_backoff<T, F, Fut>(mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    const MAX_ATTEMPTS: u32 = 3;
    let policy = ExponentialBackoff {
        initial_interval: Duration::from_millis(100),
        max_interval: Duration::from_millis(800),
        max_elapsed_time: None,
        ..Default::default()
    };
    let attempts = AtomicU32::new(0);

    retry(policy, || {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let fut = op();
        async move {
            match fut.await {
                Ok(v) => Ok(v),
                Err(e) if attempt < MAX_ATTEMPTS && e.is_retryable() => {
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        }
    })
    .await
}

/// Default per-provider concurrency cap (§4.1): a burst of lookups within
/// one tick must not hammer a single upstream unbounded.
pub const DEFAULT_PROVIDER_CONCURRENCY: usize = 4;
