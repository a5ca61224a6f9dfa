//! DexScreener-backed `TrendingSource` + `PriceSource` (§4.1, §4.2, §4.4)
//!
//! One base URL: the "latest profiles" feed for trending discovery, the
//! `/latest/dex/tokens` lookup for price. No scoring happens here; this
//! adapter only needs to produce `TokenSnapshot`s and prices.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::ChainId;

use super::{retry_with_backoff, PriceSource, TokenSnapshot, TrendingSource, DEFAULT_PROVIDER_CONCURRENCY};

const BASE_URL: &str = "https://api.dexscreener.com";

#[derive(Debug, Deserialize)]
struct TokenProfile {
    #[serde(rename = "chainId")]
    chain_id: String,
    #[serde(rename = "tokenAddress")]
    token_address: String,
}

#[derive(Debug, Deserialize)]
struct TokenPairsResponse {
    pairs: Option<Vec<DexPair>>,
}

#[derive(Debug, Deserialize)]
struct DexPair {
    #[serde(rename = "baseToken")]
    base_token: BaseToken,
    #[serde(rename = "priceUsd")]
    price_usd: Option<String>,
    liquidity: Option<Liquidity>,
    volume: Option<Volume>,
}

#[derive(Debug, Deserialize)]
struct BaseToken {
    symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Liquidity {
    usd: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Volume {
    h24: Option<f64>,
}

/// Maps our `ChainId` onto DexScreener's `chainId` vocabulary.
fn dexscreener_chain_id(chain: &ChainId) -> &str {
    match chain.0.as_str() {
        "eth" => "ethereum",
        "solana" => "solana",
        other => other,
    }
}

pub struct DexScreenerAdapter {
    client: reqwest::Client,
    limiter: Arc<Semaphore>,
}

impl DexScreenerAdapter {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            limiter: Arc::new(Semaphore::new(DEFAULT_PROVIDER_CONCURRENCY)),
        }
    }

    async fn get_token_pairs(&self, token: &str) -> Result<Option<DexPair>> {
        let url = format!("{BASE_URL}/latest/dex/tokens/{token}");
        let data: TokenPairsResponse = retry_with_backoff(|| async {
            let _permit = self.limiter.acquire().await.expect("semaphore never closed");
            let resp = self.client.get(&url).send().await?;
            Ok(resp.json().await?)
        })
        .await?;
        Ok(data.pairs.and_then(|mut pairs| {
            if pairs.is_empty() {
                None
            } else {
                Some(pairs.remove(0))
            }
        }))
    }
}

impl Default for DexScreenerAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrendingSource for DexScreenerAdapter {
    fn name(&self) -> &str {
        "dexscreener"
    }

    async fn fetch_trending(&self, chain: &ChainId) -> Result<Vec<TokenSnapshot>> {
        let url = format!("{BASE_URL}/token-profiles/latest/v1");
        let profiles: Vec<TokenProfile> = retry_with_backoff(|| async {
            let _permit = self.limiter.acquire().await.expect("semaphore never closed");
            let resp = self.client.get(&url).send().await?;
            Ok(resp.json().await?)
        })
        .await?;

        let wanted = dexscreener_chain_id(chain);
        let mut snapshots = Vec::new();
        for profile in profiles.into_iter().filter(|p| p.chain_id == wanted) {
            debug!(token = %profile.token_address, "checking dexscreener profile");
            match self.get_token_pairs(&profile.token_address).await {
                Ok(Some(pair)) => {
                    let price_usd = pair.price_usd.as_ref().and_then(|p| p.parse::<f64>().ok());
                    snapshots.push(TokenSnapshot {
                        address: profile.token_address,
                        symbol: pair
                            .base_token
                            .symbol
                            .unwrap_or_else(|| "UNKNOWN".to_string()),
                        price_usd,
                        liquidity_usd: pair.liquidity.and_then(|l| l.usd).unwrap_or(0.0),
                        volume_24h_usd: pair.volume.and_then(|v| v.h24).unwrap_or(0.0),
                    });
                }
                Ok(None) => continue,
                Err(e) if e.is_retryable() => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(snapshots)
    }
}

#[async_trait]
impl PriceSource for DexScreenerAdapter {
    fn name(&self) -> &str {
        "dexscreener"
    }

    async fn price_of(&self, _chain: &ChainId, token: &str) -> Result<Option<f64>> {
        match self.get_token_pairs(token).await {
            Ok(Some(pair)) => Ok(pair.price_usd.and_then(|p| p.parse::<f64>().ok())),
            Ok(None) => Ok(None),
            Err(e) => Err(Error::TransientUpstream {
                provider: "dexscreener".to_string(),
                message: e.to_string(),
            }),
        }
    }
}
