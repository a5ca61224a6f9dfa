//! Enhanced-RPC-backed `TransferSource` + `SafetySource` (§4.1, §4.3, §4.8)
//!
//! One REST base for address history endpoints, one JSON-RPC base for
//! account-level queries, both constructed from a single API key. Transfer
//! fetching is chain-parametrized rather than tied to one network; the
//! client itself stays simple: two base URLs, a shared `reqwest::Client`,
//! a fixed per-request timeout.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::ChainId;

use super::{retry_with_backoff, SafetyInfo, SafetySource, Transfer, TransferDirection, TransferSource, DEFAULT_PROVIDER_CONCURRENCY};

pub struct ChainRpcAdapter {
    client: reqwest::Client,
    api_key: String,
    rest_base_url: String,
    timeout: Duration,
    limiter: Arc<Semaphore>,
}

impl ChainRpcAdapter {
    pub fn new(api_key: String, rest_base_url: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            api_key,
            rest_base_url,
            timeout: Duration::from_secs(10),
            limiter: Arc::new(Semaphore::new(DEFAULT_PROVIDER_CONCURRENCY)),
        }
    }

    async fn get_transfers(&self, path_and_query: &str) -> Result<Vec<RawTransfer>> {
        let url = format!(
            "{}{}{}api-key={}",
            self.rest_base_url,
            path_and_query,
            if path_and_query.contains('?') { "&" } else { "?" },
            self.api_key
        );
        debug!(url = %url, "fetching transfers");

        retry_with_backoff(|| async {
            let _permit = self.limiter.acquire().await.expect("semaphore never closed");
            let response = self.client.get(&url).timeout(self.timeout).send().await?;
            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::TransientUpstream {
                    provider: "chain_rpc".to_string(),
                    message: format!("{status}: {body}"),
                });
            }
            Ok(response.json().await?)
        })
        .await
    }
}

#[derive(Debug, Deserialize)]
struct RawTransfer {
    #[serde(rename = "txHash")]
    tx_hash: String,
    #[serde(rename = "tokenAddress")]
    token_address: String,
    from: String,
    to: String,
    amount: f64,
    timestamp: i64,
}

impl From<RawTransfer> for Transfer {
    fn from(r: RawTransfer) -> Self {
        Transfer {
            tx_hash: r.tx_hash,
            token: r.token_address,
            from: r.from,
            to: r.to,
            quantity: r.amount,
            timestamp: chrono::DateTime::from_timestamp(r.timestamp, 0).unwrap_or_else(Utc::now),
        }
    }
}

#[async_trait]
impl TransferSource for ChainRpcAdapter {
    fn name(&self) -> &str {
        "chain_rpc"
    }

    async fn fetch_token_transfers(
        &self,
        _chain: &ChainId,
        token: &str,
        limit: u32,
    ) -> Result<Vec<Transfer>> {
        let path = format!("/v1/tokens/{token}/transfers?limit={limit}");
        let raw = self.get_transfers(&path).await?;
        Ok(raw.into_iter().map(Transfer::from).collect())
    }

    async fn fetch_wallet_transfers(
        &self,
        _chain: &ChainId,
        wallet: &str,
        direction: TransferDirection,
        limit: u32,
    ) -> Result<Vec<Transfer>> {
        let dir = match direction {
            TransferDirection::In => "in",
            TransferDirection::Out => "out",
        };
        let path = format!("/v1/addresses/{wallet}/transfers?direction={dir}&limit={limit}");
        let raw = self.get_transfers(&path).await?;
        Ok(raw.into_iter().map(Transfer::from).collect())
    }
}

#[derive(Debug, Deserialize)]
struct SafetyResponse {
    #[serde(default)]
    tax_buy_pct: f64,
    #[serde(default)]
    tax_sell_pct: f64,
    #[serde(default)]
    is_honeypot: bool,
}

#[async_trait]
impl SafetySource for ChainRpcAdapter {
    fn name(&self) -> &str {
        "chain_rpc"
    }

    async fn safety_check(&self, _chain: &ChainId, token: &str) -> Result<SafetyInfo> {
        let path = format!("/v1/tokens/{token}/safety");
        let url = format!("{}{}?api-key={}", self.rest_base_url, path, self.api_key);

        let parsed: Option<SafetyResponse> = retry_with_backoff(|| async {
            let _permit = self.limiter.acquire().await.expect("semaphore never closed");
            let response = self.client.get(&url).timeout(self.timeout).send().await?;
            if !response.status().is_success() {
                return Ok(None);
            }
            Ok(Some(response.json().await?))
        })
        .await?;

        // Safety checks degrade gracefully: treat an unreachable safety
        // endpoint as "unknown", not as a hard failure for the ingest job.
        Ok(parsed
            .map(|p| SafetyInfo {
                tax_buy_pct: p.tax_buy_pct,
                tax_sell_pct: p.tax_sell_pct,
                is_honeypot: p.is_honeypot,
            })
            .unwrap_or_default())
    }
}
