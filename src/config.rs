//! Configuration loading and validation (§6, Ambient stack)
//!
//! Layered: built-in defaults, then an optional TOML file, then
//! environment variables under a fixed double-underscore-separated
//! prefix, all folded through the `config` crate into one typed struct.

use serde::Deserialize;
use std::path::Path;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_chains")]
    pub chains: Vec<String>,

    #[serde(default)]
    pub intervals: IntervalConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub safety_gate: SafetyGateConfig,

    #[serde(default)]
    pub confluence: ConfluenceConfig,

    #[serde(default)]
    pub watchlist: WatchlistConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntervalConfig {
    #[serde(default = "default_t_ingest_secs")]
    pub t_ingest_secs: u64,
    #[serde(default = "default_t_discover_secs")]
    pub t_discover_secs: u64,
    #[serde(default = "default_t_monitor_secs")]
    pub t_monitor_secs: u64,
    #[serde(default = "default_t_stats_secs")]
    pub t_stats_secs: u64,
    /// Wall-clock hour (UTC, 0-23) the watchlist maintainer runs at daily.
    #[serde(default = "default_watchlist_run_hour_utc")]
    pub watchlist_run_hour_utc: u32,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            t_ingest_secs: default_t_ingest_secs(),
            t_discover_secs: default_t_discover_secs(),
            t_monitor_secs: default_t_monitor_secs(),
            t_stats_secs: default_t_stats_secs(),
            watchlist_run_hour_utc: default_watchlist_run_hour_utc(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_discovery_lookback_hours")]
    pub lookback_hours: i64,
    #[serde(default = "default_transfer_block_range")]
    pub transfer_fetch_limit: u32,
    #[serde(default = "default_pool_send_threshold")]
    pub pool_send_threshold: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            lookback_hours: default_discovery_lookback_hours(),
            transfer_fetch_limit: default_transfer_block_range(),
            pool_send_threshold: default_pool_send_threshold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SafetyGateConfig {
    #[serde(default = "default_min_liquidity_usd")]
    pub min_liquidity_usd: f64,
    #[serde(default = "default_min_volume_24h_usd")]
    pub min_volume_24h_usd: f64,
    #[serde(default = "default_max_tax_pct")]
    pub max_tax_pct: f64,
    #[serde(default)]
    pub stablecoin_exclusions: Vec<String>,
}

impl Default for SafetyGateConfig {
    fn default() -> Self {
        Self {
            min_liquidity_usd: default_min_liquidity_usd(),
            min_volume_24h_usd: default_min_volume_24h_usd(),
            max_tax_pct: default_max_tax_pct(),
            stablecoin_exclusions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfluenceConfig {
    #[serde(default = "default_confluence_window_secs")]
    pub window_secs: i64,
    #[serde(default = "default_min_confluence")]
    pub min_confluence: usize,
}

impl Default for ConfluenceConfig {
    fn default() -> Self {
        Self {
            window_secs: default_confluence_window_secs(),
            min_confluence: default_min_confluence(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchlistConfig {
    #[serde(default = "default_watchlist_top_n")]
    pub top_n: usize,
    #[serde(default = "default_weights")]
    pub weights: (f64, f64, f64),
    #[serde(default = "default_min_trades")]
    pub min_trades: u32,
    #[serde(default = "default_min_multiple")]
    pub min_multiple: f64,
    #[serde(default = "default_neg_pnl_threshold")]
    pub neg_pnl_threshold: f64,
    #[serde(default = "default_remove_min_early_score")]
    pub remove_min_early_score: f64,
    #[serde(default = "default_remove_min_multiple")]
    pub remove_min_multiple: f64,
}

impl Default for WatchlistConfig {
    fn default() -> Self {
        Self {
            top_n: default_watchlist_top_n(),
            weights: default_weights(),
            min_trades: default_min_trades(),
            min_multiple: default_min_multiple(),
            neg_pnl_threshold: default_neg_pnl_threshold(),
            remove_min_early_score: default_remove_min_early_score(),
            remove_min_multiple: default_remove_min_multiple(),
        }
    }
}

/// Cluster-aware bot heuristic thresholds.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    /// Minimum `WalletCluster` size before its members can be flagged
    /// bundled (`BUNDLE_CLUSTER_SIZE`).
    #[serde(default = "default_bundle_cluster_size")]
    pub bundle_cluster_size: usize,
    /// Fraction of a cluster's buys that must be timestamp-correlated
    /// before the cluster is treated as a bundle (`CLUSTER_CORRELATION_THRESHOLD`).
    #[serde(default = "default_cluster_correlation_threshold")]
    pub cluster_correlation_threshold: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            bundle_cluster_size: default_bundle_cluster_size(),
            cluster_correlation_threshold: default_cluster_correlation_threshold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpstreamConfig {
    #[serde(default)]
    pub chain_rpc_api_key: String,
    #[serde(default = "default_chain_rpc_base_url")]
    pub chain_rpc_base_url: String,
}

fn default_chains() -> Vec<String> {
    vec!["eth".into(), "base".into(), "arbitrum".into(), "solana".into()]
}
fn default_t_ingest_secs() -> u64 {
    300
}
fn default_t_discover_secs() -> u64 {
    420
}
fn default_t_monitor_secs() -> u64 {
    120
}
fn default_t_stats_secs() -> u64 {
    900
}
fn default_watchlist_run_hour_utc() -> u32 {
    3
}
fn default_discovery_lookback_hours() -> i64 {
    3
}
fn default_transfer_block_range() -> u32 {
    2000
}
fn default_pool_send_threshold() -> u32 {
    2
}
fn default_min_liquidity_usd() -> f64 {
    50_000.0
}
fn default_min_volume_24h_usd() -> f64 {
    50_000.0
}
fn default_max_tax_pct() -> f64 {
    10.0
}
fn default_confluence_window_secs() -> i64 {
    1800
}
fn default_min_confluence() -> usize {
    2
}
fn default_watchlist_top_n() -> usize {
    30
}
fn default_weights() -> (f64, f64, f64) {
    (0.30, 0.30, 0.40)
}
fn default_min_trades() -> u32 {
    1
}
fn default_min_multiple() -> f64 {
    1.0
}
fn default_neg_pnl_threshold() -> f64 {
    0.0
}
fn default_remove_min_early_score() -> f64 {
    20.0
}
fn default_remove_min_multiple() -> f64 {
    2.0
}
fn default_chain_rpc_base_url() -> String {
    "https://api.example-chain-rpc.io".to_string()
}
fn default_bundle_cluster_size() -> usize {
    3
}
fn default_cluster_correlation_threshold() -> f64 {
    0.5
}

const ENV_PREFIX: &str = "CONFLUENCE";

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            .set_default("chains", default_chains())
            .map_err(|e| Error::Config(e.to_string()))?
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        let cfg: Config = settings
            .try_deserialize()
            .map_err(|e| Error::Config(e.to_string()))?;

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.chains.is_empty() {
            return Err(Error::Config("at least one chain must be enabled".into()));
        }

        let (w_pnl, w_act, w_early) = self.watchlist.weights;
        let sum = w_pnl + w_act + w_early;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(Error::Config(format!(
                "watchlist weights must sum to 1.0, got {sum}"
            )));
        }

        if self.confluence.min_confluence < 2 {
            return Err(Error::Config("min_confluence must be >= 2".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_defaults_when_no_file_or_env() {
        let cfg = Config::load("nonexistent-confluence-watch.toml").unwrap();
        assert_eq!(cfg.chains, default_chains());
        assert_eq!(cfg.watchlist.top_n, 30);
        assert_eq!(cfg.confluence.min_confluence, 2);
    }

    #[test]
    fn rejects_weights_that_do_not_sum_to_one() {
        let mut cfg = Config::load("nonexistent-confluence-watch.toml").unwrap();
        cfg.watchlist.weights = (0.5, 0.5, 0.5);
        assert!(cfg.validate().is_err());
    }
}
