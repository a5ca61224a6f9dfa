//! Subcommand bodies (§5 Ambient stack — CLI)
//!
//! Each function takes the resolved `Config` and does exactly one thing;
//! no subcommand re-implements pipeline logic, they only build the
//! collaborators the library already exposes and call into them.

use std::sync::Arc;

use tracing::info;

use crate::alert::NullAlertTransport;
use crate::config::Config;
use crate::error::Result;
use crate::model::ChainId;
use crate::scheduler::{AppContext, Scheduler};
use crate::store::{InMemoryStore, InMemoryTimeWindowStore};
use crate::upstream::{dexscreener::DexScreenerAdapter, chain_rpc::ChainRpcAdapter, AdapterRegistry};

/// Build the `AdapterRegistry` for every configured chain: DexScreener for
/// trending/price lookups on every chain, the configured chain-RPC
/// provider for transfers and safety checks. Clients are constructed once
/// here and handed down by reference.
fn build_registry(config: &Config) -> AdapterRegistry {
    let mut builder = AdapterRegistry::builder();
    for chain in &config.chains {
        let chain_id = ChainId::from(chain.as_str());
        let dexscreener = Arc::new(DexScreenerAdapter::new());
        builder = builder
            .with_trending(chain_id.clone(), dexscreener.clone())
            .with_prices(chain_id.clone(), dexscreener);

        let rpc = Arc::new(ChainRpcAdapter::new(
            config.upstream.chain_rpc_api_key.clone(),
            config.upstream.chain_rpc_base_url.clone(),
        ));
        builder = builder
            .with_transfers(chain_id.clone(), rpc.clone())
            .with_safety(chain_id, rpc);
    }
    builder.build()
}

fn build_context(config: &Config) -> AppContext {
    AppContext {
        store: Arc::new(InMemoryStore::new()),
        window_store: Arc::new(InMemoryTimeWindowStore::new()),
        registry: Arc::new(build_registry(config)),
        transport: Arc::new(NullAlertTransport),
        config: Arc::new(config.clone()),
    }
}

pub async fn run(config: &Config) -> Result<()> {
    info!(chains = ?config.chains, "starting scheduler");
    let ctx = build_context(config);
    Scheduler::new(ctx).run().await
}

/// This reference deployment's `Store` is in-memory and process-local
/// (§6.1), so `status`/`watchlist` invoked as a separate process see no
/// state from a running `run` instance — a real deployment backs `Store`
/// with the database named in the config and all three subcommands share
/// it. We still build a real (empty) context here rather than fabricate
/// numbers.
pub async fn status(config: &Config) -> Result<()> {
    let ctx = build_context(config);
    println!("\n=== CONFLUENCE WATCHER STATUS ===\n");
    for chain in &config.chains {
        let chain_id = ChainId::from(chain.as_str());
        let active = ctx.store.active_watchlist(&chain_id).await?.len();
        println!("{chain:>10}: watchlist active = {active}");
    }
    println!(
        "\nintervals: ingest={}s discover={}s monitor={}s stats={}s watchlist_hour={}h UTC",
        config.intervals.t_ingest_secs,
        config.intervals.t_discover_secs,
        config.intervals.t_monitor_secs,
        config.intervals.t_stats_secs,
        config.intervals.watchlist_run_hour_utc,
    );
    Ok(())
}

pub fn show_config(config: &Config) -> Result<()> {
    println!("{config:#?}");
    Ok(())
}

pub async fn watchlist(config: &Config) -> Result<()> {
    let ctx = build_context(config);
    println!("\n=== ACTIVE WATCHLIST ===\n");
    for chain in &config.chains {
        let chain_id = ChainId::from(chain.as_str());
        let entries = ctx.store.active_watchlist(&chain_id).await?;
        println!("-- {chain} ({} active) --", entries.len());
        for entry in entries.iter().take(config.watchlist.top_n) {
            println!("  {:<44} score={:.1}", entry.wallet, entry.composite_score);
        }
    }
    Ok(())
}
