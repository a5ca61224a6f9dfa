//! Scheduler (Ambient stack — Scheduler)
//!
//! One `tokio::spawn`-ed loop per job (C2, C3, C6, C8) plus a daily
//! wall-clock loop for C7: `Arc`-cloned collaborators moved into the task,
//! a `tokio::select!` between `interval.tick()` and a broadcast shutdown
//! signal. Each chain within a job runs through a `Semaphore`-bounded
//! worker pool rather than unboundedly, and a job's per-chain tasks are
//! joined before the tick reports done — no task is spawned and forgotten.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Semaphore};
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::alert::AlertTransport;
use crate::config::Config;
use crate::confluence::ConfluenceDetector;
use crate::discover::WalletDiscoverer;
use crate::ingest::TokenIngestor;
use crate::model::ChainId;
use crate::monitor::WalletMonitor;
use crate::price::PriceEnricher;
use crate::stats::StatsRoller;
use crate::store::{Store, TimeWindowStore};
use crate::upstream::AdapterRegistry;
use crate::watchlist::WatchlistMaintainer;

const MAX_CONCURRENT_CHAINS: usize = 8;

/// The long-lived collaborators every job loop needs a handle to.
/// Built once at startup, `Clone`d cheaply (every field is an `Arc`), and
/// never mutated after that.
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn Store>,
    pub window_store: Arc<dyn TimeWindowStore>,
    pub registry: Arc<AdapterRegistry>,
    pub transport: Arc<dyn AlertTransport>,
    pub config: Arc<Config>,
}

pub struct Scheduler {
    ctx: AppContext,
    shutdown: broadcast::Sender<()>,
}

impl Scheduler {
    pub fn new(ctx: AppContext) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self { ctx, shutdown }
    }

    fn chains(&self) -> Vec<ChainId> {
        self.ctx.config.chains.iter().map(|c| ChainId::from(c.as_str())).collect()
    }

    /// Spawn every job loop and block until a shutdown signal (Ctrl-C)
    /// arrives, then wait for in-flight ticks to finish.
    pub async fn run(self) -> crate::error::Result<()> {
        let ctx = self.ctx.clone();
        let shutdown = self.shutdown.clone();

        let ingest = spawn_interval_job(
            "ingest",
            ctx.clone(),
            Duration::from_secs(ctx.config.intervals.t_ingest_secs),
            shutdown.subscribe(),
            |ctx, chain| async move {
                let gate = &ctx.config.safety_gate;
                let ingestor = TokenIngestor::new(&*ctx.store, &ctx.registry, gate);
                ingestor.run_for_chain(&chain).await.map(|_| ())
            },
        );

        let discover = spawn_interval_job(
            "discover",
            ctx.clone(),
            Duration::from_secs(ctx.config.intervals.t_discover_secs),
            shutdown.subscribe(),
            |ctx, chain| async move {
                let prices = PriceEnricher::new(&ctx.registry, &*ctx.store);
                let discoverer = WalletDiscoverer::new(&*ctx.store, &ctx.registry, &ctx.config.discovery, &prices);
                discoverer.run_for_chain(&chain).await.map(|_| ())
            },
        );

        let stats = spawn_interval_job(
            "stats",
            ctx.clone(),
            Duration::from_secs(ctx.config.intervals.t_stats_secs),
            shutdown.subscribe(),
            |ctx, chain| async move {
                let prices = PriceEnricher::new(&ctx.registry, &*ctx.store);
                let roller = StatsRoller::with_analytics(
                    &*ctx.store,
                    &prices,
                    &ctx.config.discovery,
                    ctx.config.analytics.clone(),
                );
                roller.run_for_chain(&chain).await.map(|_| ())
            },
        );

        let monitor = spawn_interval_job(
            "monitor",
            ctx.clone(),
            Duration::from_secs(ctx.config.intervals.t_monitor_secs),
            shutdown.subscribe(),
            |ctx, chain| async move {
                let prices = PriceEnricher::new(&ctx.registry, &*ctx.store);
                let detector = ConfluenceDetector::new(
                    &*ctx.store,
                    &*ctx.window_store,
                    ctx.config.confluence.window_secs,
                    ctx.config.confluence.min_confluence,
                );
                let monitor = WalletMonitor::new(
                    &*ctx.store,
                    &ctx.registry,
                    &prices,
                    &detector,
                    &*ctx.transport,
                    &ctx.config.discovery,
                    &ctx.config.watchlist,
                    &ctx.config.safety_gate.stablecoin_exclusions,
                );
                monitor
                    .run_for_chain(&chain, &[], &ctx.config.confluence)
                    .await
                    .map(|_| ())
            },
        );

        let watchlist = spawn_daily_job(
            "watchlist",
            ctx.clone(),
            ctx.config.intervals.watchlist_run_hour_utc,
            shutdown.subscribe(),
            |ctx, chain| async move {
                let maintainer = WatchlistMaintainer::new(&*ctx.store, &ctx.config.watchlist);
                // This scheduler holds no live view of Armed/Fired confluence
                // state across jobs; the watchlist run therefore treats the
                // set as empty and relies on C9's own per-key serialization
                // to avoid racing a removal against an in-flight alert.
                maintainer.run_for_chain(&chain, &HashSet::new()).await.map(|_| ())
            },
        );

        tokio::signal::ctrl_c().await.map_err(|e| crate::error::Error::Internal(e.to_string()))?;
        info!("shutdown signal received, draining in-flight job ticks");
        let _ = self.shutdown.send(());

        for handle in [ingest, discover, stats, monitor, watchlist] {
            let _ = handle.await;
        }
        Ok(())
    }
}

/// Run one chain's job body behind a deadline of 2x the job interval
/// (§5), logging and continuing on failure rather than propagating —
/// one chain's trouble must never stall another (§4.9).
async fn run_chain_with_deadline<F, Fut>(job: &str, chain: ChainId, interval: Duration, body: F)
where
    F: FnOnce(ChainId) -> Fut,
    Fut: std::future::Future<Output = crate::error::Result<()>>,
{
    let deadline = interval * 2;
    match timeout(deadline, body(chain.clone())).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) if e.is_policy_reject() => {
            tracing::debug!(job, chain = %chain, error = %e, "tick rejected, skipping");
        }
        Ok(Err(e)) => {
            warn!(job, chain = %chain, error = %e, "job tick failed for this chain, continuing");
        }
        Err(_) => {
            error!(job, chain = %chain, "job tick exceeded its deadline, abandoning this tick");
        }
    }
}

fn spawn_interval_job<F, Fut>(
    name: &'static str,
    ctx: AppContext,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
    body: F,
) -> tokio::task::JoinHandle<()>
where
    F: Fn(AppContext, ChainId) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = crate::error::Result<()>> + Send + 'static,
{
    let body = Arc::new(body);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    run_tick(name, &ctx, interval, body.clone()).await;
                }
                _ = shutdown.recv() => {
                    info!(job = name, "job loop shutting down");
                    break;
                }
            }
        }
    })
}

fn spawn_daily_job<F, Fut>(
    name: &'static str,
    ctx: AppContext,
    run_hour_utc: u32,
    mut shutdown: broadcast::Receiver<()>,
    body: F,
) -> tokio::task::JoinHandle<()>
where
    F: Fn(AppContext, ChainId) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = crate::error::Result<()>> + Send + 'static,
{
    let body = Arc::new(body);
    tokio::spawn(async move {
        loop {
            let sleep = Duration::from_secs(seconds_until_next_hour_utc(run_hour_utc));
            tokio::select! {
                _ = tokio::time::sleep(sleep) => {
                    run_tick(name, &ctx, Duration::from_secs(86_400), body.clone()).await;
                }
                _ = shutdown.recv() => {
                    info!(job = name, "job loop shutting down");
                    break;
                }
            }
        }
    })
}

async fn run_tick<F, Fut>(name: &'static str, ctx: &AppContext, interval: Duration, body: Arc<F>)
where
    F: Fn(AppContext, ChainId) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = crate::error::Result<()>> + Send + 'static,
{
    let chains: Vec<ChainId> = ctx.config.chains.iter().map(|c| ChainId::from(c.as_str())).collect();
    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_CHAINS.min(chains.len().max(1))));
    let mut handles = Vec::with_capacity(chains.len());

    for chain in chains {
        let ctx = ctx.clone();
        let body = body.clone();
        let permit = semaphore.clone().acquire_owned().await.expect("semaphore never closed");
        handles.push(tokio::spawn(async move {
            let _permit = permit;
            run_chain_with_deadline(name, chain, interval, |c| body(ctx, c)).await;
        }));
    }

    for handle in handles {
        if let Err(e) = handle.await {
            error!(job = name, error = %e, "chain task panicked");
        }
    }
}

fn seconds_until_next_hour_utc(hour: u32) -> u64 {
    use chrono::{Datelike, Duration as ChronoDuration, TimeZone, Utc};

    let now = Utc::now();
    let mut next = Utc
        .with_ymd_and_hms(now.year(), now.month(), now.day(), hour.min(23), 0, 0)
        .single()
        .unwrap_or(now);
    if next <= now {
        next += ChronoDuration::days(1);
    }
    (next - now).num_seconds().max(1) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_hour_utc_is_always_in_the_future() {
        for hour in [0, 3, 12, 23] {
            let secs = seconds_until_next_hour_utc(hour);
            assert!(secs > 0 && secs <= 86_400);
        }
    }
}
