//! Feed acquisition: configuration, feed registry, orchestrator, refresh scheduler.

mod config;
mod orchestrator;
mod scheduler;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use futures_util::future::join_all;
use serde::Serialize;
use statline_core::{Provenance, ResolutionOutcome};
use statline_storage::{FetchRequest, HttpClientConfig, HttpFetcher, SnapshotStore, Transport};
use tracing::info;

pub use config::{FeedRegistry, StatlineConfig};
pub use orchestrator::FetchOrchestrator;
use orchestrator::endpoint_url;
pub use scheduler::{RefreshScheduler, SchedulerError, SubscriptionHandle};

pub const CRATE_NAME: &str = "statline-sync";

/// Paths checked by `probe` when none are given.
pub const DEFAULT_PROBE_PATHS: &[&str] = &[
    "/health",
    "/api/nba",
    "/api/nba/games",
    "/api/games",
    "/api/news",
    "/api/sportsbooks",
    "/api/prizepicks/analytics",
    "/api/players",
    "/api/teams",
    "/api/fantasy",
];

/// Wires the HTTP transport, the on-disk snapshot store, and the registry into a scheduler.
pub async fn build_scheduler(
    config: &StatlineConfig,
    registry: &FeedRegistry,
) -> Result<RefreshScheduler> {
    let transport = HttpFetcher::new(HttpClientConfig {
        user_agent: Some(config.user_agent.clone()),
        global_concurrency: config.http_concurrency,
    })?;
    let store = SnapshotStore::on_disk(config.snapshot_dir.clone());
    let orchestrator = FetchOrchestrator::new(
        Arc::new(transport),
        Arc::new(store),
        config.base_url.clone(),
        config.candidate_timeout(),
    );
    RefreshScheduler::new(
        Arc::new(orchestrator),
        registry.feeds.iter().cloned(),
        config.refresh_interval(),
    )
    .await
    .context("starting refresh scheduler")
}

pub async fn scheduler_from_env() -> Result<(StatlineConfig, RefreshScheduler)> {
    let config = StatlineConfig::from_env();
    let registry = FeedRegistry::load(&config.feeds_path).await?;
    let scheduler = build_scheduler(&config, &registry).await?;
    Ok((config, scheduler))
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedSyncSummary {
    pub feed_id: String,
    pub outcome: Option<ResolutionOutcome>,
    pub provenance: Option<Provenance>,
    pub records: usize,
    pub source_endpoint: Option<String>,
    pub attempts: usize,
    pub error: Option<String>,
}

/// Triggers every registered feed once, concurrently.
pub async fn sync_all(scheduler: &RefreshScheduler) -> Vec<FeedSyncSummary> {
    let feed_ids = scheduler
        .feeds()
        .into_iter()
        .map(|f| f.feed_id.clone())
        .collect::<Vec<_>>();
    let results = join_all(feed_ids.iter().map(|id| scheduler.trigger(id))).await;

    feed_ids
        .into_iter()
        .zip(results)
        .map(|(feed_id, result)| match result {
            Ok(resolution) => FeedSyncSummary {
                feed_id,
                outcome: Some(resolution.outcome),
                provenance: Some(resolution.snapshot.provenance),
                records: resolution.snapshot.records.len(),
                source_endpoint: resolution.snapshot.source_endpoint.clone(),
                attempts: resolution.attempts.len(),
                error: resolution.last_error.clone(),
            },
            Err(err) => FeedSyncSummary {
                feed_id,
                outcome: None,
                provenance: None,
                records: 0,
                source_endpoint: None,
                attempts: 0,
                error: Some(err.to_string()),
            },
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub path: String,
    pub url: String,
    pub status: Option<u16>,
    pub ok: bool,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

/// One GET per path, all at once; results keep the input order.
pub async fn probe(
    transport: &dyn Transport,
    base_url: &str,
    paths: &[String],
    timeout: Duration,
) -> Vec<ProbeResult> {
    let checks = paths.iter().map(|path| async move {
        let url = endpoint_url(base_url, path);
        let request = FetchRequest {
            url: url.clone(),
            query: Vec::new(),
            timeout,
        };
        let started = Instant::now();
        let result = transport.get_json(&request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(resp) => ProbeResult {
                path: path.clone(),
                url,
                status: Some(resp.status),
                ok: true,
                elapsed_ms,
                error: None,
            },
            Err(err) => {
                let status = err.status();
                ProbeResult {
                    path: path.clone(),
                    url,
                    status,
                    // Reachable with a 2xx, just not JSON.
                    ok: status.is_some_and(|s| (200..300).contains(&s)),
                    elapsed_ms,
                    error: Some(err.to_string()),
                }
            }
        }
    });
    let results = join_all(checks).await;
    info!(
        checked = results.len(),
        ok = results.iter().filter(|r| r.ok).count(),
        "connectivity probe finished"
    );
    results
}
