//! JSON HTTP surface over the refresh scheduler.

use std::sync::Arc;

use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use statline_core::{EndpointCandidate, FeedKind, Provenance};
use statline_sync::RefreshScheduler;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub const CRATE_NAME: &str = "statline-web";

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<RefreshScheduler>,
}

impl AppState {
    pub fn new(scheduler: Arc<RefreshScheduler>) -> Self {
        Self { scheduler }
    }
}

#[derive(Debug, Serialize)]
struct LatestSummary {
    provenance: Provenance,
    captured_at: String,
    records: usize,
}

#[derive(Debug, Serialize)]
struct FeedRow {
    feed_id: String,
    kind: FeedKind,
    candidates: Vec<EndpointCandidate>,
    refresh_interval_secs: Option<u64>,
    fallback_count: usize,
    latest: Option<LatestSummary>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/feeds", get(feeds_handler))
        .route("/feeds/{id}/latest", get(latest_handler))
        .route("/feeds/{id}/refresh", post(refresh_handler))
        .route("/feeds/{id}/debug", get(debug_handler))
        .with_state(Arc::new(state))
}

/// Subscribes every registered feed and serves until ctrl-c.
pub async fn serve(scheduler: Arc<RefreshScheduler>, port: u16) -> anyhow::Result<()> {
    let feed_ids = scheduler
        .feeds()
        .into_iter()
        .map(|f| f.feed_id.clone())
        .collect::<Vec<_>>();
    for feed_id in &feed_ids {
        scheduler.subscribe(feed_id, None).await?;
    }

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, feeds = feed_ids.len(), "statline web listening");
    axum::serve(listener, app(AppState::new(scheduler.clone())))
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "ctrl-c handler unavailable");
            }
        })
        .await?;
    scheduler.shutdown().await?;
    Ok(())
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let (config, scheduler) = statline_sync::scheduler_from_env().await?;
    serve(Arc::new(scheduler), config.web_port).await
}

fn not_found(message: String) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    let subscriptions = state.scheduler.subscription_count().await;
    Json(json!({
        "status": "ok",
        "feeds": state.scheduler.feeds().len(),
        "subscriptions": subscriptions,
    }))
    .into_response()
}

async fn feeds_handler(State(state): State<Arc<AppState>>) -> Response {
    let mut rows = Vec::new();
    for feed in state.scheduler.feeds() {
        let latest = state
            .scheduler
            .get_latest(&feed.feed_id)
            .await
            .map(|s| LatestSummary {
                provenance: s.provenance,
                captured_at: s.captured_at.to_rfc3339(),
                records: s.records.len(),
            });
        rows.push(FeedRow {
            feed_id: feed.feed_id.clone(),
            kind: feed.kind,
            candidates: statline_core::resolve_candidates(feed),
            refresh_interval_secs: feed.refresh_interval_secs,
            fallback_count: feed.fallback_count,
            latest,
        });
    }
    Json(rows).into_response()
}

async fn latest_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
) -> Response {
    if state.scheduler.feed(&id).is_none() {
        return not_found(format!("unknown feed {id}"));
    }
    match state.scheduler.get_latest(&id).await {
        Some(snapshot) => Json(snapshot.as_ref()).into_response(),
        None => not_found(format!("no snapshot yet for {id}")),
    }
}

async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
) -> Response {
    if state.scheduler.feed(&id).is_none() {
        return not_found(format!("unknown feed {id}"));
    }
    match state.scheduler.trigger(&id).await {
        Ok(resolution) => Json(resolution.as_ref()).into_response(),
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": err.to_string(), "feed_id": err.feed_id })),
        )
            .into_response(),
    }
}

async fn debug_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
) -> Response {
    match state
        .scheduler
        .orchestrator()
        .store()
        .read_debug_trace(&id)
        .await
    {
        Ok(Some(trace)) => Json(trace).into_response(),
        Ok(None) => not_found(format!("no debug trace for {id}")),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}
