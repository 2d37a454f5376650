use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{json, Value as JsonValue};
use statline_adapters::{adapter_for_kind, FeedAdapter, NormalizeContext};
use statline_core::{
    resolve_candidates, AcquisitionUnavailable, EndpointCandidate, FeedDescriptor,
    FetchAttemptResult, Resolution, ResolutionOutcome, Snapshot,
};
use statline_storage::{sha256_hex, FetchError, FetchRequest, SnapshotStore, StoreError, Transport};
use tracing::{debug, info, info_span, warn, Instrument};

/// Walks a feed's candidates, then the snapshot store, then the fallback generator.
pub struct FetchOrchestrator {
    transport: Arc<dyn Transport>,
    store: Arc<SnapshotStore>,
    base_url: String,
    candidate_timeout: Duration,
    adapter_overrides: HashMap<String, Arc<dyn FeedAdapter>>,
}

/// Joins a candidate path onto the base URL; absolute URLs pass through.
pub(crate) fn endpoint_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base_url.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

// Raw payload (or failure) of the latest resolution, for the debug endpoint.
fn debug_trace(
    resolution: &Resolution,
    payload: Option<&JsonValue>,
) -> JsonValue {
    let fingerprint = payload
        .and_then(|body| serde_json::to_vec(body).ok())
        .map(|bytes| sha256_hex(&bytes));
    json!({
        "feed_id": resolution.snapshot.feed_id,
        "outcome": resolution.outcome,
        "provenance": resolution.snapshot.provenance,
        "captured_at": resolution.snapshot.captured_at,
        "source_endpoint": resolution.snapshot.source_endpoint,
        "records": resolution.snapshot.records.len(),
        "attempts": resolution.attempts,
        "last_error": resolution.last_error,
        "payload_sha256": fingerprint,
        "payload": payload,
        "recorded_at": Utc::now(),
    })
}

impl FetchOrchestrator {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<SnapshotStore>,
        base_url: impl Into<String>,
        candidate_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            store,
            base_url: base_url.into(),
            candidate_timeout,
            adapter_overrides: HashMap::new(),
        }
    }

    /// Replaces the built-in adapter for one feed.
    pub fn with_adapter(mut self, feed_id: impl Into<String>, adapter: Arc<dyn FeedAdapter>) -> Self {
        self.adapter_overrides.insert(feed_id.into(), adapter);
        self
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn adapter_for(&self, feed: &FeedDescriptor) -> Arc<dyn FeedAdapter> {
        self.adapter_overrides
            .get(&feed.feed_id)
            .cloned()
            .unwrap_or_else(|| Arc::from(adapter_for_kind(feed.kind)))
    }

    /// Runs one acquisition. Every fetch, normalization, and store error is absorbed;
    /// only a feed with no data source left at all yields `AcquisitionUnavailable`.
    pub async fn resolve(&self, feed: &FeedDescriptor) -> Result<Resolution, AcquisitionUnavailable> {
        let span = info_span!("resolve_feed", feed_id = %feed.feed_id, kind = %feed.kind);
        self.resolve_inner(feed).instrument(span).await
    }

    async fn resolve_inner(&self, feed: &FeedDescriptor) -> Result<Resolution, AcquisitionUnavailable> {
        let ctx = NormalizeContext::for_feed(feed, Utc::now());
        let adapter = self.adapter_for(feed);
        let candidates = resolve_candidates(feed);
        let mut attempts = Vec::with_capacity(candidates.len());
        let mut last_error = None;

        if candidates.is_empty() {
            debug!("feed has no endpoint candidates");
        }

        for candidate in candidates {
            match self.attempt(feed, &ctx, adapter.as_ref(), &candidate).await {
                Ok((records, body, attempt)) => {
                    attempts.push(attempt);
                    info!(
                        endpoint = %candidate.path,
                        records = records.len(),
                        "live data resolved"
                    );
                    let snapshot = Snapshot::live(&feed.feed_id, records, ctx.observed_at, &candidate.path);
                    self.persist(&snapshot).await;
                    let resolution = Resolution {
                        snapshot: Arc::new(snapshot),
                        outcome: ResolutionOutcome::Succeeded,
                        attempts,
                        last_error,
                    };
                    self.record_trace(&resolution, Some(&body)).await;
                    return Ok(resolution);
                }
                Err(attempt) => {
                    warn!(
                        endpoint = %candidate.path,
                        status = ?attempt.http_status,
                        error = attempt.error.as_deref().unwrap_or_default(),
                        "candidate failed"
                    );
                    last_error = attempt.error.clone();
                    attempts.push(attempt);
                }
            }
        }

        match self.store.read(&feed.feed_id).await {
            Ok(Some(stored)) => {
                let snapshot = stored.into_cached();
                info!(
                    provenance = %snapshot.provenance,
                    captured_at = %snapshot.captured_at,
                    "serving stored snapshot"
                );
                let resolution = Resolution {
                    snapshot: Arc::new(snapshot),
                    outcome: ResolutionOutcome::CacheHit,
                    attempts,
                    last_error,
                };
                self.record_trace(&resolution, None).await;
                return Ok(resolution);
            }
            Ok(None) => debug!("no stored snapshot"),
            Err(err) => warn!(error = %err, "stored snapshot unreadable"),
        }

        let records = adapter
            .synthesize(&ctx, feed.fallback_count)
            .map_err(|err| {
                let reason = match &last_error {
                    Some(fetch_err) => format!("{fetch_err}; {err}"),
                    None => err.to_string(),
                };
                warn!(%reason, "acquisition unavailable");
                AcquisitionUnavailable {
                    feed_id: feed.feed_id.clone(),
                    reason,
                }
            })?;

        info!(records = records.len(), "serving synthetic fallback");
        let snapshot = Snapshot::synthetic(&feed.feed_id, records, ctx.observed_at);
        self.persist(&snapshot).await;
        let resolution = Resolution {
            snapshot: Arc::new(snapshot),
            outcome: ResolutionOutcome::Synthesized,
            attempts,
            last_error,
        };
        self.record_trace(&resolution, None).await;
        Ok(resolution)
    }

    async fn attempt(
        &self,
        feed: &FeedDescriptor,
        ctx: &NormalizeContext,
        adapter: &dyn FeedAdapter,
        candidate: &EndpointCandidate,
    ) -> Result<(Vec<statline_core::NormalizedRecord>, JsonValue, FetchAttemptResult), FetchAttemptResult> {
        let request = FetchRequest {
            url: endpoint_url(&self.base_url, &candidate.path),
            query: feed
                .base_parameters
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            timeout: self.candidate_timeout,
        };
        let started = Instant::now();
        let failed = |http_status: Option<u16>, error: String| FetchAttemptResult {
            candidate: candidate.clone(),
            succeeded: false,
            http_status,
            error: Some(error),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        let response = match tokio::time::timeout(self.candidate_timeout, self.transport.get_json(&request)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                url: request.url.clone(),
                timeout_ms: self.candidate_timeout.as_millis() as u64,
            }),
        }
        .map_err(|err| failed(err.status(), err.to_string()))?;
        let records = adapter
            .normalize(ctx, &response.body)
            .map_err(|err| failed(Some(response.status), err.to_string()))?;

        let attempt = FetchAttemptResult {
            candidate: candidate.clone(),
            succeeded: true,
            http_status: Some(response.status),
            error: None,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        Ok((records, response.body, attempt))
    }

    async fn persist(&self, snapshot: &Snapshot) {
        match self.store.write(snapshot).await {
            Ok(()) => {}
            Err(StoreError::WouldShadowGoodSnapshot { .. }) => {
                warn!("synthetic snapshot not persisted; a good snapshot exists for this feed")
            }
            Err(err) => warn!(error = %err, "snapshot write failed"),
        }
    }

    async fn record_trace(&self, resolution: &Resolution, payload: Option<&JsonValue>) {
        let trace = debug_trace(resolution, payload);
        if let Err(err) = self
            .store
            .write_debug_trace(&resolution.snapshot.feed_id, &trace)
            .await
        {
            debug!(error = %err, "debug trace not recorded");
        }
    }
}
