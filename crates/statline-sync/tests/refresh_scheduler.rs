use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use statline_core::{FeedDescriptor, FeedKind, Provenance, ResolutionOutcome};
use statline_storage::{FetchError, FetchRequest, FetchedResponse, SnapshotStore, Transport};
use statline_sync::{probe, sync_all, FetchOrchestrator, RefreshScheduler, SchedulerError};

const BASE: &str = "http://upstream.test";

/// Answers from a path table after a short delay, counting calls per URL.
#[derive(Default)]
struct SlowUpstream {
    bodies: HashMap<String, JsonValue>,
    calls: Mutex<HashMap<String, usize>>,
}

impl SlowUpstream {
    fn serve(mut self, path: &str, body: JsonValue) -> Self {
        self.bodies.insert(format!("{BASE}{path}"), body);
        self
    }

    fn calls_to(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&format!("{BASE}{path}"))
            .copied()
            .unwrap_or(0)
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl Transport for SlowUpstream {
    async fn get_json(&self, request: &FetchRequest) -> Result<FetchedResponse, FetchError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(request.url.clone())
            .or_default() += 1;
        tokio::time::sleep(Duration::from_millis(40)).await;
        match self.bodies.get(&request.url) {
            Some(body) => Ok(FetchedResponse {
                status: 200,
                final_url: request.url.clone(),
                body: body.clone(),
                elapsed: Duration::from_millis(40),
            }),
            None => Err(FetchError::HttpStatus {
                status: 500,
                url: request.url.clone(),
            }),
        }
    }
}

fn feeds() -> Vec<FeedDescriptor> {
    vec![
        FeedDescriptor::new("player-props:nba", FeedKind::PlayerProp)
            .with_parameter("sport", "nba")
            .with_candidate("/api/prizepicks/selections", 1, "Selections")
            .with_candidate("/api/prizepicks/picks", 2, "Picks"),
        FeedDescriptor::new("games:nba", FeedKind::Game)
            .with_parameter("sport", "nba")
            .with_candidate("/api/nba/games", 1, "NBA Games")
            .with_fallback_count(3),
        FeedDescriptor::new("analytics:nba", FeedKind::Analytics)
            .with_candidate("/api/prizepicks/analytics", 1, "Analytics")
            .with_fallback_count(0),
    ]
}

fn props_body() -> JsonValue {
    json!({ "selections": [
        { "player_name": "Nikola Jokic", "prop_type": "rebounds", "line": 12.5, "team": "DEN" },
        { "player_name": "Jamal Murray", "prop_type": "assists", "line": 6.5, "team": "DEN" }
    ] })
}

async fn scheduler_with(upstream: Arc<SlowUpstream>, store: Arc<SnapshotStore>) -> RefreshScheduler {
    let orchestrator = FetchOrchestrator::new(upstream, store, BASE, Duration::from_millis(500));
    RefreshScheduler::new(Arc::new(orchestrator), feeds(), Duration::from_secs(120))
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_triggers_share_one_orchestration() {
    let upstream = Arc::new(SlowUpstream::default().serve("/api/prizepicks/picks", props_body()));
    let scheduler = scheduler_with(upstream.clone(), Arc::new(SnapshotStore::in_memory())).await;

    let (a, b) = tokio::join!(
        scheduler.trigger("player-props:nba"),
        scheduler.trigger("player-props:nba")
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(upstream.calls_to("/api/prizepicks/selections"), 1);
    assert_eq!(upstream.calls_to("/api/prizepicks/picks"), 1);
    assert_eq!(a.snapshot.source_endpoint.as_deref(), Some("/api/prizepicks/picks"));

    // A later trigger starts a fresh orchestration.
    let c = scheduler.trigger("player-props:nba").await.unwrap();
    assert!(!Arc::ptr_eq(&a, &c));
    assert_eq!(upstream.calls_to("/api/prizepicks/picks"), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn get_latest_follows_triggers_and_store() {
    let dir = tempfile::tempdir().unwrap();
    let upstream = Arc::new(SlowUpstream::default());
    let scheduler = scheduler_with(upstream, Arc::new(SnapshotStore::on_disk(dir.path()))).await;

    assert!(scheduler.get_latest("games:nba").await.is_none());
    let resolution = scheduler.trigger("games:nba").await.unwrap();
    assert_eq!(resolution.outcome, ResolutionOutcome::Synthesized);

    let latest = scheduler.get_latest("games:nba").await.unwrap();
    assert!(Arc::ptr_eq(&latest, &resolution.snapshot));
    assert_eq!(latest.records.len(), 3);
    assert!(latest.records.iter().all(|r| r.missing_fields().is_empty()));

    // A fresh process sees what the first one stored.
    let restarted = scheduler_with(
        Arc::new(SlowUpstream::default()),
        Arc::new(SnapshotStore::on_disk(dir.path())),
    )
    .await;
    let stored = restarted.get_latest("games:nba").await.unwrap();
    assert_eq!(stored.provenance, Provenance::Synthetic);
    assert_eq!(stored.captured_at, latest.captured_at);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn live_snapshot_from_disk_is_served_as_cached_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let first = scheduler_with(
        Arc::new(SlowUpstream::default().serve("/api/prizepicks/selections", props_body())),
        Arc::new(SnapshotStore::on_disk(dir.path())),
    )
    .await;
    let live = first.trigger("player-props:nba").await.unwrap();
    assert_eq!(live.snapshot.provenance, Provenance::Live);

    let offline = scheduler_with(
        Arc::new(SlowUpstream::default()),
        Arc::new(SnapshotStore::on_disk(dir.path())),
    )
    .await;
    let resolution = offline.trigger("player-props:nba").await.unwrap();
    assert_eq!(resolution.outcome, ResolutionOutcome::CacheHit);
    assert_eq!(resolution.snapshot.provenance, Provenance::Cached);
    assert_eq!(resolution.snapshot.captured_at, live.snapshot.captured_at);
    assert_eq!(resolution.snapshot.records, live.snapshot.records);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unavailable_feed_reports_without_snapshot() {
    let scheduler = scheduler_with(
        Arc::new(SlowUpstream::default()),
        Arc::new(SnapshotStore::in_memory()),
    )
    .await;
    let err = scheduler.trigger("analytics:nba").await.unwrap_err();
    assert_eq!(err.feed_id, "analytics:nba");
    assert!(scheduler.get_latest("analytics:nba").await.is_none());

    let unknown = scheduler.trigger("hockey:nhl").await.unwrap_err();
    assert!(unknown.reason.contains("not registered"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn subscribe_refreshes_immediately_and_unsubscribe_stops_ticks() {
    let upstream = Arc::new(SlowUpstream::default().serve("/api/nba/games", json!({ "games": [] })));
    let scheduler = scheduler_with(upstream.clone(), Arc::new(SnapshotStore::in_memory())).await;

    let handle = scheduler
        .subscribe("games:nba", Some(Duration::from_secs(1)))
        .await
        .unwrap();
    assert_eq!(handle.feed_id, "games:nba");
    assert_eq!(scheduler.subscription_count().await, 1);

    // Joins the refresh subscribe already started.
    let first = scheduler.trigger("games:nba").await.unwrap();
    assert_eq!(first.snapshot.provenance, Provenance::Live);
    assert_eq!(upstream.calls_to("/api/nba/games"), 1);

    let mut waited = Duration::ZERO;
    while upstream.calls_to("/api/nba/games") < 2 && waited < Duration::from_secs(5) {
        tokio::time::sleep(Duration::from_millis(100)).await;
        waited += Duration::from_millis(100);
    }
    assert!(upstream.calls_to("/api/nba/games") >= 2, "periodic refresh never ran");

    scheduler.unsubscribe(&handle).await.unwrap();
    assert_eq!(scheduler.subscription_count().await, 0);
    // Let any tick that was already running finish.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let after = upstream.total_calls();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(upstream.total_calls(), after);

    // Unsubscribing twice is harmless.
    scheduler.unsubscribe(&handle).await.unwrap();
    scheduler.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn subscribe_rejects_unknown_feeds_and_tiny_intervals() {
    let scheduler = scheduler_with(
        Arc::new(SlowUpstream::default()),
        Arc::new(SnapshotStore::in_memory()),
    )
    .await;
    assert!(matches!(
        scheduler.subscribe("hockey:nhl", None).await,
        Err(SchedulerError::UnknownFeed(_))
    ));
    assert!(matches!(
        scheduler
            .subscribe("games:nba", Some(Duration::from_millis(10)))
            .await,
        Err(SchedulerError::InvalidInterval(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sync_all_reports_every_feed() {
    let upstream = Arc::new(SlowUpstream::default().serve("/api/prizepicks/selections", props_body()));
    let scheduler = scheduler_with(upstream, Arc::new(SnapshotStore::in_memory())).await;

    let summaries = sync_all(&scheduler).await;
    let by_id = summaries
        .iter()
        .map(|s| (s.feed_id.as_str(), s))
        .collect::<HashMap<_, _>>();
    assert_eq!(by_id.len(), 3);
    assert_eq!(by_id["player-props:nba"].provenance, Some(Provenance::Live));
    assert_eq!(by_id["player-props:nba"].records, 2);
    assert_eq!(by_id["games:nba"].provenance, Some(Provenance::Synthetic));
    assert!(by_id["analytics:nba"].outcome.is_none());
    assert!(by_id["analytics:nba"].error.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn probe_reports_each_path_in_order() {
    let upstream = SlowUpstream::default().serve("/health", json!({ "status": "ok" }));
    let paths = vec!["/health".to_string(), "/api/news".to_string()];
    let results = probe(&upstream, BASE, &paths, Duration::from_millis(200)).await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].path, "/health");
    assert!(results[0].ok);
    assert_eq!(results[0].status, Some(200));
    assert!(!results[1].ok);
    assert_eq!(results[1].status, Some(500));
    assert!(results[1].error.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connectivity_check_joins_relative_paths_onto_the_base() {
    let upstream = SlowUpstream::default().serve("/api/nba/games", json!({ "games": [] }));
    let paths = vec!["api/nba/games".to_string()];
    let results = probe(&upstream, "http://upstream.test/", &paths, Duration::from_millis(200)).await;

    assert_eq!(results[0].url, "http://upstream.test/api/nba/games");
    assert!(results[0].ok);
    assert_eq!(upstream.calls_to("/api/nba/games"), 1);
}
