use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use statline_core::{AcquisitionUnavailable, FeedDescriptor, Resolution, Snapshot};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::orchestrator::FetchOrchestrator;

type ResolutionResult = Result<Arc<Resolution>, AcquisitionUnavailable>;
type InFlight = Shared<BoxFuture<'static, ResolutionResult>>;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("feed {0} is not registered")]
    UnknownFeed(String),
    #[error("refresh interval for feed {0} must be at least one second")]
    InvalidInterval(String),
    #[error("job scheduler: {0}")]
    Jobs(#[from] JobSchedulerError),
}

/// Returned by `subscribe`; pass back to `unsubscribe` to stop the periodic refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    pub id: Uuid,
    pub feed_id: String,
    pub interval: Duration,
}

struct Hub {
    orchestrator: Arc<FetchOrchestrator>,
    feeds: HashMap<String, FeedDescriptor>,
    in_flight: Mutex<HashMap<String, InFlight>>,
    latest: RwLock<HashMap<String, Arc<Snapshot>>>,
}

impl Hub {
    /// Joins the running orchestration for the feed, or spawns one.
    async fn begin(self: &Arc<Self>, feed_id: &str) -> Result<InFlight, AcquisitionUnavailable> {
        let Some(feed) = self.feeds.get(feed_id).cloned() else {
            return Err(AcquisitionUnavailable {
                feed_id: feed_id.to_string(),
                reason: "feed is not registered".to_string(),
            });
        };

        let mut in_flight = self.in_flight.lock().await;
        if let Some(running) = in_flight.get(feed_id) {
            debug!(feed_id, "joining in-flight refresh");
            return Ok(running.clone());
        }

        // Spawned so the work finishes even when every caller goes away.
        let hub = Arc::clone(self);
        let task = tokio::spawn(async move { hub.run(feed).await });
        let owned_id = feed_id.to_string();
        let shared = async move {
            match task.await {
                Ok(result) => result,
                Err(err) => Err(AcquisitionUnavailable {
                    feed_id: owned_id,
                    reason: format!("refresh task failed: {err}"),
                }),
            }
        }
        .boxed()
        .shared();
        in_flight.insert(feed_id.to_string(), shared.clone());
        Ok(shared)
    }

    async fn run(self: Arc<Self>, feed: FeedDescriptor) -> ResolutionResult {
        let result = self.orchestrator.resolve(&feed).await.map(Arc::new);
        match &result {
            Ok(resolution) => {
                self.latest
                    .write()
                    .await
                    .insert(feed.feed_id.clone(), Arc::clone(&resolution.snapshot));
            }
            Err(err) => warn!(feed_id = %feed.feed_id, error = %err, "refresh produced no snapshot"),
        }
        self.in_flight.lock().await.remove(&feed.feed_id);
        result
    }

    async fn trigger(self: &Arc<Self>, feed_id: &str) -> ResolutionResult {
        self.begin(feed_id).await?.await
    }
}

/// Owns the periodic refresh of subscribed feeds and de-duplicates concurrent refreshes.
pub struct RefreshScheduler {
    hub: Arc<Hub>,
    jobs: JobScheduler,
    default_interval: Duration,
    subscriptions: Mutex<HashMap<Uuid, String>>,
}

impl RefreshScheduler {
    pub async fn new(
        orchestrator: Arc<FetchOrchestrator>,
        feeds: impl IntoIterator<Item = FeedDescriptor>,
        default_interval: Duration,
    ) -> Result<Self, SchedulerError> {
        let jobs = JobScheduler::new().await?;
        jobs.start().await?;
        Ok(Self {
            hub: Arc::new(Hub {
                orchestrator,
                feeds: feeds
                    .into_iter()
                    .map(|feed| (feed.feed_id.clone(), feed))
                    .collect(),
                in_flight: Mutex::new(HashMap::new()),
                latest: RwLock::new(HashMap::new()),
            }),
            jobs,
            default_interval,
            subscriptions: Mutex::new(HashMap::new()),
        })
    }

    pub fn orchestrator(&self) -> &Arc<FetchOrchestrator> {
        &self.hub.orchestrator
    }

    /// Registered feeds, sorted by id.
    pub fn feeds(&self) -> Vec<&FeedDescriptor> {
        let mut feeds = self.hub.feeds.values().collect::<Vec<_>>();
        feeds.sort_by(|a, b| a.feed_id.cmp(&b.feed_id));
        feeds
    }

    pub fn feed(&self, feed_id: &str) -> Option<&FeedDescriptor> {
        self.hub.feeds.get(feed_id)
    }

    /// Refreshes now, then on every tick of `interval` (feed or process default when `None`).
    pub async fn subscribe(
        &self,
        feed_id: &str,
        interval: Option<Duration>,
    ) -> Result<SubscriptionHandle, SchedulerError> {
        let feed = self
            .hub
            .feeds
            .get(feed_id)
            .ok_or_else(|| SchedulerError::UnknownFeed(feed_id.to_string()))?;
        let interval = interval
            .or_else(|| feed.refresh_interval_secs.map(Duration::from_secs))
            .unwrap_or(self.default_interval);
        if interval < Duration::from_secs(1) {
            return Err(SchedulerError::InvalidInterval(feed_id.to_string()));
        }

        let hub = Arc::clone(&self.hub);
        let job_feed = feed_id.to_string();
        let job = Job::new_repeated_async(interval, move |_id, _jobs| {
            let hub = Arc::clone(&hub);
            let feed_id = job_feed.clone();
            Box::pin(async move {
                debug!(%feed_id, "scheduled refresh");
                // Failures are logged inside the hub.
                let _ = hub.trigger(&feed_id).await;
            })
        })?;
        let id = self.jobs.add(job).await?;
        self.subscriptions
            .lock()
            .await
            .insert(id, feed_id.to_string());

        if let Err(err) = self.hub.begin(feed_id).await {
            warn!(feed_id, error = %err, "initial refresh not started");
        }
        info!(feed_id, interval_secs = interval.as_secs(), %id, "subscribed");

        Ok(SubscriptionHandle {
            id,
            feed_id: feed_id.to_string(),
            interval,
        })
    }

    /// Refreshes a feed now. Concurrent callers share one orchestration and its result.
    pub async fn trigger(&self, feed_id: &str) -> Result<Arc<Resolution>, AcquisitionUnavailable> {
        self.hub.trigger(feed_id).await
    }

    /// Stops future ticks. A refresh already running completes and is still stored.
    pub async fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<(), SchedulerError> {
        if self.subscriptions.lock().await.remove(&handle.id).is_none() {
            return Ok(());
        }
        self.jobs.remove(&handle.id).await?;
        info!(feed_id = %handle.feed_id, id = %handle.id, "unsubscribed");
        Ok(())
    }

    pub async fn subscription_count(&self) -> usize {
        self.subscriptions.lock().await.len()
    }

    /// Latest snapshot from this process, else the stored one, else `None`.
    pub async fn get_latest(&self, feed_id: &str) -> Option<Arc<Snapshot>> {
        if let Some(snapshot) = self.hub.latest.read().await.get(feed_id) {
            return Some(Arc::clone(snapshot));
        }
        match self.hub.orchestrator.store().read(feed_id).await {
            Ok(stored) => stored.map(|s| Arc::new(s.into_cached())),
            Err(err) => {
                warn!(feed_id, error = %err, "stored snapshot unreadable");
                None
            }
        }
    }

    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        let mut jobs = self.jobs.clone();
        jobs.shutdown().await?;
        self.subscriptions.lock().await.clear();
        Ok(())
    }
}
