use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use statline_core::FeedDescriptor;
use tokio::fs;

#[derive(Debug, Clone)]
pub struct StatlineConfig {
    pub base_url: String,
    pub refresh_interval_secs: u64,
    pub candidate_timeout_ms: u64,
    pub user_agent: String,
    pub feeds_path: PathBuf,
    pub snapshot_dir: PathBuf,
    pub http_concurrency: usize,
    pub web_port: u16,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl StatlineConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("STATLINE_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            refresh_interval_secs: env_or("STATLINE_REFRESH_INTERVAL_SECS", 120),
            candidate_timeout_ms: env_or("STATLINE_CANDIDATE_TIMEOUT_MS", 10_000),
            user_agent: std::env::var("STATLINE_USER_AGENT")
                .unwrap_or_else(|_| "statline/0.1".to_string()),
            feeds_path: std::env::var("STATLINE_FEEDS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("feeds.yaml")),
            snapshot_dir: std::env::var("STATLINE_SNAPSHOT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./snapshots")),
            http_concurrency: env_or("STATLINE_HTTP_CONCURRENCY", 8),
            web_port: env_or("STATLINE_WEB_PORT", 8000),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn candidate_timeout(&self) -> Duration {
        Duration::from_millis(self.candidate_timeout_ms.max(1))
    }
}

/// Every feed the process knows about, as declared in `feeds.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedRegistry {
    pub feeds: Vec<FeedDescriptor>,
}

impl FeedRegistry {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let registry: FeedRegistry = serde_yaml::from_str(text).context("parsing feed registry")?;
        registry.validate()?;
        Ok(registry)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("loading {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for feed in &self.feeds {
            feed.validate()?;
            if !seen.insert(feed.feed_id.as_str()) {
                bail!("feed {} is declared more than once", feed.feed_id);
            }
        }
        Ok(())
    }

    pub fn get(&self, feed_id: &str) -> Option<&FeedDescriptor> {
        self.feeds.iter().find(|f| f.feed_id == feed_id)
    }
}
