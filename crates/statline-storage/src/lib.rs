//! Snapshot persistence + HTTP transport for statline feeds.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use statline_core::{Provenance, Snapshot};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

pub const CRATE_NAME: &str = "statline-storage";

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("stored value for {key} is not a valid snapshot: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("serializing value for {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("refusing to replace a good snapshot of {feed_id} with synthetic data")]
    WouldShadowGoodSnapshot { feed_id: String },
}

/// Minimal async key/value persistence used by the snapshot store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// One JSON file per key under `root`, replaced atomically through a temp file.
#[derive(Debug, Clone)]
pub struct FileKv {
    root: PathBuf,
}

impl FileKv {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for_key(&self, key: &str) -> PathBuf {
        let slug = key
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect::<String>();
        let digest = sha256_hex(key.as_bytes());
        self.root
            .join(format!("{}-{}.json", slug.trim_matches('-'), &digest[..12]))
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl KeyValueStore for FileKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for_key(key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_err(&path)(err)),
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for_key(key);
        fs::create_dir_all(&self.root)
            .await
            .map_err(io_err(&self.root))?;

        let temp_path = self
            .root
            .join(format!(".{}.{}.tmp", Uuid::new_v4(), value.len()));
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .map_err(io_err(&temp_path))?;
        file.write_all(value).await.map_err(io_err(&temp_path))?;
        file.flush().await.map_err(io_err(&temp_path))?;
        drop(file);

        if let Err(err) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(io_err(&path)(err));
        }
        Ok(())
    }
}

fn snapshot_key(feed_id: &str) -> String {
    format!("snapshot:{feed_id}")
}

fn debug_key(feed_id: &str) -> String {
    format!("debug:{feed_id}")
}

/// Last-known-good snapshot per feed, plus an optional developer debug trace.
pub struct SnapshotStore {
    backend: Arc<dyn KeyValueStore>,
    // Feeds that held live or cached data at some point during this process.
    good_seen: Mutex<HashSet<String>>,
}

impl SnapshotStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            good_seen: Mutex::new(HashSet::new()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKv::new()))
    }

    pub fn on_disk(root: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileKv::new(root)))
    }

    pub async fn read(&self, feed_id: &str) -> Result<Option<Snapshot>, StoreError> {
        let key = snapshot_key(feed_id);
        let Some(bytes) = self.backend.get(&key).await? else {
            return Ok(None);
        };
        let snapshot: Snapshot =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt { key, source })?;
        if snapshot.provenance != Provenance::Synthetic {
            self.good_seen.lock().await.insert(feed_id.to_string());
        }
        Ok(Some(snapshot))
    }

    pub async fn write(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let feed_id = snapshot.feed_id.as_str();
        {
            let mut good_seen = self.good_seen.lock().await;
            if snapshot.provenance == Provenance::Synthetic {
                if good_seen.contains(feed_id) {
                    return Err(StoreError::WouldShadowGoodSnapshot {
                        feed_id: feed_id.to_string(),
                    });
                }
            } else {
                good_seen.insert(feed_id.to_string());
            }
        }

        let key = snapshot_key(feed_id);
        let bytes = serde_json::to_vec(snapshot).map_err(|source| StoreError::Encode {
            key: key.clone(),
            source,
        })?;
        self.backend.set(&key, &bytes).await?;
        debug!(
            feed_id,
            provenance = %snapshot.provenance,
            records = snapshot.records.len(),
            "snapshot written"
        );
        Ok(())
    }

    /// Diagnostic payload for developer tooling. The fetch path never reads it.
    pub async fn read_debug_trace(&self, feed_id: &str) -> Result<Option<JsonValue>, StoreError> {
        let key = debug_key(feed_id);
        let Some(bytes) = self.backend.get(&key).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Corrupt { key, source })
    }

    pub async fn write_debug_trace(&self, feed_id: &str, trace: &JsonValue) -> Result<(), StoreError> {
        let key = debug_key(feed_id);
        let bytes = serde_json::to_vec_pretty(trace).map_err(|source| StoreError::Encode {
            key: key.clone(),
            source,
        })?;
        self.backend.set(&key, &bytes).await
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub user_agent: Option<String>,
    pub global_concurrency: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            global_concurrency: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: u16,
    pub final_url: String,
    pub body: JsonValue,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("body from {url} (status {status}) is not JSON: {message}")]
    Decode {
        status: u16,
        url: String,
        message: String,
    },
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::HttpStatus { status, .. } | FetchError::Decode { status, .. } => Some(*status),
            FetchError::Timeout { .. } | FetchError::Transport { .. } => None,
        }
    }

    fn from_reqwest(url: &str, timeout: Duration, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Outbound GET returning a decoded JSON body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(&self, request: &FetchRequest) -> Result<FetchedResponse, FetchError>;
}

#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    global_limit: Arc<Semaphore>,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder().gzip(true).brotli(true);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self {
            client,
            global_limit: Arc::new(Semaphore::new(config.global_concurrency.max(1))),
        })
    }

    async fn send(&self, request: &FetchRequest) -> Result<FetchedResponse, FetchError> {
        let _permit = self
            .global_limit
            .acquire()
            .await
            .map_err(|_| FetchError::Transport {
                url: request.url.clone(),
                message: "fetcher is shutting down".to_string(),
            })?;

        let started = Instant::now();
        let resp = self
            .client
            .get(&request.url)
            .query(&request.query)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|err| FetchError::from_reqwest(&request.url, request.timeout, err))?;

        let status = resp.status();
        let final_url = resp.url().to_string();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: final_url,
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|err| FetchError::from_reqwest(&final_url, request.timeout, err))?;
        let body = serde_json::from_slice(&bytes).map_err(|err| FetchError::Decode {
            status: status.as_u16(),
            url: final_url.clone(),
            message: err.to_string(),
        })?;

        Ok(FetchedResponse {
            status: status.as_u16(),
            final_url,
            body,
            elapsed: started.elapsed(),
        })
    }
}

#[async_trait]
impl Transport for HttpFetcher {
    async fn get_json(&self, request: &FetchRequest) -> Result<FetchedResponse, FetchError> {
        let span = info_span!("http_fetch", url = %request.url);
        // The limit covers the wait for a concurrency permit as well as the request.
        let result = match tokio::time::timeout(request.timeout, self.send(request).instrument(span)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                url: request.url.clone(),
                timeout_ms: request.timeout.as_millis() as u64,
            }),
        };
        if let Err(err) = &result {
            warn!(url = %request.url, error = %err, "fetch failed");
        }
        result
    }
}
