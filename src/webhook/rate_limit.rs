//! Webhook rate limiting
//!
//! Counts admitted requests per identifier over a trailing window. Every call
//! runs prune, count and append as one critical section so concurrent
//! deliveries cannot both pass the count check before either records itself.
//!
//! Two stores implement [`RateLimitStore`]:
//!
//! - [`InMemoryRateLimitStore`]: process-local, the default
//! - [`FileRateLimitStore`]: a JSON array of `{"id", "time"}` entries on disk,
//!   for state that survives restarts

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::RateLimitConfig;
use crate::error::StoreError;

/// One admitted request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitEntry {
    /// Identifier the request counted against
    pub id: String,
    /// Unix timestamp (seconds) of admission
    pub time: i64,
}

/// Backing store for the limiter
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Admit `identifier` at `now` if it has fewer than `max_requests` entries
    /// younger than `window`.
    ///
    /// Entries of any identifier older than the window are dropped first. A
    /// rejected request is not recorded.
    async fn try_admit(
        &self,
        identifier: &str,
        max_requests: u32,
        window: Duration,
        now: i64,
    ) -> Result<bool, StoreError>;
}

/// Prune, count and maybe append. Returns whether `identifier` was admitted.
fn admit(
    entries: &mut Vec<RateLimitEntry>,
    identifier: &str,
    max_requests: u32,
    window: Duration,
    now: i64,
) -> bool {
    let window_secs = i64::try_from(window.as_secs()).unwrap_or(i64::MAX);
    entries.retain(|e| now.saturating_sub(e.time) < window_secs);

    let count = entries.iter().filter(|e| e.id == identifier).count();
    if count >= max_requests as usize {
        return false;
    }

    entries.push(RateLimitEntry {
        id: identifier.to_string(),
        time: now,
    });
    true
}

// =============================================================================
// In-memory store
// =============================================================================

/// Process-local store
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    entries: Mutex<Vec<RateLimitEntry>>,
}

impl InMemoryRateLimitStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the store holds no entries
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn try_admit(
        &self,
        identifier: &str,
        max_requests: u32,
        window: Duration,
        now: i64,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        Ok(admit(&mut entries, identifier, max_requests, window, now))
    }
}

// =============================================================================
// File store
// =============================================================================

/// JSON file store.
///
/// The file holds `[{"id": "...", "time": 1700000000}, ...]`. Access within the
/// process is serialised by a mutex; writes go to a temporary file that is
/// then renamed over the existing file. Multiple processes sharing one file are not
/// coordinated.
#[derive(Debug)]
pub struct FileRateLimitStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileRateLimitStore {
    /// Use (and create on first write) the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<RateLimitEntry>, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.display().to_string(),
                    source,
                })
            }
        };

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str(&raw) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Rate limit file is corrupt, resetting"
                );
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, entries: &[RateLimitEntry]) -> Result<(), StoreError> {
        let encoded = serde_json::to_vec(entries).map_err(|e| StoreError::Corrupt {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.path.display().to_string(),
            source,
        };
        tokio::fs::write(&tmp, encoded).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}

#[async_trait]
impl RateLimitStore for FileRateLimitStore {
    async fn try_admit(
        &self,
        identifier: &str,
        max_requests: u32,
        window: Duration,
        now: i64,
    ) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;

        let mut entries = self.load().await?;
        let before = entries.len();
        let admitted = admit(&mut entries, identifier, max_requests, window, now);

        // Nothing pruned and nothing appended: the file is already current
        if admitted || entries.len() != before {
            self.save(&entries).await?;
        }
        Ok(admitted)
    }
}

// =============================================================================
// Limiter
// =============================================================================

/// Rate limiter bound to one threshold and one store
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    max_requests: u32,
    window: Duration,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_requests", &self.max_requests)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Create a limiter over `store`
    pub fn new(store: Arc<dyn RateLimitStore>, max_requests: u32, window: Duration) -> Self {
        Self {
            store,
            max_requests,
            window,
        }
    }

    /// Limiter with an in-memory store
    pub fn in_memory(max_requests: u32, window: Duration) -> Self {
        Self::new(Arc::new(InMemoryRateLimitStore::new()), max_requests, window)
    }

    /// Limiter for the configured store and thresholds
    pub fn from_config(config: &RateLimitConfig) -> Self {
        let store: Arc<dyn RateLimitStore> = match &config.store_path {
            Some(path) => Arc::new(FileRateLimitStore::new(path)),
            None => Arc::new(InMemoryRateLimitStore::new()),
        };
        Self::new(store, config.max_requests, config.window)
    }

    /// Admit `identifier` now
    pub async fn try_admit(&self, identifier: &str) -> Result<bool, StoreError> {
        self.try_admit_at(identifier, Utc::now().timestamp()).await
    }

    /// Admit `identifier` at an explicit unix time
    pub async fn try_admit_at(&self, identifier: &str, now: i64) -> Result<bool, StoreError> {
        let admitted = self
            .store
            .try_admit(identifier, self.max_requests, self.window, now)
            .await?;
        debug!(identifier = %identifier, admitted, "Rate limit check");
        Ok(admitted)
    }

    /// Requests admitted per identifier within the window
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Window length
    pub fn window(&self) -> Duration {
        self.window
    }
}
