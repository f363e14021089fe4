//! Persisted webhook event log
//!
//! Each event is mirrored to `tracing` and, when enabled, appended to a file
//! as one JSON object per line:
//!
//! ```text
//! {"timestamp":"2024-05-01 12:00:00","level":"INFO","message":"Webhook received","request_id":"...","data":{...}}
//! ```

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Severity of a logged event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Normal progress
    Info,
    /// Rejected or degraded request
    Warning,
    /// Failed request
    Error,
}

/// One line of the log file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Wall-clock time in UTC, `YYYY-MM-DD HH:MM:SS`
    pub timestamp: String,
    /// Severity
    pub level: LogLevel,
    /// Event name
    pub message: String,
    /// Correlates all events of one delivery
    pub request_id: String,
    /// Structured payload
    pub data: Value,
}

/// Append-only JSON-lines log of webhook events
#[derive(Debug)]
pub struct WebhookEventLog {
    path: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl WebhookEventLog {
    /// Log to `path` when `enabled`, otherwise only to tracing
    pub fn new(path: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            path: enabled.then(|| path.into()),
            write_lock: Mutex::new(()),
        }
    }

    /// Tracing only
    pub fn disabled() -> Self {
        Self {
            path: None,
            write_lock: Mutex::new(()),
        }
    }

    /// File being written, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record an informational event
    pub async fn info(&self, request_id: &str, message: &str, data: Value) {
        self.record(LogLevel::Info, request_id, message, data).await
    }

    /// Record a rejection or degraded path
    pub async fn warning(&self, request_id: &str, message: &str, data: Value) {
        self.record(LogLevel::Warning, request_id, message, data).await
    }

    /// Record a failure
    pub async fn error(&self, request_id: &str, message: &str, data: Value) {
        self.record(LogLevel::Error, request_id, message, data).await
    }

    /// Mirror the event to tracing and append it to the file.
    ///
    /// A write failure is reported through tracing and otherwise ignored.
    pub async fn record(&self, level: LogLevel, request_id: &str, message: &str, data: Value) {
        match level {
            LogLevel::Info => info!(request_id = %request_id, data = %data, "{}", message),
            LogLevel::Warning => warn!(request_id = %request_id, data = %data, "{}", message),
            LogLevel::Error => error!(request_id = %request_id, data = %data, "{}", message),
        }

        let Some(path) = &self.path else {
            return;
        };

        let record = EventRecord {
            timestamp: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            level,
            message: message.to_string(),
            request_id: request_id.to_string(),
            data,
        };

        let mut line = match serde_json::to_vec(&record) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to encode webhook log record");
                return;
            }
        };
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        if let Err(e) = append(path, &line).await {
            warn!(path = %path.display(), error = %e, "Failed to write webhook log");
        }
    }
}

async fn append(path: &Path, line: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line).await?;
    file.flush().await
}

/// Read back every record of a log file
pub async fn read_records(path: &Path) -> crate::Result<Vec<EventRecord>> {
    let raw = tokio::fs::read_to_string(path).await?;
    raw.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str::<EventRecord>(l).map_err(crate::Error::from))
        .collect()
}
