//! Schedule Store
//!
//! Persists the single armed trigger instant so a restarted process picks
//! up where it left off. The slot is a small JSON file:
//!
//! ```json
//! {"startDate": "2023-08-13T22:01:09+08:00"}
//! ```
//!
//! A missing file, a missing `startDate`, or an unreadable value all mean
//! "no schedule stored". Writes go to a sibling temp file which is synced
//! and then renamed over the slot, so readers never see a partial value.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::domain::ScheduleState;
use crate::error::{Result, SnipeError};

/// Durable slot for the next trigger instant
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Stored schedule, or `None` when nothing usable is stored
    async fn restore(&self) -> Option<ScheduleState>;

    /// Overwrite the slot
    async fn persist(&self, state: &ScheduleState) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedSchedule {
    #[serde(rename = "startDate", default, skip_serializing_if = "Option::is_none")]
    start_date: Option<serde_json::Value>,
}

/// JSON-file backed schedule store
#[derive(Debug, Clone)]
pub struct FileScheduleStore {
    path: PathBuf,
    offset: FixedOffset,
}

impl FileScheduleStore {
    /// `offset` controls how the instant is rendered on disk; the value is
    /// always read back as an absolute instant.
    pub fn new(path: impl Into<PathBuf>, offset: FixedOffset) -> Self {
        Self {
            path: path.into(),
            offset,
        }
    }

    async fn read_slot(&self) -> Result<Option<ScheduleState>> {
        let body = match tokio::fs::read_to_string(&self.path).await {
            Ok(v) => v,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SnipeError::Io(e)),
        };

        let persisted: PersistedSchedule = serde_json::from_str(&body)?;
        match persisted.start_date {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => parse_start_date(&value).map(|at| Some(ScheduleState::new(at))),
        }
    }
}

#[async_trait]
impl ScheduleStore for FileScheduleStore {
    async fn restore(&self) -> Option<ScheduleState> {
        match self.read_slot().await {
            Ok(Some(state)) => {
                debug!(
                    path = %self.path.display(),
                    "Schedule restored: {}",
                    state.trigger_instant
                );
                Some(state)
            }
            Ok(None) => {
                debug!(path = %self.path.display(), "No stored schedule");
                None
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    "Ignoring unreadable schedule file: {}",
                    e
                );
                None
            }
        }
    }

    async fn persist(&self, state: &ScheduleState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let persisted = PersistedSchedule {
            start_date: Some(serde_json::Value::String(
                state.trigger_instant.with_timezone(&self.offset).to_rfc3339(),
            )),
        };
        let body = serde_json::to_string(&persisted)?;

        let tmp = self.path.with_extension("json.tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(body.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, &self.path).await?;

        info!(path = %self.path.display(), "Data stored: {}", body);
        Ok(())
    }
}

/// Parse a stored `startDate`.
///
/// Accepts RFC 3339, the `Date.toString()` shape written by older
/// deployments (`Sun Aug 13 2023 22:01:09 GMT+0800 (Singapore Standard Time)`),
/// and unix seconds as a number or numeric string.
pub fn parse_start_date(value: &serde_json::Value) -> Result<DateTime<Utc>> {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(|| SnipeError::Persistence(format!("startDate out of range: {}", n))),
        serde_json::Value::String(s) => parse_start_date_str(s),
        other => Err(SnipeError::Persistence(format!(
            "startDate has unexpected type: {}",
            other
        ))),
    }
}

fn parse_start_date_str(raw: &str) -> Result<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(SnipeError::Persistence("startDate is empty".to_string()));
    }

    if let Ok(at) = DateTime::parse_from_rfc3339(s) {
        return Ok(at.with_timezone(&Utc));
    }

    if let Ok(secs) = s.parse::<i64>() {
        if let Some(at) = DateTime::from_timestamp(secs, 0) {
            return Ok(at);
        }
    }

    // Drop the trailing "(Zone Name)" before parsing the legacy shape
    let legacy = s.split(" (").next().unwrap_or(s);
    DateTime::parse_from_str(legacy, "%a %b %d %Y %H:%M:%S GMT%z")
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| SnipeError::Persistence(format!("unrecognised startDate {:?}: {}", raw, e)))
}

/// In-memory slot for tests
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MemoryScheduleStore {
    pub slot: tokio::sync::Mutex<Option<ScheduleState>>,
    pub writes: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MemoryScheduleStore {
    pub fn with(state: Option<ScheduleState>) -> Self {
        Self {
            slot: tokio::sync::Mutex::new(state),
            writes: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl ScheduleStore for MemoryScheduleStore {
    async fn restore(&self) -> Option<ScheduleState> {
        *self.slot.lock().await
    }

    async fn persist(&self, state: &ScheduleState) -> Result<()> {
        self.writes
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        *self.slot.lock().await = Some(*state);
        Ok(())
    }
}
