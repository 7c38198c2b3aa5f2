//! Run report
//!
//! Append-only log of one run: status lines, the schedule snapshot and one
//! outcome per finished account. Account tasks append concurrently, so the
//! order of outcomes follows completion order and nothing more. Each flush
//! sends the whole log so far; later flushes are supersets of earlier ones.

use chrono::{DateTime, FixedOffset, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::adapters::Notifier;
use crate::domain::{AttemptOutcome, ReportEntry, ScheduleSnapshot};

pub struct Report {
    entries: RwLock<Vec<ReportEntry>>,
    notifier: Arc<dyn Notifier>,
    subject_prefix: String,
    offset: FixedOffset,
    flushes: AtomicU64,
}

impl Report {
    pub fn new(notifier: Arc<dyn Notifier>, subject_prefix: &str, offset: FixedOffset) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            notifier,
            subject_prefix: subject_prefix.to_string(),
            offset,
            flushes: AtomicU64::new(0),
        }
    }

    pub async fn push(&self, entry: ReportEntry) {
        self.entries.write().await.push(entry);
    }

    pub async fn status(&self, text: impl Into<String>) {
        self.push(ReportEntry::Status(text.into())).await;
    }

    pub async fn record_outcome(&self, outcome: AttemptOutcome) {
        self.push(ReportEntry::Outcome(outcome)).await;
    }

    /// Record the moment the run actually fired
    pub async fn schedule_snapshot(&self, fired_at: DateTime<Utc>) {
        self.push(ReportEntry::Schedule(ScheduleSnapshot::at(fired_at, self.offset)))
            .await;
    }

    pub async fn snapshot(&self) -> Vec<ReportEntry> {
        self.entries.read().await.clone()
    }

    pub async fn outcomes(&self) -> Vec<AttemptOutcome> {
        self.entries
            .read()
            .await
            .iter()
            .filter_map(ReportEntry::as_outcome)
            .cloned()
            .collect()
    }

    /// Number of flushes handed to the notifier so far
    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    /// Subject line with the local date, e.g. `Presale Report: 13/08/2023, 22:01:09`
    pub fn subject_at(&self, now: DateTime<Utc>) -> String {
        format!(
            "{}: {}",
            self.subject_prefix,
            now.with_timezone(&self.offset).format("%d/%m/%Y, %H:%M:%S")
        )
    }

    /// Send everything recorded so far. Delivery failures are logged only.
    pub async fn flush(&self) {
        let body = {
            let entries = self.entries.read().await;
            match serde_json::to_string_pretty(&*entries) {
                Ok(body) => body,
                Err(e) => {
                    error!("Failed to serialize report: {}", e);
                    return;
                }
            }
        };

        self.flushes.fetch_add(1, Ordering::Relaxed);
        let subject = self.subject_at(Utc::now());
        debug!("{}", body);

        if let Err(e) = self.notifier.send(&subject, &body).await {
            error!("Failed to deliver report: {}", e);
        }
    }
}
