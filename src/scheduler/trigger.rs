//! One-shot trigger
//!
//! Holds at most one armed timer. Arming again replaces the previous timer;
//! a timer that has already started firing is left to finish. Fires are
//! serialized, so the target never runs twice at once.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::domain::{ScheduleState, TriggerState};
use crate::error::Result;
use crate::persistence::ScheduleStore;

/// What runs when the trigger fires
#[async_trait]
pub trait TriggerTarget: Send + Sync {
    async fn fire(&self);
}

struct ArmedTimer {
    generation: u64,
    task: JoinHandle<()>,
}

struct Inner {
    store: Arc<dyn ScheduleStore>,
    target: Arc<dyn TriggerTarget>,
    state: Mutex<TriggerState>,
    timer: Mutex<Option<ArmedTimer>>,
    fire_lock: Mutex<()>,
    generation: AtomicU64,
    fires: AtomicU64,
}

#[derive(Clone)]
pub struct TriggerScheduler {
    inner: Arc<Inner>,
}

impl TriggerScheduler {
    pub fn new(store: Arc<dyn ScheduleStore>, target: Arc<dyn TriggerTarget>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                target,
                state: Mutex::new(TriggerState::Idle),
                timer: Mutex::new(None),
                fire_lock: Mutex::new(()),
                generation: AtomicU64::new(0),
                fires: AtomicU64::new(0),
            }),
        }
    }

    /// Arm from the stored schedule, or from `default_start + extra_delay_secs`
    /// when nothing is stored. Returns the armed instant.
    ///
    /// A restored instant is armed as-is and not written back.
    pub async fn start(
        &self,
        default_start: DateTime<Utc>,
        extra_delay_secs: i64,
    ) -> Result<DateTime<Utc>> {
        if let Some(stored) = self.inner.store.restore().await {
            info!("Restored Presale: {}", stored.trigger_instant.to_rfc3339());
            self.arm(stored.trigger_instant).await;
            return Ok(stored.trigger_instant);
        }

        debug!("No stored schedule, using the published start time");
        self.schedule_next(default_start, extra_delay_secs).await
    }

    /// Persist `instant + extra_delay_secs` and arm the timer for it.
    ///
    /// The timer is armed even when the write fails; the write error is
    /// returned so the caller can decide how loud to be about it.
    pub async fn schedule_next(
        &self,
        instant: DateTime<Utc>,
        extra_delay_secs: i64,
    ) -> Result<DateTime<Utc>> {
        let next = instant + ChronoDuration::seconds(extra_delay_secs);
        info!("Next Presale: {}", next.to_rfc3339());

        let persisted = self.inner.store.persist(&ScheduleState::new(next)).await;
        self.arm(next).await;
        persisted.map(|_| next)
    }

    pub async fn state(&self) -> TriggerState {
        *self.inner.state.lock().await
    }

    /// Number of times the target has been invoked
    pub fn fire_count(&self) -> u64 {
        self.inner.fires.load(Ordering::SeqCst)
    }

    /// Cancel the armed timer, if any. Returns whether one was armed.
    pub async fn disarm(&self) -> bool {
        let previous = self.inner.timer.lock().await.take();
        *self.inner.state.lock().await = TriggerState::Idle;

        match previous {
            Some(timer) => {
                timer.task.abort();
                info!("Trigger disarmed");
                true
            }
            None => false,
        }
    }

    async fn arm(&self, at: DateTime<Utc>) {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut timer = self.inner.timer.lock().await;

        if let Some(previous) = timer.take() {
            debug!("Replacing armed trigger #{}", previous.generation);
            previous.task.abort();
        }
        *self.inner.state.lock().await = TriggerState::Armed(at);

        // Past instants fire immediately.
        let delay = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        debug!("Trigger #{} armed, fires in {:?}", generation, delay);

        let inner = self.inner.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.fire(generation).await;
        });

        *timer = Some(ArmedTimer { generation, task });
    }
}

impl Inner {
    async fn fire(&self, generation: u64) {
        let _serial = self.fire_lock.lock().await;

        {
            let mut timer = self.timer.lock().await;
            if timer.as_ref().map(|armed| armed.generation) != Some(generation) {
                debug!("Trigger #{} superseded, skipping", generation);
                return;
            }
            // Detach from the slot so a re-arm cannot abort a running fire.
            timer.take();
            *self.state.lock().await = TriggerState::Idle;
        }

        self.fires.fetch_add(1, Ordering::SeqCst);
        info!("Trigger #{} fired", generation);
        self.target.fire().await;
    }
}
