use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The single durable schedule slot: when the next run fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleState {
    pub trigger_instant: DateTime<Utc>,
}

impl ScheduleState {
    pub fn new(trigger_instant: DateTime<Utc>) -> Self {
        Self { trigger_instant }
    }
}

/// Trigger scheduler states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    /// No timer armed
    Idle,
    /// One-shot timer armed for the instant
    Armed(DateTime<Utc>),
}

impl TriggerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerState::Idle => "IDLE",
            TriggerState::Armed(_) => "ARMED",
        }
    }
}

impl fmt::Display for TriggerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerState::Idle => write!(f, "{}", self.as_str()),
            TriggerState::Armed(at) => write!(f, "{}({})", self.as_str(), at.to_rfc3339()),
        }
    }
}

/// Per-account execution phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountPhase {
    /// Acquiring a remote handle
    Connecting,
    /// Waiting for the sale gate to open
    Polling,
    /// Purchase transaction being sent
    Submitting,
    /// Waiting for the purchase to be mined
    Confirming,
    /// Purchase confirmed and reported
    Succeeded,
    /// Attempt ceiling reached without success
    Exhausted,
}

impl AccountPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountPhase::Connecting => "CONNECTING",
            AccountPhase::Polling => "POLLING",
            AccountPhase::Submitting => "SUBMITTING",
            AccountPhase::Confirming => "CONFIRMING",
            AccountPhase::Succeeded => "SUCCEEDED",
            AccountPhase::Exhausted => "EXHAUSTED",
        }
    }
}

impl fmt::Display for AccountPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
