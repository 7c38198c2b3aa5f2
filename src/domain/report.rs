use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// Result of one account's purchase, produced once per account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptOutcome {
    #[serde(rename = "index")]
    pub ordinal_index: usize,
    #[serde(rename = "wallet")]
    pub masked_address: String,
    /// Native balance after the purchase, human-readable decimal
    #[serde(rename = "balance")]
    pub resulting_balance: String,
    #[serde(rename = "minted")]
    pub succeeded: bool,
}

/// Copy of the schedule at the moment a run started
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSnapshot {
    #[serde(rename = "startDate")]
    pub start_date: String,
}

impl ScheduleSnapshot {
    pub fn at(instant: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            start_date: instant.with_timezone(&offset).to_rfc3339(),
        }
    }
}

/// One line of the run report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportEntry {
    Status(String),
    Schedule(ScheduleSnapshot),
    Outcome(AttemptOutcome),
}

impl ReportEntry {
    pub fn as_outcome(&self) -> Option<&AttemptOutcome> {
        match self {
            ReportEntry::Outcome(outcome) => Some(outcome),
            _ => None,
        }
    }
}
