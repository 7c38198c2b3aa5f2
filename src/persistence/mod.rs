//! Persistence Layer for schedule recovery
//!
//! The only durable state is the armed trigger instant; accounts and
//! reports are rebuilt on every run.

pub mod schedule_store;

pub use schedule_store::{parse_start_date, FileScheduleStore, ScheduleStore};
