//! Trigger scheduling

pub mod trigger;

pub use trigger::{TriggerScheduler, TriggerTarget};
