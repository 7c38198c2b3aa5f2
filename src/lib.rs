pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod remote;
pub mod scheduler;
pub mod services;
pub mod signing;
pub mod strategy;

pub use config::AppConfig;
pub use error::{Result, SnipeError};
pub use persistence::{FileScheduleStore, ScheduleStore};
pub use scheduler::{TriggerScheduler, TriggerTarget};
pub use services::Report;
pub use signing::{build_accounts, CredentialSource, EnvCredentials};
pub use strategy::{AcquisitionEngine, EngineConfig, PresaleRunner, ReportSettings};
