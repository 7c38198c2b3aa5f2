pub mod engine;
pub mod runner;

pub use engine::{AccountResult, AcquisitionEngine, DispatchHandle, EngineConfig, RUN_STARTED};
pub use runner::{PresaleRunner, ReportSettings};
