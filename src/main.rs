mod main_runtime;

use anyhow::{bail, Context};
use presale_snipe::adapters::build_notifier;
use presale_snipe::config::AppConfig;
use presale_snipe::persistence::FileScheduleStore;
use presale_snipe::remote::build_remote_factory;
use presale_snipe::scheduler::TriggerScheduler;
use presale_snipe::signing::EnvCredentials;
use presale_snipe::strategy::{AcquisitionEngine, EngineConfig, PresaleRunner, ReportSettings};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    main_runtime::init_logging(&config.logging);

    if let Err(errors) = config.validate() {
        for e in &errors {
            error!("Config: {}", e);
        }
        bail!("invalid configuration ({} problems)", errors.len());
    }

    let offset = config.notify.local_offset()?;
    let default_start = config.sale.default_start()?;

    let factory = build_remote_factory(&config)?;
    let engine = AcquisitionEngine::new(factory, EngineConfig::from_app(&config)?);
    let notifier = build_notifier(config.notify.webhook_url.as_deref());
    if config.notify.webhook_url.is_none() {
        warn!("No webhook configured, reports go to the log only");
    }

    let runner = Arc::new(PresaleRunner::new(
        engine,
        Arc::new(EnvCredentials),
        config.sale.account_count,
        notifier,
        ReportSettings {
            subject_prefix: config.notify.subject_prefix.clone(),
            offset,
        },
    ));

    // Credentials are read again when the trigger fires; this only surfaces
    // problems early.
    match runner.check_credentials() {
        Ok(count) => info!("Credentials OK for {} accounts", count),
        Err(e) => warn!("Credential check failed, the run will abort unless fixed: {}", e),
    }

    let store = Arc::new(FileScheduleStore::new(&config.schedule.state_path, offset));
    let scheduler = TriggerScheduler::new(store, runner.clone());

    println!("\x1b[36m");
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 PRESALE SNIPE - Waiting for Round            ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!("\x1b[0m");
    println!("  Contract: {}", config.chain.contract_address);
    println!("  Accounts: {}", config.sale.account_count);
    println!("  Attempts: {}", config.execution.max_attempts);
    println!();

    let started = scheduler
        .start(default_start, config.sale.start_delay_secs)
        .await;
    let state = scheduler.state().await;
    match started {
        Ok(at) => info!(
            "Presale armed for {} ({})",
            at.with_timezone(&offset).to_rfc3339(),
            state
        ),
        Err(e) => error!("Schedule not persisted ({}): {}", state, e),
    }

    main_runtime::shutdown_signal().await;
    println!("\n\x1b[33mShutting down...\x1b[0m");

    scheduler.disarm().await;
    let aborted = runner.shutdown().await;
    info!(aborted, fires = scheduler.fire_count(), "Shutdown complete");

    println!("\x1b[32mShutdown complete.\x1b[0m");
    Ok(())
}
