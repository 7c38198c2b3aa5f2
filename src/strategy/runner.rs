//! What happens when the trigger fires
//!
//! Each run loads credentials fresh, builds the referral ring, opens a new
//! report and hands the accounts to the engine. The engine returns once the
//! account tasks are launched; their handles are kept for shutdown.

use async_trait::async_trait;
use chrono::FixedOffset;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::adapters::Notifier;
use crate::error::Result;
use crate::scheduler::TriggerTarget;
use crate::services::Report;
use crate::signing::{build_accounts, CredentialSource};
use crate::strategy::engine::{AccountResult, AcquisitionEngine, DispatchHandle};

/// Report settings shared by every run
#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub subject_prefix: String,
    pub offset: FixedOffset,
}

pub struct PresaleRunner {
    engine: AcquisitionEngine,
    credentials: Arc<dyn CredentialSource>,
    account_count: usize,
    notifier: Arc<dyn Notifier>,
    report_settings: ReportSettings,
    active: Mutex<Vec<DispatchHandle>>,
}

impl PresaleRunner {
    pub fn new(
        engine: AcquisitionEngine,
        credentials: Arc<dyn CredentialSource>,
        account_count: usize,
        notifier: Arc<dyn Notifier>,
        report_settings: ReportSettings,
    ) -> Self {
        Self {
            engine,
            credentials,
            account_count,
            notifier,
            report_settings,
            active: Mutex::new(Vec::new()),
        }
    }

    /// Start one run. Returns the number of account tasks launched.
    ///
    /// A missing or malformed credential aborts the whole run before any
    /// report is sent.
    pub async fn execute(&self) -> Result<usize> {
        println!("\x1b[33m");
        println!("╔══════════════════════════════════════════════════════════════╗");
        println!("║              PRESALE SNIPE - Purchase Run Starting           ║");
        println!("╚══════════════════════════════════════════════════════════════╝");
        println!("\x1b[0m");

        let accounts = build_accounts(self.account_count, self.credentials.as_ref())?;

        let report = Arc::new(Report::new(
            self.notifier.clone(),
            &self.report_settings.subject_prefix,
            self.report_settings.offset,
        ));

        let handle = self.engine.run(accounts, report).await;
        let launched = handle.len();
        self.active.lock().await.push(handle);

        Ok(launched)
    }

    /// Parse every configured credential without starting a run.
    /// Returns the number of accounts that would be launched.
    pub fn check_credentials(&self) -> Result<usize> {
        build_accounts(self.account_count, self.credentials.as_ref()).map(|accounts| accounts.len())
    }

    /// Account tasks still running across all runs
    pub async fn pending(&self) -> usize {
        self.active.lock().await.iter().map(DispatchHandle::pending).sum()
    }

    /// Wait for every launched account task
    pub async fn wait(&self) -> Vec<AccountResult> {
        let handles = std::mem::take(&mut *self.active.lock().await);
        let mut results = Vec::new();
        for handle in handles {
            results.extend(handle.join().await);
        }
        results
    }

    /// Abort account tasks that are still running. Returns how many were.
    pub async fn shutdown(&self) -> usize {
        let handles = std::mem::take(&mut *self.active.lock().await);
        let pending: usize = handles.iter().map(DispatchHandle::pending).sum();

        if pending > 0 {
            warn!("Aborting {} unfinished account tasks", pending);
        }
        for handle in handles {
            handle.abort();
            handle.join().await;
        }
        pending
    }
}

#[async_trait]
impl TriggerTarget for PresaleRunner {
    async fn fire(&self) {
        match self.execute().await {
            Ok(launched) => info!("Run dispatched {} accounts", launched),
            Err(e) => error!("Run aborted: {}", e),
        }
    }
}
