//! Acquisition execution engine
//!
//! Drives every account through connect -> poll gate -> submit -> confirm,
//! each account in its own task. A failed step restarts the account's
//! attempt from a fresh connection until the attempt ceiling is reached.
//!
//! The gate poll has no timeout: an account waits until the round opens or
//! the process stops.

use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::domain::{AccountPhase, AccountRecord, AttemptOutcome};
use crate::error::{Result, SnipeError};
use crate::remote::{PresaleHandle, RemoteFactory};
use crate::services::Report;

pub const RUN_STARTED: &str = "PRESALE STARTED!";

/// Engine tuning, resolved from `AppConfig`
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_attempts: u32,
    pub poll_interval: Duration,
    pub confirmation_timeout: Duration,
    /// Purchase size in the smallest unit
    pub purchase_amount: U256,
    pub report_terminal_failures: bool,
}

impl EngineConfig {
    pub fn from_app(app_config: &AppConfig) -> Result<Self> {
        Ok(Self {
            max_attempts: app_config.execution.max_attempts,
            poll_interval: app_config.execution.poll_interval(),
            confirmation_timeout: app_config.execution.confirmation_timeout(),
            purchase_amount: app_config.sale.purchase_amount_wei()?,
            report_terminal_failures: app_config.execution.report_terminal_failures,
        })
    }
}

/// How an account task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountResult {
    Succeeded { index: usize, attempts: u32 },
    Exhausted { index: usize, attempts: u32 },
}

impl AccountResult {
    pub fn is_success(&self) -> bool {
        matches!(self, AccountResult::Succeeded { .. })
    }
}

/// Account tasks launched by one run.
///
/// Dropping this detaches the tasks; they keep running.
pub struct DispatchHandle {
    tasks: Vec<JoinHandle<AccountResult>>,
    /// Run-start report delivery, sent alongside the account tasks
    announce: Option<JoinHandle<()>>,
}

impl DispatchHandle {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks that have not finished yet
    pub fn pending(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_finished()).count()
    }

    pub fn abort(&self) {
        for task in &self.tasks {
            task.abort();
        }
        if let Some(announce) = &self.announce {
            announce.abort();
        }
    }

    /// Wait for every task; cancelled or panicked tasks are logged and skipped
    pub async fn join(self) -> Vec<AccountResult> {
        if let Some(announce) = self.announce {
            if let Err(e) = announce.await {
                if !e.is_cancelled() {
                    error!("Run-start report task panicked: {}", e);
                }
            }
        }

        let mut results = Vec::with_capacity(self.tasks.len());
        for task in self.tasks {
            match task.await {
                Ok(result) => results.push(result),
                Err(e) if e.is_cancelled() => debug!("Account task cancelled"),
                Err(e) => error!("Account task panicked: {}", e),
            }
        }
        results
    }
}

pub struct AcquisitionEngine {
    factory: Arc<dyn RemoteFactory>,
    config: EngineConfig,
}

impl AcquisitionEngine {
    pub fn new(factory: Arc<dyn RemoteFactory>, config: EngineConfig) -> Self {
        Self { factory, config }
    }

    /// Start a run: record the start marker, launch one task per account,
    /// then send the run-start report in the background. Returns as soon as
    /// the tasks are spawned; report delivery never holds up an account.
    pub async fn run(&self, accounts: Vec<AccountRecord>, report: Arc<Report>) -> DispatchHandle {
        report.status(RUN_STARTED).await;
        report.schedule_snapshot(chrono::Utc::now()).await;

        let mut handle = self.dispatch(accounts, report.clone());
        handle.announce = Some(tokio::spawn(async move {
            report.flush().await;
        }));
        handle
    }

    /// Launch one independent task per account without waiting on any of them
    pub fn dispatch(&self, accounts: Vec<AccountRecord>, report: Arc<Report>) -> DispatchHandle {
        let tasks = accounts
            .into_iter()
            .map(|account| {
                let factory = self.factory.clone();
                let config = self.config.clone();
                let report = report.clone();
                tokio::spawn(async move {
                    let referrer = account.referrer;
                    run_account(factory.as_ref(), &config, &account, referrer, &report).await
                })
            })
            .collect::<Vec<_>>();

        info!("Dispatched {} account tasks", tasks.len());
        DispatchHandle {
            tasks,
            announce: None,
        }
    }
}

/// Run one account to success or to the attempt ceiling.
///
/// Every failure restarts from a fresh connection with the next attempt
/// number. Only a success is reported by default; an exhausted account is
/// logged and, when `report_terminal_failures` is set, recorded as failed.
pub async fn run_account(
    factory: &dyn RemoteFactory,
    config: &EngineConfig,
    account: &AccountRecord,
    referrer: Address,
    report: &Report,
) -> AccountResult {
    let mut attempt: u32 = 1;

    loop {
        if attempt > config.max_attempts {
            let attempts = attempt - 1;
            error!(
                account = account.index,
                attempts,
                phase = %AccountPhase::Exhausted,
                "Giving up on wallet {}",
                account.masked_address()
            );

            if config.report_terminal_failures {
                report
                    .record_outcome(AttemptOutcome {
                        ordinal_index: account.index,
                        masked_address: account.masked_address(),
                        resulting_balance: "unknown".to_string(),
                        succeeded: false,
                    })
                    .await;
                report.flush().await;
            }

            return AccountResult::Exhausted {
                index: account.index,
                attempts,
            };
        }

        info!(account = account.index, attempt, "Try #{}...", attempt);

        match attempt_purchase(factory, config, account, referrer).await {
            Ok(outcome) => {
                report.record_outcome(outcome).await;
                report.flush().await;
                return AccountResult::Succeeded {
                    index: account.index,
                    attempts: attempt,
                };
            }
            Err(e) => {
                warn!(
                    account = account.index,
                    attempt,
                    transient = e.is_transient(),
                    "Attempt failed, retrying: {}",
                    e
                );
                attempt += 1;
            }
        }
    }
}

async fn attempt_purchase(
    factory: &dyn RemoteFactory,
    config: &EngineConfig,
    account: &AccountRecord,
    referrer: Address,
) -> Result<AttemptOutcome> {
    debug!(account = account.index, phase = %AccountPhase::Connecting);
    let handle = factory.connect(account).await?;

    debug!(account = account.index, phase = %AccountPhase::Polling);
    wait_for_gate(handle.as_ref(), config.poll_interval).await?;

    debug!(account = account.index, phase = %AccountPhase::Submitting);
    let pending = handle.purchase(config.purchase_amount, referrer).await?;

    debug!(account = account.index, phase = %AccountPhase::Confirming);
    let receipt = match timeout(config.confirmation_timeout, handle.confirm(&pending)).await {
        Ok(receipt) => receipt?,
        Err(_) => {
            return Err(SnipeError::ConfirmationTimeout {
                tx_hash: format!("{:?}", pending.tx_hash),
                elapsed_secs: config.confirmation_timeout.as_secs(),
            })
        }
    };

    info!(
        account = account.index,
        phase = %AccountPhase::Succeeded,
        "Wallet{}: success (tx {:?}, block {:?})",
        account.index,
        receipt.tx_hash,
        receipt.block_number
    );

    // The purchase is already mined here; a failed balance read must not
    // trigger a second purchase.
    let balance = match handle.balance_of(account.address).await {
        Ok(wei) => display_balance(wei),
        Err(e) => {
            warn!(account = account.index, "Balance lookup failed: {}", e);
            "unknown".to_string()
        }
    };
    info!(account = account.index, "Balance: {}", balance);

    Ok(AttemptOutcome {
        ordinal_index: account.index,
        masked_address: account.masked_address(),
        resulting_balance: balance,
        succeeded: true,
    })
}

/// Native balance in whole units with trailing zeros trimmed, e.g. `0.25`
fn display_balance(wei: U256) -> String {
    let full = format_ether(wei);
    match full.parse::<Decimal>() {
        Ok(amount) => amount.normalize().to_string(),
        Err(_) => full,
    }
}

/// Query the gate until it opens, sleeping `interval` between queries
async fn wait_for_gate(handle: &dyn PresaleHandle, interval: Duration) -> Result<()> {
    loop {
        if handle.round_open().await? {
            return Ok(());
        }
        sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::LogNotifier;
    use crate::domain::ReportEntry;
    use crate::remote::testing::{test_accounts as accounts, FakeChain, FakeFactory};
    use chrono::FixedOffset;

    fn engine_config() -> EngineConfig {
        EngineConfig {
            max_attempts: 5,
            poll_interval: Duration::from_millis(5),
            confirmation_timeout: Duration::from_secs(5),
            purchase_amount: U256::from(100u64) * U256::from(10u64).pow(U256::from(18u64)),
            report_terminal_failures: false,
        }
    }

    fn report() -> Arc<Report> {
        Arc::new(Report::new(
            Arc::new(LogNotifier),
            "Presale Report",
            FixedOffset::east_opt(8 * 3600).unwrap(),
        ))
    }

    #[tokio::test]
    async fn closed_gate_waits_without_submitting() {
        let chain = Arc::new(FakeChain::default());
        let factory = FakeFactory(chain.clone());
        let account = accounts(1).remove(0);
        let report = report();

        let result = timeout(
            Duration::from_millis(200),
            run_account(&factory, &engine_config(), &account, account.referrer, &report),
        )
        .await;

        assert!(result.is_err(), "closed gate must keep the account waiting");
        assert_eq!(chain.purchases(), 0);
        assert!(chain.gate_queries() > 1);
        assert_eq!(chain.connects(), 1);
        assert!(report.outcomes().await.is_empty());
    }

    #[tokio::test]
    async fn gate_opening_later_leads_to_purchase() {
        let chain = Arc::new(FakeChain {
            gate_opens_on: Some(4),
            ..Default::default()
        });
        let factory = FakeFactory(chain.clone());
        let account = accounts(1).remove(0);
        let report = report();

        let result =
            run_account(&factory, &engine_config(), &account, account.referrer, &report).await;

        assert!(result.is_success());
        assert_eq!(chain.gate_queries(), 4);
        assert_eq!(chain.purchases(), 1);
    }

    #[tokio::test]
    async fn fifth_attempt_success_is_reported_once() {
        let chain = Arc::new(FakeChain {
            failing_purchases: 4,
            ..FakeChain::open()
        });
        let factory = FakeFactory(chain.clone());
        let account = accounts(1).remove(0);
        let report = report();

        let result =
            run_account(&factory, &engine_config(), &account, account.referrer, &report).await;

        assert_eq!(
            result,
            AccountResult::Succeeded {
                index: 1,
                attempts: 5
            }
        );
        assert_eq!(chain.purchases(), 5);
        assert_eq!(chain.connects(), 5);

        let outcomes = report.outcomes().await;
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].succeeded);
        assert_eq!(outcomes[0].resulting_balance, "0.25");
        assert_eq!(outcomes[0].masked_address, account.masked_address());
        assert_eq!(report.flush_count(), 1);
    }

    #[tokio::test]
    async fn exhausted_account_is_silent_by_default() {
        let chain = Arc::new(FakeChain {
            failing_purchases: usize::MAX,
            ..FakeChain::open()
        });
        let factory = FakeFactory(chain.clone());
        let account = accounts(1).remove(0);
        let report = report();

        let result =
            run_account(&factory, &engine_config(), &account, account.referrer, &report).await;

        assert_eq!(
            result,
            AccountResult::Exhausted {
                index: 1,
                attempts: 5
            }
        );
        assert_eq!(chain.purchases(), 5);
        assert!(report.outcomes().await.is_empty());
        assert_eq!(report.flush_count(), 0);
    }

    #[tokio::test]
    async fn exhausted_account_can_be_reported() {
        let chain = Arc::new(FakeChain {
            failing_purchases: usize::MAX,
            ..FakeChain::open()
        });
        let factory = FakeFactory(chain.clone());
        let account = accounts(1).remove(0);
        let report = report();
        let config = EngineConfig {
            report_terminal_failures: true,
            ..engine_config()
        };

        let result = run_account(&factory, &config, &account, account.referrer, &report).await;

        assert!(!result.is_success());
        let outcomes = report.outcomes().await;
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].succeeded);
        assert_eq!(report.flush_count(), 1);
    }

    #[tokio::test]
    async fn connection_failures_use_up_attempts() {
        let chain = Arc::new(FakeChain {
            failing_connects: 2,
            ..FakeChain::open()
        });
        let factory = FakeFactory(chain.clone());
        let account = accounts(1).remove(0);
        let report = report();

        let result =
            run_account(&factory, &engine_config(), &account, account.referrer, &report).await;

        assert_eq!(
            result,
            AccountResult::Succeeded {
                index: 1,
                attempts: 3
            }
        );
        assert_eq!(chain.purchases(), 1);
    }

    #[tokio::test]
    async fn gate_query_failure_reconnects_on_next_attempt() {
        let chain = Arc::new(FakeChain {
            failing_gate_queries: 1,
            ..FakeChain::open()
        });
        let factory = FakeFactory(chain.clone());
        let account = accounts(1).remove(0);
        let report = report();

        let result =
            run_account(&factory, &engine_config(), &account, account.referrer, &report).await;

        assert_eq!(
            result,
            AccountResult::Succeeded {
                index: 1,
                attempts: 2
            }
        );
        assert_eq!(chain.connects(), 2);
        assert_eq!(chain.gate_queries(), 2);
        assert_eq!(chain.purchases(), 1);
    }

    #[tokio::test]
    async fn confirmation_timeout_triggers_retry() {
        let chain = Arc::new(FakeChain {
            hanging_confirms: 1,
            ..FakeChain::open()
        });
        let factory = FakeFactory(chain.clone());
        let account = accounts(1).remove(0);
        let report = report();
        let config = EngineConfig {
            confirmation_timeout: Duration::from_millis(20),
            ..engine_config()
        };

        let result = run_account(&factory, &config, &account, account.referrer, &report).await;

        assert_eq!(
            result,
            AccountResult::Succeeded {
                index: 1,
                attempts: 2
            }
        );
        assert_eq!(chain.purchases(), 2);
        assert_eq!(chain.confirms(), 2);
    }

    #[tokio::test]
    async fn run_with_three_open_accounts() {
        let chain = Arc::new(FakeChain::open());
        let engine = AcquisitionEngine::new(Arc::new(FakeFactory(chain.clone())), engine_config());
        let report = report();

        let handle = engine.run(accounts(3), report.clone()).await;
        assert_eq!(handle.len(), 3);
        let results = handle.join().await;

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(AccountResult::is_success));
        assert_eq!(chain.purchases(), 3);

        let entries = report.snapshot().await;
        assert_eq!(entries[0], ReportEntry::Status(RUN_STARTED.to_string()));
        assert!(matches!(entries[1], ReportEntry::Schedule(_)));

        let outcomes = report.outcomes().await;
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| o.succeeded));
        let mut indices: Vec<usize> = outcomes.iter().map(|o| o.ordinal_index).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![1, 2, 3]);

        assert!(report.flush_count() >= 4);
    }

    #[tokio::test]
    async fn dispatch_does_not_wait_for_closed_gates() {
        let chain = Arc::new(FakeChain::default());
        let engine = AcquisitionEngine::new(Arc::new(FakeFactory(chain.clone())), engine_config());

        let handle = timeout(
            Duration::from_millis(500),
            engine.run(accounts(4), report()),
        )
        .await
        .expect("dispatch must return while gates are closed");

        assert_eq!(handle.len(), 4);
        sleep(Duration::from_millis(30)).await;
        assert_eq!(handle.pending(), 4);
        assert_eq!(chain.purchases(), 0);

        handle.abort();
        assert!(handle.join().await.is_empty());
    }

    struct SlowNotifier(Duration);

    #[async_trait::async_trait]
    impl crate::adapters::Notifier for SlowNotifier {
        async fn send(&self, _subject: &str, _body: &str) -> Result<()> {
            sleep(self.0).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn slow_report_delivery_does_not_hold_up_accounts() {
        let chain = Arc::new(FakeChain::default());
        let engine = AcquisitionEngine::new(Arc::new(FakeFactory(chain.clone())), engine_config());
        let report = Arc::new(Report::new(
            Arc::new(SlowNotifier(Duration::from_secs(5))),
            "Presale Report",
            FixedOffset::east_opt(8 * 3600).unwrap(),
        ));

        let handle = timeout(Duration::from_secs(1), engine.run(accounts(3), report))
            .await
            .expect("run must return before the report is delivered");
        sleep(Duration::from_millis(50)).await;

        assert_eq!(chain.connects(), 3);
        assert!(chain.gate_queries() >= 3);

        handle.abort();
        handle.join().await;
    }

    #[test]
    fn balance_is_rendered_without_trailing_zeros() {
        let ether = U256::from(10u64).pow(U256::from(18u64));
        assert_eq!(display_balance(U256::ZERO), "0");
        assert_eq!(display_balance(ether * U256::from(100u64)), "100");
        assert_eq!(display_balance(ether * U256::from(3u64) / U256::from(2u64)), "1.5");
        assert_eq!(display_balance(U256::from(1u64)), "0.000000000000000001");
    }
}
