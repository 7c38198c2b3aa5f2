use alloy::primitives::utils::parse_ether;
use alloy::primitives::U256;
use chrono::{DateTime, FixedOffset, Utc};
use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SnipeError};

/// Published start of the presale round (unix seconds). Not read on-chain.
pub const DEFAULT_SALE_START_TIMESTAMP: i64 = 1_691_935_261;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub chain: ChainConfig,
    pub sale: SaleConfig,
    pub execution: ExecutionConfig,
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// JSON-RPC endpoint of the target chain
    #[serde(default)]
    pub rpc_url: String,
    /// Presale contract address
    #[serde(default)]
    pub contract_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaleConfig {
    /// Round start in unix seconds, used when no schedule is stored
    pub start_timestamp: i64,
    /// Seconds added to the round start before firing
    pub start_delay_secs: i64,
    /// Number of configured accounts (ADR_1..ADR_n / PVK_1..PVK_n)
    pub account_count: usize,
    /// Purchase size per account, in whole units of the sale's base asset
    pub purchase_amount: Decimal,
}

impl SaleConfig {
    /// Default trigger instant before the start delay is applied
    pub fn default_start(&self) -> Result<DateTime<Utc>> {
        DateTime::from_timestamp(self.start_timestamp, 0).ok_or_else(|| {
            SnipeError::InvalidConfig(format!(
                "sale.start_timestamp out of range: {}",
                self.start_timestamp
            ))
        })
    }

    /// Purchase size in the chain's smallest unit (18 decimals)
    pub fn purchase_amount_wei(&self) -> Result<U256> {
        parse_ether(&self.purchase_amount.normalize().to_string()).map_err(|e| {
            SnipeError::InvalidConfig(format!(
                "sale.purchase_amount {} is not a valid amount: {}",
                self.purchase_amount, e
            ))
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Attempt ceiling per account
    pub max_attempts: u32,
    /// Gate polling interval in milliseconds (one block on the target chain)
    pub poll_interval_ms: u64,
    /// How long to wait for a submitted purchase to be mined
    pub confirmation_timeout_secs: u64,
    /// Append an explicit failed outcome when an account exhausts its attempts
    #[serde(default)]
    pub report_terminal_failures: bool,
}

impl ExecutionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            poll_interval_ms: 3000,
            confirmation_timeout_secs: 120,
            report_terminal_failures: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// JSON file holding the armed trigger instant
    pub state_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    /// Webhook receiving the run report; reports are only logged when unset
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
    /// Offset used to render the local date in the report subject
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

fn default_subject_prefix() -> String {
    "Presale Report".to_string()
}

fn default_utc_offset_hours() -> i32 {
    8
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            subject_prefix: default_subject_prefix(),
            utc_offset_hours: default_utc_offset_hours(),
        }
    }
}

impl NotifyConfig {
    pub fn local_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).ok_or_else(|| {
            SnipeError::InvalidConfig(format!(
                "notify.utc_offset_hours out of range: {}",
                self.utc_offset_hours
            ))
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for the daily rolling log file
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            dir: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> std::result::Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values; flat legacy variables seed the chain section
            .set_default("chain.rpc_url", std::env::var("BSC_RPC").unwrap_or_default())?
            .set_default(
                "chain.contract_address",
                std::env::var("CONTRACT_ADR").unwrap_or_default(),
            )?
            .set_default("sale.start_timestamp", DEFAULT_SALE_START_TIMESTAMP)?
            .set_default("sale.start_delay_secs", 8)?
            .set_default("sale.account_count", 5)?
            .set_default("sale.purchase_amount", "100")?
            .set_default("execution.max_attempts", 5)?
            .set_default("execution.poll_interval_ms", 3000)?
            .set_default("execution.confirmation_timeout_secs", 120)?
            .set_default("execution.report_terminal_failures", false)?
            .set_default("schedule.state_path", "presale.json")?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("SNIPE_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (SNIPE_CHAIN__RPC_URL, etc.)
            .add_source(
                Environment::with_prefix("SNIPE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut cfg: AppConfig = builder.build()?.try_deserialize()?;
        if cfg.notify.webhook_url.is_none() {
            cfg.notify.webhook_url = std::env::var("WEBHOOK_URL")
                .ok()
                .filter(|v| !v.trim().is_empty());
        }
        Ok(cfg)
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.chain.rpc_url.trim().is_empty() {
            errors.push("chain.rpc_url is required (or BSC_RPC)".to_string());
        } else if url::Url::parse(self.chain.rpc_url.trim()).is_err() {
            errors.push(format!("chain.rpc_url is not a valid URL: {}", self.chain.rpc_url));
        }

        if self.chain.contract_address.trim().is_empty() {
            errors.push("chain.contract_address is required (or CONTRACT_ADR)".to_string());
        }

        if self.sale.account_count == 0 {
            errors.push("sale.account_count must be at least 1".to_string());
        }

        if self.sale.purchase_amount <= Decimal::ZERO {
            errors.push("sale.purchase_amount must be positive".to_string());
        }

        if self.sale.default_start().is_err() {
            errors.push("sale.start_timestamp is out of range".to_string());
        }

        if self.execution.max_attempts == 0 {
            errors.push("execution.max_attempts must be at least 1".to_string());
        }

        if self.execution.poll_interval_ms == 0 {
            errors.push("execution.poll_interval_ms must be positive".to_string());
        }

        if self.notify.local_offset().is_err() {
            errors.push("notify.utc_offset_hours must be within +/-23".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_config() -> AppConfig {
        AppConfig {
            chain: ChainConfig {
                rpc_url: "https://bsc-dataseed.binance.org".to_string(),
                contract_address: "0x0000000000000000000000000000000000001234".to_string(),
            },
            sale: SaleConfig {
                start_timestamp: DEFAULT_SALE_START_TIMESTAMP,
                start_delay_secs: 8,
                account_count: 5,
                purchase_amount: dec!(100),
            },
            execution: ExecutionConfig::default(),
            schedule: ScheduleConfig {
                state_path: PathBuf::from("presale.json"),
            },
            notify: NotifyConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_sample_config_is_valid() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn test_validate_collects_every_problem() {
        let mut cfg = sample_config();
        cfg.chain.rpc_url = String::new();
        cfg.sale.account_count = 0;
        cfg.execution.max_attempts = 0;

        let errors = cfg.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("rpc_url"));
    }

    #[test]
    fn test_purchase_amount_in_wei() {
        let cfg = sample_config();
        let wei = cfg.sale.purchase_amount_wei().unwrap();
        assert_eq!(wei, U256::from(100u64) * U256::from(10u64).pow(U256::from(18u64)));
    }

    #[test]
    fn test_default_start_matches_published_round() {
        let cfg = sample_config();
        let start = cfg.sale.default_start().unwrap();
        assert_eq!(start.timestamp(), DEFAULT_SALE_START_TIMESTAMP);
    }

    #[test]
    fn test_execution_defaults() {
        let exec = ExecutionConfig::default();
        assert_eq!(exec.max_attempts, 5);
        assert_eq!(exec.poll_interval(), Duration::from_secs(3));
        assert!(!exec.report_terminal_failures);
    }

    #[test]
    fn test_load_applies_prefixed_env_overrides() {
        let dir = std::env::temp_dir().join(format!(
            "presale_config_{}",
            Utc::now().timestamp_nanos_opt().unwrap_or(0)
        ));
        std::env::set_var("SNIPE_CHAIN__RPC_URL", "http://single.example");
        std::env::set_var("SNIPE_SALE__ACCOUNT_COUNT", "7");

        let loaded = AppConfig::load_from(&dir);

        std::env::remove_var("SNIPE_CHAIN__RPC_URL");
        std::env::remove_var("SNIPE_SALE__ACCOUNT_COUNT");

        let cfg = loaded.unwrap();
        assert_eq!(cfg.chain.rpc_url, "http://single.example");
        assert_eq!(cfg.sale.account_count, 7);
        assert_eq!(cfg.sale.start_delay_secs, 8);
        assert_eq!(cfg.execution.max_attempts, 5);
    }
}

