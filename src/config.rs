use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_VENDOR_RATE: Decimal = dec!(10);
const DEFAULT_PARTNER_POOL_RATE: Decimal = dec!(15);
const DEFAULT_MONTHLY_INTEREST_RATE: Decimal = dec!(2.99);
const DEFAULT_MAX_INSTALLMENTS: u32 = 12;
const DEFAULT_SEQUENCE_MAX_ATTEMPTS: u32 = 5;

/// Pricing behaviour when margin settings are malformed.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PricingConfig {
    /// Fall back to unmanaged pricing (cost, no floor) instead of failing
    #[serde(default)]
    pub unmanaged_fallback: bool,
}

/// Commission rates, in percent of the order value.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CommissionConfig {
    /// Rate used for commissionable vendors without an explicit rate
    #[serde(default = "default_vendor_rate")]
    #[validate(custom = "validate_percent")]
    pub default_vendor_rate: Decimal,

    /// Pool split equally across every active partner
    #[serde(default = "default_partner_pool_rate")]
    #[validate(custom = "validate_percent")]
    pub partner_pool_rate: Decimal,
}

impl Default for CommissionConfig {
    fn default() -> Self {
        Self {
            default_vendor_rate: DEFAULT_VENDOR_RATE,
            partner_pool_rate: DEFAULT_PARTNER_POOL_RATE,
        }
    }
}

/// Simple-interest financing for installment payments.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct FinancingConfig {
    /// Monthly rate in percent
    #[serde(default = "default_monthly_interest_rate")]
    #[validate(custom = "validate_percent")]
    pub monthly_interest_rate: Decimal,

    #[serde(default = "default_max_installments")]
    #[validate(range(min = 1, max = 48))]
    pub max_installments: u32,
}

impl Default for FinancingConfig {
    fn default() -> Self {
        Self {
            monthly_interest_rate: DEFAULT_MONTHLY_INTEREST_RATE,
            max_installments: DEFAULT_MAX_INSTALLMENTS,
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    #[validate(range(min = 1, max = 100000))]
    pub event_channel_capacity: usize,

    /// Attempts before a duplicate budget/order number surfaces as fatal
    #[serde(default = "default_sequence_max_attempts")]
    #[validate(range(min = 1, max = 50))]
    pub sequence_max_attempts: u32,

    #[serde(default)]
    #[validate]
    pub pricing: PricingConfig,

    #[serde(default)]
    #[validate]
    pub commissions: CommissionConfig,

    #[serde(default)]
    #[validate]
    pub financing: FinancingConfig,
}

impl AppConfig {
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            sequence_max_attempts: default_sequence_max_attempts(),
            pricing: PricingConfig::default(),
            commissions: CommissionConfig::default(),
            financing: FinancingConfig::default(),
        }
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_sequence_max_attempts() -> u32 {
    DEFAULT_SEQUENCE_MAX_ATTEMPTS
}

fn default_vendor_rate() -> Decimal {
    DEFAULT_VENDOR_RATE
}

fn default_partner_pool_rate() -> Decimal {
    DEFAULT_PARTNER_POOL_RATE
}

fn default_monthly_interest_rate() -> Decimal {
    DEFAULT_MONTHLY_INTEREST_RATE
}

fn default_max_installments() -> u32 {
    DEFAULT_MAX_INSTALLMENTS
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    match level.to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => {
            let mut err = ValidationError::new("invalid_log_level");
            err.message = Some("Log level must be one of trace, debug, info, warn, error".into());
            Err(err)
        }
    }
}

fn validate_percent(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO || *value > Decimal::ONE_HUNDRED {
        let mut err = ValidationError::new("invalid_percent");
        err.message = Some("Percentage must be between 0 and 100".into());
        return Err(err);
    }
    Ok(())
}

pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("budget_engine={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

pub fn load_config() -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://budget_engine.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            18080,
            "test".into(),
        )
    }

    #[test]
    fn defaults_carry_commission_and_financing_rates() {
        let cfg = base_config();
        assert_eq!(cfg.commissions.default_vendor_rate, dec!(10));
        assert_eq!(cfg.commissions.partner_pool_rate, dec!(15));
        assert_eq!(cfg.financing.max_installments, 12);
        assert!(!cfg.pricing.unmanaged_fallback);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn out_of_range_partner_pool_is_rejected() {
        let mut cfg = base_config();
        cfg.commissions.partner_pool_rate = dec!(120);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let mut cfg = base_config();
        cfg.log_level = "verbose".into();
        assert!(cfg.validate().is_err());
    }
}
