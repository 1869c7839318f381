use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::Path;
use tracing::info;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_true_bool() -> bool {
    true
}

fn default_points_per_unit() -> Decimal {
    Decimal::ONE
}

fn default_point_value() -> Decimal {
    dec!(0.01)
}

fn default_redemption_cap_ratio() -> Decimal {
    dec!(0.5)
}

fn default_flat_shipping_fee() -> Decimal {
    dec!(10)
}

fn default_free_shipping_threshold() -> Decimal {
    dec!(100)
}

fn default_tax_percent() -> Decimal {
    dec!(10)
}

/// Loyalty program configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct LoyaltyConfig {
    /// Master switch for point awards on order completion
    #[serde(default = "default_true_bool")]
    pub enabled: bool,

    /// Points earned per unit of order total; awards are floored
    #[serde(default = "default_points_per_unit")]
    pub points_per_unit: Decimal,

    /// Monetary value of a single point when redeemed against a cart
    #[serde(default = "default_point_value")]
    pub point_value: Decimal,

    /// Fraction of the subtotal a points redemption may cover at most
    #[serde(default = "default_redemption_cap_ratio")]
    pub redemption_cap_ratio: Decimal,
}

impl Default for LoyaltyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            points_per_unit: default_points_per_unit(),
            point_value: default_point_value(),
            redemption_cap_ratio: default_redemption_cap_ratio(),
        }
    }
}

/// Fallback pricing policies used when no template / tax rate is selected
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PricingConfig {
    /// Flat fee charged when no shipping template is selected
    #[serde(default = "default_flat_shipping_fee")]
    pub default_shipping_fee: Decimal,

    /// Discounted-subtotal threshold at/above which default shipping is free
    #[serde(default = "default_free_shipping_threshold")]
    pub free_shipping_threshold: Decimal,

    /// Flat tax percentage applied when no tax rate is selected
    #[serde(default = "default_tax_percent")]
    pub default_tax_percent: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            default_shipping_fee: default_flat_shipping_fee(),
            free_shipping_threshold: default_free_shipping_threshold(),
            default_tax_percent: default_tax_percent(),
        }
    }
}

/// Engine configuration with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Database connection URL
    pub database_url: String,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    #[serde(default)]
    #[validate]
    pub loyalty: LoyaltyConfig,

    #[serde(default)]
    #[validate]
    pub pricing: PricingConfig,
}

impl EngineConfig {
    /// Minimal constructor used by tests and embedding binaries.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            loyalty: LoyaltyConfig::default(),
            pricing: PricingConfig::default(),
        }
    }

    /// Loads configuration from `config/{environment}.toml` (when present)
    /// layered under `ENGINE_`-prefixed environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("ENGINE_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_file = Path::new(CONFIG_DIR).join(format!("{environment}.toml"));

        let settings = Config::builder()
            .set_default("environment", environment.as_str())?
            .add_source(File::from(config_file).required(false))
            .add_source(Environment::with_prefix("ENGINE").separator("__"))
            .build()?;

        let config: EngineConfig = settings.try_deserialize()?;
        config
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;

        info!(environment = %config.environment, "Engine configuration loaded");
        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
