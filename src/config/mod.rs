//! Configuration management for auction-lbin
//!
//! Loads from optional config files + environment variables via .env

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::pricing::{AttributePolicy, DEFAULT_COMBO_MAX_TIER};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub persistence: PersistenceConfig,
    pub pricing: PricingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Paginated auctions endpoint
    pub auction_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Directory holding the snapshot buckets
    pub data_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricingConfig {
    /// Highest attribute tier allowed in a combo
    pub combo_max_tier: i32,
    /// Attributes to price; empty prices every attribute
    pub attribute_allow_list: Vec<String>,
}

impl PricingConfig {
    pub fn policy(&self) -> AttributePolicy {
        let policy = AttributePolicy {
            combo_max_tier: self.combo_max_tier,
            allow_list: None,
        };
        if self.attribute_allow_list.is_empty() {
            policy
        } else {
            policy.with_allow_list(self.attribute_allow_list.iter().cloned())
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            // API defaults
            .set_default("api.auction_url", "https://api.hypixel.net/v2/skyblock/auctions")?
            .set_default("api.timeout_secs", 30)?
            // Persistence defaults
            .set_default("persistence.data_dir", "./data/active")?
            // Pricing defaults
            .set_default("pricing.combo_max_tier", DEFAULT_COMBO_MAX_TIER)?
            .set_default("pricing.attribute_allow_list", Vec::<String>::new())?
            // Logging defaults
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (LBIN_*)
            .add_source(
                Environment::with_prefix("LBIN")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("pricing.attribute_allow_list")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(app_config)
    }

    /// One-line digest of the config for logging
    pub fn digest(&self) -> String {
        format!(
            "auction_url={} data_dir={} combo_max_tier={} allow_list={}",
            self.api.auction_url,
            self.persistence.data_dir,
            self.pricing.combo_max_tier,
            if self.pricing.attribute_allow_list.is_empty() {
                "all".to_string()
            } else {
                self.pricing.attribute_allow_list.join(",")
            }
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_config_files() {
        let config = AppConfig::load().unwrap();
        assert!(config.api.timeout_secs > 0);
        assert!(!config.api.auction_url.is_empty());
    }

    #[test]
    fn empty_allow_list_prices_everything() {
        let pricing = PricingConfig {
            combo_max_tier: 5,
            attribute_allow_list: Vec::new(),
        };
        let policy = pricing.policy();
        assert!(policy.allows("anything"));
        assert_eq!(policy.combo_max_tier, 5);
    }

    #[test]
    fn allow_list_restricts_policy() {
        let pricing = PricingConfig {
            combo_max_tier: 4,
            attribute_allow_list: vec!["mana_pool".to_string()],
        };
        let policy = pricing.policy();
        assert!(policy.allows("mana_pool"));
        assert!(!policy.allows("veteran"));
    }
}
