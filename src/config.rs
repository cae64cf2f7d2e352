//! Configuration for the GemVault core.
//!
//! TOML file plus environment-variable overrides, validated before use.
//! Economy numbers default to the live tuning of the production deployment.

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, VaultResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    pub storage: StorageConfig,
    pub economy: EconomyConfig,
    pub sweep: SweepConfig,
    /// Seed for the outcome generator; unset means seeded from OS entropy.
    pub rng_seed: Option<u64>,
    /// Gift catalog for diamond-to-stars exchange requests.
    pub gifts: Vec<GiftOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomyConfig {
    /// Minimum stake for every table game.
    pub min_bet: u64,
    /// Flat part of the daily bonus; streak adds `daily_streak_step` per day.
    pub daily_bonus_base: u64,
    pub daily_streak_step: u64,
    pub lottery_ticket_price: u64,
    /// Diamonds credited to a referrer per invited account.
    pub referral_bonus: u64,
    /// Welcome diamonds for the invited account itself.
    pub referral_welcome: u64,
    pub free_cases_on_signup: u32,
    /// Conversion rate for platform-star payments.
    pub diamonds_per_star: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Seconds between reconciliation passes over pending invoices.
    pub interval_secs: u64,
    /// Timeout for a single payment-provider call.
    pub provider_timeout_secs: u64,
}

/// One entry of the exchange catalog: what a gift costs and what it is worth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiftOption {
    pub code: String,
    pub name: String,
    pub stars: u64,
    pub diamonds: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            economy: EconomyConfig::default(),
            sweep: SweepConfig::default(),
            rng_seed: None,
            gifts: default_gifts(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./vault_data".to_string(),
        }
    }
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            min_bet: 5,
            daily_bonus_base: 10,
            daily_streak_step: 5,
            lottery_ticket_price: 10,
            referral_bonus: 10,
            referral_welcome: 5,
            free_cases_on_signup: 1,
            diamonds_per_star: 9,
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            provider_timeout_secs: 10,
        }
    }
}

fn default_gifts() -> Vec<GiftOption> {
    vec![
        GiftOption {
            code: "bear".to_string(),
            name: "Teddy Bear".to_string(),
            stars: 15,
            diamonds: 150,
        },
        GiftOption {
            code: "heart".to_string(),
            name: "Heart".to_string(),
            stars: 25,
            diamonds: 250,
        },
        GiftOption {
            code: "rocket".to_string(),
            name: "Rocket".to_string(),
            stars: 50,
            diamonds: 500,
        },
        GiftOption {
            code: "ring".to_string(),
            name: "Ring".to_string(),
            stars: 100,
            diamonds: 1000,
        },
    ]
}

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> VaultResult<VaultConfig> {
        let mut config = if let Some(ref path) = self.config_path {
            self.load_from_file(path)?
        } else {
            VaultConfig::default()
        };

        self.apply_env_overrides(&mut config)?;
        self.validate(&config)?;

        Ok(config)
    }

    fn load_from_file(&self, path: &str) -> VaultResult<VaultConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to parse TOML: {}", e)).into())
    }

    fn apply_env_overrides(&self, config: &mut VaultConfig) -> VaultResult<()> {
        if let Ok(dir) = env::var("GEMVAULT_DATA_DIR") {
            config.storage.data_dir = dir;
        }
        if let Ok(interval) = env::var("GEMVAULT_SWEEP_INTERVAL") {
            config.sweep.interval_secs =
                interval.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "GEMVAULT_SWEEP_INTERVAL".to_string(),
                    value: interval,
                    reason: "Invalid seconds value".to_string(),
                })?;
        }
        if let Ok(timeout) = env::var("GEMVAULT_PROVIDER_TIMEOUT") {
            config.sweep.provider_timeout_secs =
                timeout.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "GEMVAULT_PROVIDER_TIMEOUT".to_string(),
                    value: timeout,
                    reason: "Invalid seconds value".to_string(),
                })?;
        }
        if let Ok(seed) = env::var("GEMVAULT_RNG_SEED") {
            config.rng_seed = Some(seed.parse().map_err(|_| ConfigError::InvalidValue {
                field: "GEMVAULT_RNG_SEED".to_string(),
                value: seed,
                reason: "Invalid u64 seed".to_string(),
            })?);
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self, config: &VaultConfig) -> VaultResult<()> {
        if config.storage.data_dir.is_empty() {
            return Err(ConfigError::MissingRequired("storage.data_dir".to_string()).into());
        }
        if config.economy.min_bet == 0 {
            return Err(ConfigError::InvalidValue {
                field: "economy.min_bet".to_string(),
                value: "0".to_string(),
                reason: "Minimum bet cannot be zero".to_string(),
            }
            .into());
        }
        if config.economy.lottery_ticket_price == 0 {
            return Err(ConfigError::InvalidValue {
                field: "economy.lottery_ticket_price".to_string(),
                value: "0".to_string(),
                reason: "Ticket price cannot be zero".to_string(),
            }
            .into());
        }
        if config.economy.diamonds_per_star == 0 {
            return Err(ConfigError::InvalidValue {
                field: "economy.diamonds_per_star".to_string(),
                value: "0".to_string(),
                reason: "Star conversion rate cannot be zero".to_string(),
            }
            .into());
        }
        if config.sweep.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sweep.interval_secs".to_string(),
                value: "0".to_string(),
                reason: "Sweep interval cannot be zero".to_string(),
            }
            .into());
        }
        if config.sweep.provider_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sweep.provider_timeout_secs".to_string(),
                value: "0".to_string(),
                reason: "Provider timeout cannot be zero".to_string(),
            }
            .into());
        }
        if config.gifts.is_empty() {
            return Err(ConfigError::MissingRequired("gifts".to_string()).into());
        }
        for gift in &config.gifts {
            if gift.diamonds == 0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("gifts.{}", gift.code),
                    value: "0".to_string(),
                    reason: "Gift cost cannot be zero".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, config: &VaultConfig, path: &str) -> VaultResult<()> {
        let toml_string = toml::to_string_pretty(config)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write to {}: {}", path, e)).into())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl VaultConfig {
    pub fn gift(&self, code: &str) -> Option<&GiftOption> {
        self.gifts.iter().find(|g| g.code == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = VaultConfig::default();
        assert!(ConfigLoader::new().validate(&config).is_ok());
        assert_eq!(config.economy.diamonds_per_star, 9);
        assert_eq!(config.economy.min_bet, 5);
    }

    #[test]
    fn test_config_validation_rejects_zero_min_bet() {
        let mut config = VaultConfig::default();
        config.economy.min_bet = 0;
        assert!(ConfigLoader::new().validate(&config).is_err());
    }

    #[test]
    fn test_gift_lookup() {
        let config = VaultConfig::default();
        let gift = config.gift("rocket").unwrap();
        assert_eq!(gift.diamonds, 500);
        assert!(config.gift("missing").is_none());
    }

    #[test]
    fn test_save_and_load_config() -> VaultResult<()> {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();

        let original = VaultConfig::default();
        let loader = ConfigLoader::new();
        loader.save(&original, path)?;

        let loaded = ConfigLoader::new().with_path(path).load()?;
        assert_eq!(loaded.economy.min_bet, original.economy.min_bet);
        assert_eq!(loaded.gifts.len(), original.gifts.len());
        Ok(())
    }
}
