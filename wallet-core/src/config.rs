use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::errors::{WalletError, WalletResult};
use crate::executor::DEFAULT_QUEUE_CAPACITY;
use crate::manager::WalletManagerMode;

pub const KEY_LOG_LEVEL: &str = "LOG_LEVEL";
pub const KEY_STORAGE_PATH: &str = "STORAGE_PATH";
pub const KEY_IS_MAINNET: &str = "IS_MAINNET";
pub const KEY_MANAGER_MODE: &str = "MANAGER_MODE";
pub const KEY_EXECUTOR_QUEUE_CAPACITY: &str = "EXECUTOR_QUEUE_CAPACITY";
pub const KEY_BLOCKCHAIN_DB_ENDPOINT: &str = "BLOCKCHAIN_DB_ENDPOINT";
pub const KEY_PAPER_KEY: &str = "PAPER_KEY";
pub const KEY_ACCOUNT_TIMESTAMP: &str = "ACCOUNT_TIMESTAMP";
pub const KEY_WIPE_ON_START: &str = "WIPE_ON_START";
pub const KEY_CURRENCY_CODES: &str = "CURRENCY_CODES";

/// Paper key used by development builds when none is configured.
pub const DEVELOPMENT_PAPER_KEY: &str =
    "boring head harsh green empty clip fatal typical found crane dinner timber";

/// Well-known phrase used by the test environment.
pub const TEST_PAPER_KEY: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

const ENV_PREFIX: &str = "WALLET_CORE_";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "test" | "testing" => Environment::Test,
            _ => Environment::Development,
        }
    }
}

/// Typed settings the host needs to bring up a system.
#[derive(Clone)]
pub struct LaunchOptions {
    pub environment: Environment,
    pub storage_path: PathBuf,
    pub is_mainnet: bool,
    pub mode: WalletManagerMode,
    pub queue_capacity: usize,
    /// Blockchain metadata service; `None` uses the built-in catalogue
    pub blockchain_endpoint: Option<String>,
    pub paper_key: Zeroizing<String>,
    pub account_timestamp: DateTime<Utc>,
    pub wipe_on_start: bool,
    /// Restrict managers to these currencies; `None` means every network
    pub currency_codes: Option<Vec<String>>,
}

impl std::fmt::Debug for LaunchOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaunchOptions")
            .field("environment", &self.environment)
            .field("storage_path", &self.storage_path)
            .field("is_mainnet", &self.is_mainnet)
            .field("mode", &self.mode)
            .field("queue_capacity", &self.queue_capacity)
            .field("blockchain_endpoint", &self.blockchain_endpoint)
            .field("account_timestamp", &self.account_timestamp)
            .field("wipe_on_start", &self.wipe_on_start)
            .field("currency_codes", &self.currency_codes)
            .finish_non_exhaustive()
    }
}

/// Runtime configuration: per-environment defaults overridden by
/// `WALLET_CORE_*` environment variables.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    environment: Environment,
    config_map: HashMap<String, String>,
}

impl RuntimeConfig {
    pub fn new(environment: Environment) -> Self {
        let mut config = RuntimeConfig {
            environment,
            config_map: HashMap::new(),
        };
        config.load_defaults();
        config
    }

    /// Pick the environment from `WALLET_CORE_ENVIRONMENT` and apply overrides.
    pub fn from_env() -> WalletResult<Self> {
        let environment = std::env::var(format!("{}ENVIRONMENT", ENV_PREFIX))
            .map(|value| Environment::parse(&value))
            .unwrap_or(Environment::Development);
        Self::from_environment(environment)
    }

    pub fn from_environment(environment: Environment) -> WalletResult<Self> {
        let mut config = Self::new(environment);
        config.load_from_env_vars();
        config.validate_required_configs()?;
        Ok(config)
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.config_map.get(key)
    }

    pub fn get_or_default(&self, key: &str, default: &str) -> String {
        self.config_map
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_required(&self, key: &str) -> WalletResult<&String> {
        self.config_map.get(key).ok_or_else(|| {
            WalletError::ValidationError(format!("Required config key '{}' not found", key))
        })
    }

    pub fn get_bool_with_default(&self, key: &str, default: bool) -> WalletResult<bool> {
        assert!(!key.is_empty(), "configuration key must not be empty");
        match self.config_map.get(key) {
            Some(value) => parse_bool_flag(value, key),
            None => Ok(default),
        }
    }

    pub fn get_u32_with_default(&self, key: &str, default: u32) -> WalletResult<u32> {
        assert!(!key.is_empty(), "configuration key must not be empty");
        match self.config_map.get(key) {
            Some(value) => parse_number(value, key),
            None => Ok(default),
        }
    }

    pub fn get_u64_with_default(&self, key: &str, default: u64) -> WalletResult<u64> {
        assert!(!key.is_empty(), "configuration key must not be empty");
        match self.config_map.get(key) {
            Some(value) => parse_number(value, key),
            None => Ok(default),
        }
    }

    /// Comma-separated list with at least one entry.
    pub fn get_string_list(&self, key: &str) -> WalletResult<Vec<String>> {
        let value = self.get_required(key)?;
        let entries: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect();
        if entries.is_empty() {
            return Err(WalletError::ValidationError(format!(
                "Configuration key '{}' cannot be an empty list",
                key
            )));
        }
        Ok(entries)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.config_map.insert(key.to_string(), value.to_string());
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn validate_required_configs(&self) -> WalletResult<()> {
        let mut required = vec![KEY_LOG_LEVEL, KEY_STORAGE_PATH, KEY_IS_MAINNET, KEY_MANAGER_MODE];
        if self.is_production() {
            required.push(KEY_PAPER_KEY);
            required.push(KEY_BLOCKCHAIN_DB_ENDPOINT);
        }

        for key in required {
            if !self.config_map.contains_key(key) {
                return Err(WalletError::ValidationError(format!(
                    "Required configuration key '{}' is missing for {:?} environment",
                    key, self.environment
                )));
            }
        }
        Ok(())
    }

    pub fn launch_options(&self) -> WalletResult<LaunchOptions> {
        let timestamp = self.get_u64_with_default(KEY_ACCOUNT_TIMESTAMP, 0)?;
        let account_timestamp = i64::try_from(timestamp)
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .ok_or_else(|| {
                WalletError::ValidationError(format!("Invalid account timestamp {}", timestamp))
            })?;

        let queue_capacity = self
            .get_u32_with_default(KEY_EXECUTOR_QUEUE_CAPACITY, DEFAULT_QUEUE_CAPACITY as u32)?
            as usize;
        if queue_capacity == 0 {
            return Err(WalletError::ValidationError(
                "Executor queue capacity must be positive".to_string(),
            ));
        }

        let currency_codes = match self.get(KEY_CURRENCY_CODES) {
            Some(_) => Some(self.get_string_list(KEY_CURRENCY_CODES)?),
            None => None,
        };

        Ok(LaunchOptions {
            environment: self.environment,
            storage_path: PathBuf::from(self.get_required(KEY_STORAGE_PATH)?),
            is_mainnet: self.get_bool_with_default(KEY_IS_MAINNET, false)?,
            mode: WalletManagerMode::parse(self.get_required(KEY_MANAGER_MODE)?)?,
            queue_capacity,
            blockchain_endpoint: self.get(KEY_BLOCKCHAIN_DB_ENDPOINT).cloned(),
            paper_key: Zeroizing::new(
                self.get(KEY_PAPER_KEY)
                    .cloned()
                    .unwrap_or_else(|| DEVELOPMENT_PAPER_KEY.to_string()),
            ),
            account_timestamp,
            wipe_on_start: self.get_bool_with_default(KEY_WIPE_ON_START, false)?,
            currency_codes,
        })
    }

    fn load_defaults(&mut self) {
        let defaults: &[(&str, &str)] = match self.environment {
            Environment::Production => &[
                (KEY_LOG_LEVEL, "INFO"),
                (KEY_STORAGE_PATH, "wallet-data"),
                (KEY_IS_MAINNET, "true"),
                (KEY_MANAGER_MODE, "API_ONLY"),
            ],
            Environment::Development => &[
                (KEY_LOG_LEVEL, "DEBUG"),
                (KEY_STORAGE_PATH, "wallet-data"),
                (KEY_IS_MAINNET, "false"),
                (KEY_MANAGER_MODE, "API_ONLY"),
                (KEY_PAPER_KEY, DEVELOPMENT_PAPER_KEY),
            ],
            Environment::Test => &[
                (KEY_LOG_LEVEL, "WARN"),
                (KEY_STORAGE_PATH, "target/wallet-core-test"),
                (KEY_IS_MAINNET, "false"),
                (KEY_MANAGER_MODE, "API_ONLY"),
                (KEY_PAPER_KEY, TEST_PAPER_KEY),
                (KEY_WIPE_ON_START, "true"),
            ],
        };
        for (key, value) in defaults {
            self.config_map.insert(key.to_string(), value.to_string());
        }
    }

    fn load_from_env_vars(&mut self) {
        let keys = [
            KEY_LOG_LEVEL,
            KEY_STORAGE_PATH,
            KEY_IS_MAINNET,
            KEY_MANAGER_MODE,
            KEY_EXECUTOR_QUEUE_CAPACITY,
            KEY_BLOCKCHAIN_DB_ENDPOINT,
            KEY_PAPER_KEY,
            KEY_ACCOUNT_TIMESTAMP,
            KEY_WIPE_ON_START,
            KEY_CURRENCY_CODES,
        ];

        for key in keys {
            let env_var = format!("{}{}", ENV_PREFIX, key);
            if let Ok(value) = std::env::var(&env_var) {
                if value.trim().is_empty() {
                    log::warn!("Environment variable {} is empty", env_var);
                    continue;
                }
                if value.chars().any(|c| c.is_control()) {
                    log::warn!(
                        "Environment variable {} contains control characters, ignoring",
                        env_var
                    );
                    continue;
                }
                self.config_map.insert(key.to_string(), value);
                log::debug!("Loaded configuration {} from {}", key, env_var);
            }
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new(Environment::Development)
    }
}

fn parse_bool_flag(value: &str, key: &str) -> WalletResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(WalletError::ValidationError(format!(
            "Invalid boolean value '{}' for key '{}'",
            value, key
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, key: &str) -> WalletResult<T> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(WalletError::ValidationError(format!(
            "Configuration key '{}' cannot be empty",
            key
        )));
    }
    trimmed.parse::<T>().map_err(|_| {
        WalletError::ValidationError(format!(
            "Invalid numeric value '{}' for key '{}'",
            value, key
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_defaults_produce_launch_options() {
        let config = RuntimeConfig::new(Environment::Development);
        assert!(config.validate_required_configs().is_ok());

        let options = config.launch_options().unwrap();
        assert!(!options.is_mainnet);
        assert_eq!(options.mode, WalletManagerMode::ApiOnly);
        assert_eq!(options.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(options.paper_key.as_str(), DEVELOPMENT_PAPER_KEY);
        assert_eq!(options.account_timestamp.timestamp(), 0);
        assert!(options.currency_codes.is_none());
    }

    #[test]
    fn production_requires_paper_key_and_endpoint() {
        let mut config = RuntimeConfig::new(Environment::Production);
        assert!(config.validate_required_configs().is_err());

        config.set(KEY_PAPER_KEY, DEVELOPMENT_PAPER_KEY);
        config.set(KEY_BLOCKCHAIN_DB_ENDPOINT, "https://blocks.example");
        assert!(config.validate_required_configs().is_ok());
        assert!(config.launch_options().unwrap().is_mainnet);
    }

    #[test]
    fn typed_getters_reject_bad_values() {
        let mut config = RuntimeConfig::new(Environment::Test);
        config.set(KEY_WIPE_ON_START, "maybe");
        assert!(config.get_bool_with_default(KEY_WIPE_ON_START, false).is_err());

        config.set(KEY_EXECUTOR_QUEUE_CAPACITY, "lots");
        assert!(config.launch_options().is_err());

        config.set(KEY_EXECUTOR_QUEUE_CAPACITY, "16");
        config.set(KEY_MANAGER_MODE, "p2p_only");
        config.set(KEY_CURRENCY_CODES, "btc, eth,");
        let options = config.launch_options().unwrap();
        assert_eq!(options.queue_capacity, 16);
        assert_eq!(options.mode, WalletManagerMode::P2pOnly);
        assert_eq!(
            options.currency_codes,
            Some(vec!["btc".to_string(), "eth".to_string()])
        );
    }

    #[test]
    fn environment_names_parse_loosely() {
        assert_eq!(Environment::parse("PROD"), Environment::Production);
        assert_eq!(Environment::parse("testing"), Environment::Test);
        assert_eq!(Environment::parse("anything"), Environment::Development);
    }
}
