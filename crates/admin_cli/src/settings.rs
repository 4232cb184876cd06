//! Settings for `ledger_admin`.
//!
//! Layered lowest to highest: built-in defaults, the TOML file
//! (`config/ledger.toml` unless `--config` says otherwise, optional),
//! `LEDGER__*` environment variables (`LEDGER__FINANCE__DIRECT_RATE_BPS=800`),
//! then command line flags.

use config::{Config, ConfigError, Environment, File};
use engine::FinanceSettings;
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "config/ledger.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_url: String,
    pub log_level: String,
    pub finance: FinanceSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite:./ledger.db?mode=rwc".to_string(),
            log_level: "info".to_string(),
            finance: FinanceSettings::default(),
        }
    }
}

/// Command line values that win over every other source.
#[derive(Debug, Default)]
pub struct Overrides {
    pub config: Option<String>,
    pub database_url: Option<String>,
    pub log_level: Option<String>,
}

impl Settings {
    pub fn load(overrides: Overrides) -> Result<Self, ConfigError> {
        let config_path = overrides.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
        let mut settings: Settings = Config::builder()
            .add_source(File::with_name(config_path).required(false))
            .add_source(
                Environment::with_prefix("LEDGER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        if let Some(database_url) = overrides.database_url {
            settings.database_url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            settings.log_level = log_level;
        }

        Ok(settings)
    }
}
