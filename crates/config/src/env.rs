use hubwatch_common::error::{HubwatchError, HubwatchResult};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub mapping_file: String,
    pub settings_file: String,
    pub log_level: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present, then reads required vars.
    pub fn from_env() -> HubwatchResult<Self> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();

        Ok(Self {
            mapping_file: get_var("HUBWATCH_MAPPING_FILE")?,
            settings_file: get_var_or("HUBWATCH_SETTINGS_FILE", "hubwatch-settings.json"),
            log_level: get_var_or("LOG_LEVEL", "info"),
        })
    }
}

fn get_var(key: &str) -> HubwatchResult<String> {
    env::var(key).map_err(|_| HubwatchError::Config(format!("{key} is required but not set")))
}

fn get_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}
