use crate::plan::parse_start_date;
use chrono::NaiveDate;
use std::{env, path::PathBuf};
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_PERSIST_ATTEMPTS: u32 = 3;

/// Plan day 1 when the user has not picked their own start date.
pub fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 1).unwrap_or(NaiveDate::MIN)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PLAN_START_DATE must be YYYY-MM-DD, got {0:?}")]
    StartDate(String),

    #[error("PERSIST_ATTEMPTS must be a positive integer, got {0:?}")]
    PersistAttempts(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub data_path: PathBuf,
    pub accounts_path: PathBuf,
    pub readings_path: PathBuf,
    pub default_start: NaiveDate,
    pub persist_attempts: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            data_path: PathBuf::from("data/records.json"),
            accounts_path: PathBuf::from("data/accounts.json"),
            readings_path: PathBuf::from("data/readings.json"),
            default_start: default_start_date(),
            persist_attempts: DEFAULT_PERSIST_ATTEMPTS,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = lookup("PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(defaults.port);

        let default_start = match lookup("PLAN_START_DATE") {
            Some(value) => parse_start_date(&value).ok_or(ConfigError::StartDate(value))?,
            None => defaults.default_start,
        };

        let persist_attempts = match lookup("PERSIST_ATTEMPTS") {
            Some(value) => value
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|attempts| *attempts >= 1)
                .ok_or(ConfigError::PersistAttempts(value))?,
            None => defaults.persist_attempts,
        };

        Ok(Self {
            port,
            data_path: lookup("APP_DATA_PATH").map(PathBuf::from).unwrap_or(defaults.data_path),
            accounts_path: lookup("APP_ACCOUNTS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.accounts_path),
            readings_path: lookup("APP_READINGS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.readings_path),
            default_start,
            persist_attempts,
        })
    }
}
