//! Configuration for the admin CLI

use core_config::{env_parse, FromEnv};
use database::common::RetryConfig;
use database::postgres::PostgresConfig;
use eyre::Result;

#[derive(Debug, Clone)]
pub struct Config {
    pub database: PostgresConfig,
    /// Connection retries before giving up (`DB_CONNECT_RETRIES`, default 5)
    pub connect_retries: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            database: <PostgresConfig as FromEnv>::from_env()?,
            connect_retries: env_parse("DB_CONNECT_RETRIES", 5)?,
        })
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig::new().with_max_retries(self.connect_retries)
    }
}
