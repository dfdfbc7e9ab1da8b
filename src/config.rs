use config::{Config as ConfigLoader, Environment};
use serde::Deserialize;
use std::time::Duration;

use crate::error::Result;
use crate::http::pool::HttpSettings;
use crate::limiter::ThrottleConfig;

pub const DEFAULT_API_URL: &str = "https://ismp.crpt.ru/api/v3/lk/documents/create";
const ENV_PREFIX: &str = "CRPT";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // General
    pub log_level: String,

    // Endpoint
    pub api_url: String,
    pub token: Option<String>,

    // Throttling
    pub window_ms: u64,
    pub request_limit: u32,
    pub max_queue_depth: Option<usize>,
    pub shutdown_timeout_ms: u64,

    // HTTP
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Config {
    /// Load from `.env` (if present) and `CRPT_*` environment variables.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_environment(Environment::with_prefix(ENV_PREFIX))
    }

    pub fn from_environment(env: Environment) -> Result<Self> {
        let loader = ConfigLoader::builder()
            .set_default("log_level", "info")?
            .set_default("api_url", DEFAULT_API_URL)?
            .set_default("window_ms", 1000)?
            .set_default("request_limit", 5)?
            .set_default("shutdown_timeout_ms", 10_000)?
            .set_default("connect_timeout_ms", 2_000)?
            .set_default("request_timeout_ms", 30_000)?
            .add_source(env.try_parsing(true))
            .build()?;

        Ok(loader.try_deserialize()?)
    }

    pub fn throttle_config(&self) -> Result<ThrottleConfig> {
        let window = Duration::from_millis(self.window_ms);
        let config = ThrottleConfig::new(window, self.request_limit)?;
        Ok(match self.max_queue_depth {
            Some(depth) => config.with_max_queue_depth(depth),
            None => config,
        })
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}
