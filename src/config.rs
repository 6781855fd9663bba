use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;

fn default_max_upload_bytes() -> usize {
    // 512 MB in bytes
    512 * 1024 * 1024
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub max_upload_bytes: usize,
    pub session_capacity: usize,
    pub llm_url: String,
    pub llm_model: String,
    pub llm_timeout: Duration,
    pub class_column: String,
    pub high_cardinality_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            max_upload_bytes: default_max_upload_bytes(),
            session_capacity: 64,
            llm_url: "http://localhost:11434/api/generate".to_string(),
            llm_model: "llama2".to_string(),
            llm_timeout: Duration::from_secs(300),
            class_column: "IsReturned".to_string(),
            high_cardinality_threshold: 1000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file first
        dotenv().ok();

        let defaults = Config::default();

        Ok(Config {
            bind_addr: env_or("AUDITOR_BIND_ADDR", defaults.bind_addr)?,
            max_upload_bytes: env_or("AUDITOR_MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            session_capacity: env_or("AUDITOR_SESSION_CAPACITY", defaults.session_capacity)?,
            llm_url: env_or("AUDITOR_LLM_URL", defaults.llm_url)?,
            llm_model: env_or("AUDITOR_LLM_MODEL", defaults.llm_model)?,
            llm_timeout: Duration::from_secs(env_or(
                "AUDITOR_LLM_TIMEOUT_SECS",
                defaults.llm_timeout.as_secs(),
            )?),
            class_column: env_or("AUDITOR_CLASS_COLUMN", defaults.class_column)?,
            high_cardinality_threshold: env_or(
                "AUDITOR_HIGH_CARDINALITY_THRESHOLD",
                defaults.high_cardinality_threshold,
            )?,
        })
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Failed to parse {}={:?}", key, raw)),
        Err(_) => Ok(default),
    }
}

pub fn load_config() -> Result<Config> {
    let config = Config::from_env()?;
    if config.session_capacity == 0 {
        anyhow::bail!("AUDITOR_SESSION_CAPACITY must be at least 1");
    }
    Ok(config)
}
