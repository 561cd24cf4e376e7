//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::bus::EventBusConfig;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Sender address for notification mail
    pub mail_from: String,

    /// SMTP relay host
    pub mail_host: String,

    /// SMTP relay port
    pub mail_port: u16,

    /// Optional SMTP credentials
    pub mail_username: Option<String>,
    pub mail_password: Option<String>,

    /// Permanent event workers
    pub events_pool_core: usize,

    /// Worker ceiling including surge tasks
    pub events_pool_max: usize,

    /// Event queue capacity before inline fallback
    pub events_queue_capacity: usize,

    /// Per-subscriber deadline in milliseconds
    pub events_task_timeout_ms: u64,

    /// Hash cost for the registration surface; unused by the core itself
    pub password_hash_cost: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        Ok(Self {
            database_url,
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10)?,
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_or("PORT", 3000)?,
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "no-reply@expenses.local".to_string()),
            mail_host: env::var("MAIL_HOST").unwrap_or_else(|_| "localhost".to_string()),
            mail_port: parse_or("MAIL_PORT", 25)?,
            mail_username: env::var("MAIL_USERNAME").ok(),
            mail_password: env::var("MAIL_PASSWORD").ok(),
            events_pool_core: parse_or("EVENTS_POOL_CORE", 5)?,
            events_pool_max: parse_or("EVENTS_POOL_MAX", 10)?,
            events_queue_capacity: parse_or("EVENTS_QUEUE_CAPACITY", 100)?,
            events_task_timeout_ms: parse_or("EVENTS_TASK_TIMEOUT_MS", 5000)?,
            password_hash_cost: parse_or("SECURITY_PASSWORD_HASH_COST", 10)?,
        })
    }

    /// Worker pool parameters for the event bus.
    pub fn event_bus_config(&self) -> EventBusConfig {
        EventBusConfig {
            core_workers: self.events_pool_core,
            max_workers: self.events_pool_max.max(self.events_pool_core),
            queue_capacity: self.events_queue_capacity,
            task_timeout: Duration::from_millis(self.events_task_timeout_ms),
        }
    }
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue(name)),
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
