//! System-wide configuration.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Postgres connection string.
    pub database_url: String,
    /// Redis connection string for the job-handle store.
    pub redis_url: String,
    /// Address the HTTP server binds to.
    pub listen_addr: String,
    /// Number of runner tasks consuming the delay queue.
    pub runner_count: usize,
    pub queue: QueueConfig,
    pub publisher: PublisherConfig,
    pub linkedin: LinkedInConfig,
    pub reconciler: ReconcilerConfig,
}

/// Delay-queue retry policy and runner polling cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Attempts per job before it is retained as failed.
    pub max_attempts: u32,
    /// Base for the exponential retry backoff.
    pub backoff_ms: u64,
    /// How often an idle runner polls for due jobs.
    pub poll_interval_ms: u64,
    /// Random jitter added to the idle poll, to spread runners out.
    pub poll_jitter_ms: u64,
}

/// Publish-worker knobs: how the platform's asynchronous media processing
/// is polled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    pub poll_interval_ms: u64,
    pub poll_jitter_ms: u64,
    pub poll_max_attempts: u32,
}

/// External platform endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedInConfig {
    pub base_url: String,
    /// Versioned REST API month, sent as the `LinkedIn-Version` header.
    pub version: String,
}

/// Background sweep for drafts and claims left behind by dead workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    pub sweep_interval_ms: u64,
    /// How long a draft may sit in `progress` with no live job before the
    /// sweep fails it.
    pub stuck_after_ms: u64,
}

impl SystemConfig {
    /// Load configuration from the environment.
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            database_url: require("DATABASE_URL")?,
            redis_url: optional("REDIS_URL")
                .unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
            listen_addr: optional("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            runner_count: parsed("RUNNER_COUNT", 2)?,
            queue: QueueConfig {
                max_attempts: parsed("QUEUE_MAX_ATTEMPTS", 3)?,
                backoff_ms: parsed("QUEUE_BACKOFF_MS", 1_000)?,
                poll_interval_ms: parsed("QUEUE_POLL_INTERVAL_MS", 1_000)?,
                poll_jitter_ms: parsed("QUEUE_POLL_JITTER_MS", 250)?,
            },
            publisher: PublisherConfig {
                poll_interval_ms: parsed("PUBLISH_POLL_INTERVAL_MS", 2_000)?,
                poll_jitter_ms: parsed("PUBLISH_POLL_JITTER_MS", 500)?,
                poll_max_attempts: parsed("PUBLISH_POLL_MAX_ATTEMPTS", 30)?,
            },
            linkedin: LinkedInConfig {
                base_url: optional("LINKEDIN_BASE_URL")
                    .unwrap_or_else(|| "https://api.linkedin.com".to_string()),
                version: optional("LINKEDIN_VERSION").unwrap_or_else(|| "202501".to_string()),
            },
            reconciler: ReconcilerConfig {
                sweep_interval_ms: parsed("RECONCILE_INTERVAL_MS", 60_000)?,
                stuck_after_ms: parsed("RECONCILE_STUCK_AFTER_MS", 900_000)?,
            },
        })
    }
}

impl QueueConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl PublisherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl ReconcilerConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn stuck_after(&self) -> Duration {
        Duration::from_millis(self.stuck_after_ms)
    }
}

fn require(var: &str) -> ConfigResult<String> {
    std::env::var(var).map_err(|_| ConfigError::MissingVar(var.to_string()))
}

fn optional(var: &str) -> Option<String> {
    std::env::var(var).ok()
}

fn parsed<T: std::str::FromStr>(var: &str, default: T) -> ConfigResult<T> {
    match std::env::var(var) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            var: var.to_string(),
            message: format!("could not parse {raw:?}"),
        }),
        Err(_) => Ok(default),
    }
}
