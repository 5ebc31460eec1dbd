use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string for job queue
    pub redis_url: String,

    /// HS256 secret used to verify bearer tokens
    pub jwt_secret: String,

    /// Course generation endpoint
    pub generation_api_url: String,

    pub generation_api_key: Option<String>,

    /// Per-call timeout for the generation backend. Unset means no timeout.
    pub generation_timeout_secs: Option<u64>,

    /// Estimated minutes spent generating one course
    #[serde(default = "default_per_task_minutes")]
    pub per_task_minutes: f64,

    /// Age of a processing job's heartbeat after which another worker may take it over
    #[serde(default = "default_claim_lease_secs")]
    pub claim_lease_secs: u64,

    /// Prometheus listener for the worker process (e.g., "0.0.0.0:9100")
    pub worker_metrics_addr: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_per_task_minutes() -> f64 {
    0.5
}

fn default_claim_lease_secs() -> u64 {
    900
}

/// Upper bound for `per_task_minutes`: one day per course.
const MAX_PER_TASK_MINUTES: f64 = 1440.0;

/// Bounds for `claim_lease_secs`, from thirty seconds to one day.
const MIN_CLAIM_LEASE_SECS: u64 = 30;
const MAX_CLAIM_LEASE_SECS: u64 = 86_400;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make time estimates or claim leases overflow.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.per_task_minutes.is_finite()
            || !(0.0..=MAX_PER_TASK_MINUTES).contains(&self.per_task_minutes)
        {
            return Err(ConfigError::Invalid(format!(
                "PER_TASK_MINUTES must be between 0 and {}, got {}",
                MAX_PER_TASK_MINUTES, self.per_task_minutes
            )));
        }

        if !(MIN_CLAIM_LEASE_SECS..=MAX_CLAIM_LEASE_SECS).contains(&self.claim_lease_secs) {
            return Err(ConfigError::Invalid(format!(
                "CLAIM_LEASE_SECS must be between {} and {}, got {}",
                MIN_CLAIM_LEASE_SECS, MAX_CLAIM_LEASE_SECS, self.claim_lease_secs
            )));
        }

        Ok(())
    }

    pub fn generation_timeout(&self) -> Option<Duration> {
        self.generation_timeout_secs.map(Duration::from_secs)
    }

    pub fn claim_lease(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.claim_lease_secs as i64)
    }
}
