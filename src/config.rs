//! Configuration types for anaplan-tasks

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Service endpoints and request settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the model API, including the version path (default: "https://api.anaplan.com/2/0")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Base URL of the authentication service (default: "https://auth.anaplan.com")
    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    /// Timeout applied to every single request (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth_url: default_auth_url(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Backoff applied between failed task submissions
///
/// The retry budget itself belongs to each job descriptor; this only shapes the waits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmitRetryConfig {
    /// Wait after the first failed attempt (default: 10 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Multiplier applied after every failed attempt (default: 1.5)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Upper bound for a single wait (default: 300 seconds, None = unbounded)
    #[serde(default = "default_max_delay", with = "optional_duration_serde")]
    pub max_delay: Option<Duration>,
}

impl Default for SubmitRetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: default_initial_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay: default_max_delay(),
        }
    }
}

/// Task status polling
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay between status requests (default: 1 second)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub interval: Duration,

    /// Give up polling after this long (default: 6 hours, None = poll forever)
    #[serde(default = "default_poll_timeout", with = "optional_duration_serde")]
    pub timeout: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
            timeout: default_poll_timeout(),
        }
    }
}

/// Chunked transfer settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Upload chunk size in megabytes, 1-50 (default: 10)
    ///
    /// The service rejects request bodies above 50 MB.
    #[serde(default = "default_chunk_size_mb")]
    pub chunk_size_mb: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size_mb: default_chunk_size_mb(),
        }
    }
}

/// Credential lifecycle settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Period of the background token refresh (default: 29 minutes)
    ///
    /// Tokens are valid for 35 minutes; the refresh runs on a fixed period rather than
    /// being computed from the reported expiry.
    #[serde(default = "default_refresh_interval", with = "duration_serde")]
    pub refresh_interval: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_interval: default_refresh_interval(),
        }
    }
}

/// What to do when one nested process step fails to fetch its artifacts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NestedFailurePolicy {
    /// Record the failure and keep reducing the remaining steps (default)
    #[default]
    Continue,
    /// Stop at the first failing step, keeping the records already produced
    Abort,
}

/// Response normalization settings
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Policy for failing nested process steps
    #[serde(default)]
    pub nested_failure_policy: NestedFailurePolicy,
}

/// Main configuration for the task client
///
/// Every section has defaults, so `Config::default()` talks to the public service with
/// the standard timings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Endpoints and request timeout
    #[serde(default)]
    pub api: ApiConfig,

    /// Submission backoff
    #[serde(default)]
    pub retry: SubmitRetryConfig,

    /// Status polling
    #[serde(default)]
    pub poll: PollConfig,

    /// Chunked transfers
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Credential refresh
    #[serde(default)]
    pub auth: AuthConfig,

    /// Result normalization
    #[serde(default)]
    pub normalize: NormalizeConfig,
}

impl Config {
    /// Check that every setting is usable
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("api.base_url", &self.api.base_url),
            ("api.auth_url", &self.api.auth_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| Error::config(format!("invalid URL '{value}': {e}"), key))?;
        }

        if self.api.request_timeout.is_zero() {
            return Err(Error::config(
                "request timeout must be positive",
                "api.request_timeout",
            ));
        }

        if self.retry.backoff_multiplier < 1.0 || !self.retry.backoff_multiplier.is_finite() {
            return Err(Error::config(
                format!(
                    "backoff multiplier must be a finite value >= 1.0, got {}",
                    self.retry.backoff_multiplier
                ),
                "retry.backoff_multiplier",
            ));
        }

        if self.poll.interval.is_zero() {
            return Err(Error::config(
                "poll interval must be positive",
                "poll.interval",
            ));
        }

        if !(1..=50).contains(&self.transfer.chunk_size_mb) {
            return Err(Error::config(
                format!(
                    "chunk size must be between 1 and 50 MB, got {}",
                    self.transfer.chunk_size_mb
                ),
                "transfer.chunk_size_mb",
            ));
        }

        if self.auth.refresh_interval.is_zero() {
            return Err(Error::config(
                "refresh interval must be positive",
                "auth.refresh_interval",
            ));
        }

        Ok(())
    }
}

fn default_base_url() -> String {
    "https://api.anaplan.com/2/0".to_string()
}

fn default_auth_url() -> String {
    "https://auth.anaplan.com".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_backoff_multiplier() -> f64 {
    1.5
}

fn default_max_delay() -> Option<Duration> {
    Some(Duration::from_secs(300))
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_poll_timeout() -> Option<Duration> {
    Some(Duration::from_secs(6 * 60 * 60))
}

fn default_chunk_size_mb() -> u32 {
    10
}

fn default_refresh_interval() -> Duration {
    Duration::from_secs(29 * 60)
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
