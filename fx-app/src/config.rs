//! Configuration loading from environment.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail};
use fx_hex::ServiceConfig;
use fx_resilience::{CircuitBreakerConfig, RetryPolicy};
use fx_upstream::UpstreamConfig;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub upstream_base_url: String,
    pub upstream_timeout: Duration,
    pub cache_ttl: Duration,
    /// `None` disables the background sweep.
    pub cache_sweep_interval: Option<Duration>,
    pub retry_max_attempts: u32,
    pub retry_initial_delay: Duration,
    pub breaker_failure_threshold: u32,
    pub breaker_break_duration: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through `lookup`; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let upstream_base_url = get("FX_UPSTREAM_BASE_URL")
            .map(|url| url.trim().to_string())
            .ok_or_else(|| anyhow!("FX_UPSTREAM_BASE_URL environment variable is required"))?;
        if !upstream_base_url.starts_with("http://") && !upstream_base_url.starts_with("https://") {
            bail!(
                "FX_UPSTREAM_BASE_URL must be an http(s) URL, got {:?}",
                upstream_base_url
            );
        }

        let retry_max_attempts: u32 = parse_or(&get, "FX_RETRY_MAX_ATTEMPTS", 3)?;
        if retry_max_attempts == 0 {
            bail!("FX_RETRY_MAX_ATTEMPTS must be at least 1");
        }

        let breaker_failure_threshold: u32 = parse_or(&get, "FX_BREAKER_FAILURE_THRESHOLD", 5)?;
        if breaker_failure_threshold == 0 {
            bail!("FX_BREAKER_FAILURE_THRESHOLD must be at least 1");
        }

        let cache_sweep_secs: u64 = parse_or(&get, "FX_CACHE_SWEEP_SECS", 300)?;

        Ok(Self {
            port: parse_or(&get, "PORT", 3000)?,
            upstream_base_url,
            upstream_timeout: Duration::from_secs(parse_or(&get, "FX_UPSTREAM_TIMEOUT_SECS", 10)?),
            cache_ttl: Duration::from_secs(parse_or(&get, "FX_CACHE_TTL_SECS", 3600)?),
            cache_sweep_interval: (cache_sweep_secs > 0)
                .then(|| Duration::from_secs(cache_sweep_secs)),
            retry_max_attempts,
            retry_initial_delay: Duration::from_millis(parse_or(
                &get,
                "FX_RETRY_INITIAL_DELAY_MS",
                2000,
            )?),
            breaker_failure_threshold,
            breaker_break_duration: Duration::from_secs(parse_or(
                &get,
                "FX_BREAKER_BREAK_SECS",
                60,
            )?),
        })
    }

    pub fn upstream_config(&self) -> UpstreamConfig {
        UpstreamConfig::new(self.upstream_base_url.clone()).with_timeout(self.upstream_timeout)
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            latest_ttl: self.cache_ttl,
            retry: RetryPolicy::new(self.retry_max_attempts, self.retry_initial_delay),
        }
    }

    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.breaker_failure_threshold,
            break_duration: self.breaker_break_duration,
        }
    }
}

fn parse_or<T>(get: impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid {}={:?}: {}", key, raw, e)),
    }
}
