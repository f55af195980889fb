//! # Runtime Configuration
//!
//! [`IryshareConfig`] can be built in code, parsed from JSON, or loaded from
//! the environment. Every field has a default.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `IRYSHARE_GATEWAY_URL` | Gateway that serves uploaded objects | `https://gateway.irys.xyz` |
//! | `IRYSHARE_UPLOAD_URL` | Upload endpoint of the content store | `https://uploader.irys.xyz/upload` |
//! | `IRYSHARE_APP_NAME` | `App-Name` tag and sign-in domain | `iryshare` |
//! | `IRYSHARE_APP_URI` | URI named in the sign-in message | `https://iryshare.app` |
//! | `IRYSHARE_CHAIN` | Chain named in access conditions | `ethereum` |
//! | `IRYSHARE_POLICY_MODE` | `has_balance` or `members` | `has_balance` |
//! | `IRYSHARE_STORAGE_QUOTA_BYTES` | Per-owner quota, `0` for none | `1073741824` |
//! | `IRYSHARE_FETCH_ATTEMPTS` | Envelope fetch attempts on open | `4` |
//! | `IRYSHARE_FETCH_BACKOFF_MS` | First retry delay, doubled each retry | `250` |
//! | `IRYSHARE_HTTP_TIMEOUT_SECS` | HTTP request timeout, `0` for none | `30` |
//! | `IRYSHARE_LOG_FORMAT` | `pretty` or `json` | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use iryshare_core::{PolicyCompiler, PolicyMode, DEFAULT_CHAIN};
use iryshare_store::DEFAULT_GATEWAY;

pub const GATEWAY_URL_ENV: &str = "IRYSHARE_GATEWAY_URL";
pub const UPLOAD_URL_ENV: &str = "IRYSHARE_UPLOAD_URL";
pub const APP_NAME_ENV: &str = "IRYSHARE_APP_NAME";
pub const APP_URI_ENV: &str = "IRYSHARE_APP_URI";
pub const CHAIN_ENV: &str = "IRYSHARE_CHAIN";
pub const POLICY_MODE_ENV: &str = "IRYSHARE_POLICY_MODE";
pub const STORAGE_QUOTA_ENV: &str = "IRYSHARE_STORAGE_QUOTA_BYTES";
pub const FETCH_ATTEMPTS_ENV: &str = "IRYSHARE_FETCH_ATTEMPTS";
pub const FETCH_BACKOFF_ENV: &str = "IRYSHARE_FETCH_BACKOFF_MS";
pub const HTTP_TIMEOUT_ENV: &str = "IRYSHARE_HTTP_TIMEOUT_SECS";
pub const LOG_FORMAT_ENV: &str = "IRYSHARE_LOG_FORMAT";

const DEFAULT_UPLOAD_URL: &str = "https://uploader.irys.xyz/upload";
const DEFAULT_APP_NAME: &str = "iryshare";
const DEFAULT_APP_URI: &str = "https://iryshare.app";
const DEFAULT_QUOTA_BYTES: u64 = 1 << 30;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {name}: {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },

    #[error("invalid configuration JSON: {0}")]
    Json(String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected `pretty` or `json`, got {other:?}")),
        }
    }
}

/// Retry policy for fetching an envelope that the gateway does not serve yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchRetryConfig {
    /// Total attempts, including the first. At least one is always made.
    pub attempts: u32,
    /// Delay before the first retry; doubles after each retry.
    pub backoff_ms: u64,
}

impl Default for FetchRetryConfig {
    fn default() -> Self {
        Self {
            attempts: 4,
            backoff_ms: 250,
        }
    }
}

impl FetchRetryConfig {
    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(16);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

/// Configuration for [`Iryshare`](crate::Iryshare).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IryshareConfig {
    pub gateway_url: Url,
    pub upload_url: Url,
    pub app_name: String,
    pub app_uri: String,
    pub chain: String,
    pub policy_mode: PolicyMode,
    /// `None` disables the quota check.
    pub storage_quota_bytes: Option<u64>,
    pub fetch: FetchRetryConfig,
    /// `None` leaves HTTP requests without a timeout.
    pub http_timeout_secs: Option<u64>,
    pub log_format: LogFormat,
}

impl Default for IryshareConfig {
    fn default() -> Self {
        Self {
            gateway_url: default_url(DEFAULT_GATEWAY),
            upload_url: default_url(DEFAULT_UPLOAD_URL),
            app_name: DEFAULT_APP_NAME.to_string(),
            app_uri: DEFAULT_APP_URI.to_string(),
            chain: DEFAULT_CHAIN.to_string(),
            policy_mode: PolicyMode::default(),
            storage_quota_bytes: Some(DEFAULT_QUOTA_BYTES),
            fetch: FetchRetryConfig::default(),
            http_timeout_secs: Some(DEFAULT_HTTP_TIMEOUT_SECS),
            log_format: LogFormat::default(),
        }
    }
}

fn default_url(s: &str) -> Url {
    // Only called with the constants above.
    Url::parse(s).expect("default URL is valid")
}

impl IryshareConfig {
    /// Parse from a JSON object. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| ConfigError::Json(e.to_string()))?;
        if !value.is_object() {
            return Err(ConfigError::Json("expected a JSON object".to_string()));
        }
        serde_json::from_value(value).map_err(|e| ConfigError::Json(e.to_string()))
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` in place of the environment. Unset and blank
    /// variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();

        if let Some(v) = get(GATEWAY_URL_ENV) {
            config.gateway_url = parse_var(GATEWAY_URL_ENV, &v)?;
        }
        if let Some(v) = get(UPLOAD_URL_ENV) {
            config.upload_url = parse_var(UPLOAD_URL_ENV, &v)?;
        }
        if let Some(v) = get(APP_NAME_ENV) {
            config.app_name = v;
        }
        if let Some(v) = get(APP_URI_ENV) {
            config.app_uri = v;
        }
        if let Some(v) = get(CHAIN_ENV) {
            config.chain = v;
        }
        if let Some(v) = get(POLICY_MODE_ENV) {
            config.policy_mode = match v.to_ascii_lowercase().as_str() {
                "has_balance" => PolicyMode::HasBalance,
                "members" => PolicyMode::Members,
                _ => {
                    return Err(invalid(
                        POLICY_MODE_ENV,
                        &v,
                        "expected `has_balance` or `members`",
                    ))
                }
            };
        }
        if let Some(v) = get(STORAGE_QUOTA_ENV) {
            let quota: u64 = parse_var(STORAGE_QUOTA_ENV, &v)?;
            config.storage_quota_bytes = (quota > 0).then_some(quota);
        }
        if let Some(v) = get(FETCH_ATTEMPTS_ENV) {
            config.fetch.attempts = parse_var(FETCH_ATTEMPTS_ENV, &v)?;
        }
        if let Some(v) = get(FETCH_BACKOFF_ENV) {
            config.fetch.backoff_ms = parse_var(FETCH_BACKOFF_ENV, &v)?;
        }
        if let Some(v) = get(HTTP_TIMEOUT_ENV) {
            let secs: u64 = parse_var(HTTP_TIMEOUT_ENV, &v)?;
            config.http_timeout_secs = (secs > 0).then_some(secs);
        }
        if let Some(v) = get(LOG_FORMAT_ENV) {
            config.log_format = parse_var(LOG_FORMAT_ENV, &v)?;
        }

        Ok(config)
    }

    /// The policy compiler for the configured mode and chain.
    pub fn policy_compiler(&self) -> PolicyCompiler {
        PolicyCompiler::new(self.policy_mode).with_chain(self.chain.clone())
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_secs.map(Duration::from_secs)
    }
}

fn invalid(name: &str, value: &str, reason: impl fmt::Display) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.parse().map_err(|e| invalid(name, value, e))
}
