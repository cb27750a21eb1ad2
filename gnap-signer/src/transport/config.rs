//! Settings for the reqwest-backed transport.
//!
//! Read from the `[http]` table of [`ClientConfig`](crate::ClientConfig);
//! every key is optional.

use std::{ops::RangeInclusive, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::{GnapError, Result};

const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 100;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

const TIMEOUT_RANGE: RangeInclusive<u64> = 1..=300;
const CONNECT_TIMEOUT_RANGE: RangeInclusive<u64> = 1..=60;

/// Connection pool, timeout and protocol settings.
///
/// ```toml
/// [http]
/// pool_max_idle_per_host = 10
/// timeout_secs = 30
/// http_version = "http2"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    /// Idle connections kept per authorization/resource server.
    pub pool_max_idle_per_host: usize,

    /// Whole-request deadline, seconds (1-300).
    pub timeout_secs: u64,

    /// TCP/TLS connect deadline, seconds (1-60).
    pub connect_timeout_secs: u64,

    /// Protocol selection.
    pub http_version: HttpVersion,

    /// Accept `http://` URLs. Off unless talking to a local test server.
    pub allow_insecure_http: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            http_version: HttpVersion::Auto,
            allow_insecure_http: false,
        }
    }
}

impl HttpConfig {
    /// Checks the timeouts against their allowed ranges.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::Config`] naming the out-of-range field.
    pub fn validate(&self) -> Result<()> {
        check_range("timeout_secs", self.timeout_secs, &TIMEOUT_RANGE)?;
        check_range("connect_timeout_secs", self.connect_timeout_secs, &CONNECT_TIMEOUT_RANGE)
    }

    /// Whole-request deadline.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Connect deadline.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn check_range(field: &str, value: u64, range: &RangeInclusive<u64>) -> Result<()> {
    if range.contains(&value) {
        return Ok(());
    }
    Err(GnapError::Config(format!(
        "{field} must be between {} and {}, got {value}",
        range.start(),
        range.end()
    )))
}

/// Which HTTP protocol the transport speaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HttpVersion {
    /// HTTP/1.1 only.
    Http1,
    /// HTTP/2 with prior knowledge.
    Http2,
    /// Let ALPN decide.
    #[default]
    Auto,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_config_default() {
        let config = HttpConfig::default();
        assert_eq!(config.pool_max_idle_per_host, 100);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.http_version, HttpVersion::Auto);
        assert!(!config.allow_insecure_http);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_http_config_from_toml() {
        let toml = "
            pool_max_idle_per_host = 20
            timeout_secs = 45
            http_version = \"http1\"
            allow_insecure_http = true
        ";

        let config: HttpConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.pool_max_idle_per_host, 20);
        assert_eq!(config.timeout_secs, 45);
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.http_version, HttpVersion::Http1);
        assert!(config.allow_insecure_http);
    }

    #[test]
    fn test_http_config_rejects_unknown_fields_and_versions() {
        assert!(toml::from_str::<HttpConfig>("timeout = 5").is_err());
        assert!(toml::from_str::<HttpConfig>("http_version = \"http3\"").is_err());
    }

    #[test]
    fn test_http_config_validate_bounds() {
        let ok = HttpConfig { timeout_secs: 300, connect_timeout_secs: 60, ..HttpConfig::default() };
        assert!(ok.validate().is_ok());

        for config in [
            HttpConfig { timeout_secs: 0, ..HttpConfig::default() },
            HttpConfig { timeout_secs: 301, ..HttpConfig::default() },
            HttpConfig { connect_timeout_secs: 0, ..HttpConfig::default() },
            HttpConfig { connect_timeout_secs: 61, ..HttpConfig::default() },
        ] {
            assert!(matches!(config.validate(), Err(GnapError::Config(_))), "{config:?}");
        }
    }

    #[test]
    fn test_validate_names_field() {
        let config = HttpConfig { connect_timeout_secs: 90, ..HttpConfig::default() };
        assert_eq!(
            config.validate().unwrap_err().to_string(),
            "invalid configuration: connect_timeout_secs must be between 1 and 60, got 90"
        );
    }
}
