//! Client configuration file.
//!
//! ```toml
//! wallet_address = "https://wallet.example.com/alice"
//! private_key = "/etc/gnap/alice.pem"
//! key_id = "alice-key-1"
//! max_body_bytes = 1048576
//!
//! [http]
//! timeout_secs = 30
//! http_version = "http2"
//! ```

use std::{fmt, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    client::validate_wallet_address,
    error::{GnapError, Result},
    pipeline::DEFAULT_MAX_BODY_BYTES,
    transport::HttpConfig,
};

/// Everything needed to build an [`AuthenticatedClient`](crate::AuthenticatedClient).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Wallet address URL identifying the client.
    pub wallet_address: String,

    /// Path to a PKCS#8 PEM file, or the base64 encoding of one.
    pub private_key: String,

    /// Key id published with the public key.
    pub key_id: String,

    /// Upper bound for buffered request bodies.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Transport settings.
    #[serde(default)]
    pub http: HttpConfig,
}

const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("wallet_address", &self.wallet_address)
            .field("private_key", &"<redacted>")
            .field("key_id", &self.key_id)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("http", &self.http)
            .finish()
    }
}

impl ClientConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::Config`] for syntax errors, unknown keys and
    /// values rejected by [`ClientConfig::validate`].
    pub fn from_toml(document: &str) -> Result<Self> {
        let config: Self = toml::from_str(document).map_err(|e| GnapError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::Config`] if the file cannot be read or is invalid.
    pub fn from_file(path: &Path) -> Result<Self> {
        let document = std::fs::read_to_string(path)
            .map_err(|e| GnapError::Config(format!("could not read {}: {e}", path.display())))?;
        Self::from_toml(&document)
    }

    /// Checks every field without loading the key.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::Config`] naming the first rejected field.
    pub fn validate(&self) -> Result<()> {
        validate_wallet_address(&self.wallet_address)
            .map_err(|e| GnapError::Config(format!("wallet_address: {e}")))?;
        if self.private_key.trim().is_empty() {
            return Err(GnapError::Config("private_key must not be empty".to_owned()));
        }
        if self.key_id.trim().is_empty() {
            return Err(GnapError::Config("key_id must not be empty".to_owned()));
        }
        if self.max_body_bytes == 0 {
            return Err(GnapError::Config("max_body_bytes must be greater than 0".to_owned()));
        }
        self.http.validate()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::transport::HttpVersion;

    const MINIMAL: &str = r#"
        wallet_address = "https://wallet.example.com/alice"
        private_key = "/etc/gnap/alice.pem"
        key_id = "alice-key-1"
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = ClientConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.key_id, "alice-key-1");
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert_eq!(config.http, HttpConfig::default());
    }

    #[test]
    fn test_http_table() {
        let document = format!("{MINIMAL}\n[http]\ntimeout_secs = 5\nhttp_version = \"http1\"\n");
        let config = ClientConfig::from_toml(&document).unwrap();
        assert_eq!(config.http.timeout_secs, 5);
        assert_eq!(config.http.http_version, HttpVersion::Http1);
    }

    #[test]
    fn test_rejected_configs() {
        let cases = [
            MINIMAL.replace("https://wallet.example.com/alice", "$wallet.example.com/alice"),
            MINIMAL.replace("alice-key-1", ""),
            format!("{MINIMAL}max_body_bytes = 0\n"),
            format!("{MINIMAL}\n[http]\nconnect_timeout_secs = 61\n"),
            format!("{MINIMAL}unknown = true\n"),
            "wallet_address = ".to_owned(),
        ];
        for document in cases {
            assert!(
                matches!(ClientConfig::from_toml(&document), Err(GnapError::Config(_))),
                "accepted: {document}"
            );
        }
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let config = ClientConfig::from_toml(MINIMAL).unwrap();
        let debug = format!("{config:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("alice.pem"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let config = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(config.wallet_address, "https://wallet.example.com/alice");

        let missing = ClientConfig::from_file(Path::new("/nonexistent/gnap.toml"));
        assert!(matches!(missing, Err(GnapError::Config(_))));
    }
}
