//! JSON Web Key (JWK) publication for the client's signing key.
//!
//! Authorization and resource servers look the client's public key up by
//! `keyid` in the JWK set published alongside its wallet address. This module
//! produces that representation per [RFC 7517](https://www.rfc-editor.org/rfc/rfc7517.html)
//! and parses it back for verification.
//!
//! Ed25519 public keys are Octet Key Pair (OKP) JWKs:
//!
//! ```json
//! {
//!   "kid": "<key id used in Signature-Input>",
//!   "kty": "OKP",
//!   "crv": "Ed25519",
//!   "alg": "EdDSA",
//!   "x": "<base64url public key>"
//! }
//! ```
//!
//! # Examples
//!
//! ```
//! use ed25519_dalek::SigningKey;
//! use gnap_signer::httpsig::jwk::{Jwk, Jwks};
//!
//! let signing_key = SigningKey::from_bytes(&[0u8; 32]);
//! let jwk = Jwk::from_verifying_key(&signing_key.verifying_key(), "key-1");
//! assert_eq!(jwk.kid, "key-1");
//!
//! let json = Jwks::new(jwk).to_json().expect("serialization should succeed");
//! assert!(json.contains("\"keys\""));
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{GnapError, Result};

/// An Ed25519 public key as an OKP JWK.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    /// Same value the client puts in `keyid`.
    pub kid: String,
    /// `"OKP"`.
    pub kty: String,
    /// `"Ed25519"`.
    pub crv: String,
    /// `"EdDSA"`.
    pub alg: String,
    /// Unpadded base64url of the 32-byte point.
    pub x: String,
}

impl Jwk {
    /// Publishes `verifying_key` under `kid`.
    #[must_use]
    pub fn from_verifying_key(verifying_key: &VerifyingKey, kid: &str) -> Self {
        Self {
            kid: kid.to_owned(),
            kty: "OKP".to_owned(),
            crv: "Ed25519".to_owned(),
            alg: "EdDSA".to_owned(),
            x: URL_SAFE_NO_PAD.encode(verifying_key.as_bytes()),
        }
    }

    /// Parses a JWK from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::Json`] if the JSON is not a JWK.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Recovers the Ed25519 public key.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::WrongKeyType`] for non-OKP/Ed25519 keys and
    /// [`GnapError::InvalidKeyEncoding`] if `x` is not a 32-byte point.
    pub fn to_verifying_key(&self) -> Result<VerifyingKey> {
        if self.kty != "OKP" || self.crv != "Ed25519" {
            return Err(GnapError::WrongKeyType(format!("{}/{}", self.kty, self.crv)));
        }
        let bytes: [u8; 32] = URL_SAFE_NO_PAD
            .decode(&self.x)
            .map_err(|e| GnapError::InvalidKeyEncoding(e.to_string()))?
            .try_into()
            .map_err(|_| GnapError::InvalidKeyEncoding("public key must be 32 bytes".to_owned()))?;
        VerifyingKey::from_bytes(&bytes).map_err(|e| GnapError::InvalidKeyEncoding(e.to_string()))
    }

    /// Computes the JWK thumbprint per RFC 7638.
    ///
    /// Useful as a key id when the deployment has no naming scheme of its own.
    #[must_use]
    pub fn compute_thumbprint(&self) -> String {
        // members in lexicographic order, no whitespace
        let canonical = format!(r#"{{"crv":"{}","kty":"{}","x":"{}"}}"#, self.crv, self.kty, self.x);
        URL_SAFE_NO_PAD.encode(Sha256::digest(canonical.as_bytes()))
    }
}

/// The `{"keys": [...]}` document served next to a wallet address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwks {
    /// Published keys.
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// A set holding just `jwk`.
    #[must_use]
    pub fn new(jwk: Jwk) -> Self {
        Self { keys: vec![jwk] }
    }

    /// Key published under `kid`, if any.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }

    /// Pretty-printed JSON, as served.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::SigningKey;

    use super::*;

    #[test]
    fn test_published_shape() {
        let jwk = Jwk::from_verifying_key(&SigningKey::from_bytes(&[0u8; 32]).verifying_key(), "bob-key");
        let value = serde_json::to_value(&jwk).unwrap();

        assert_eq!(value["kid"], "bob-key");
        assert_eq!(value["kty"], "OKP");
        assert_eq!(value["crv"], "Ed25519");
        assert_eq!(value["alg"], "EdDSA");
        assert_eq!(jwk.x.len(), 43);
    }

    #[test]
    fn test_jwk_roundtrips_public_key() {
        let signing_key = SigningKey::from_bytes(&[3u8; 32]);
        let verifying_key = signing_key.verifying_key();
        let jwk = Jwk::from_verifying_key(&verifying_key, "k");

        let json = serde_json::to_string(&jwk).unwrap();
        let parsed = Jwk::from_json(&json).unwrap();
        assert_eq!(parsed.to_verifying_key().unwrap(), verifying_key);
    }

    #[test]
    fn test_jwk_rejects_other_curves() {
        let signing_key = SigningKey::from_bytes(&[3u8; 32]);
        let mut jwk = Jwk::from_verifying_key(&signing_key.verifying_key(), "k");
        jwk.crv = "X25519".to_owned();
        assert!(matches!(jwk.to_verifying_key(), Err(GnapError::WrongKeyType(_))));
    }

    #[test]
    fn test_jwk_rejects_short_key() {
        let signing_key = SigningKey::from_bytes(&[3u8; 32]);
        let mut jwk = Jwk::from_verifying_key(&signing_key.verifying_key(), "k");
        jwk.x = URL_SAFE_NO_PAD.encode([1u8; 16]);
        assert!(matches!(jwk.to_verifying_key(), Err(GnapError::InvalidKeyEncoding(_))));
    }

    #[test]
    fn test_thumbprint_is_stable_and_key_specific() {
        let a = Jwk::from_verifying_key(&SigningKey::from_bytes(&[0u8; 32]).verifying_key(), "a");
        let b = Jwk::from_verifying_key(&SigningKey::from_bytes(&[1u8; 32]).verifying_key(), "a");

        assert_eq!(a.compute_thumbprint(), a.compute_thumbprint());
        assert_eq!(a.compute_thumbprint().len(), 43);
        assert_ne!(a.compute_thumbprint(), b.compute_thumbprint());
    }

    #[test]
    fn test_jwks_find() {
        let jwk = Jwk::from_verifying_key(&SigningKey::from_bytes(&[0u8; 32]).verifying_key(), "a");
        let jwks = Jwks::new(jwk.clone());

        assert_eq!(jwks.find("a"), Some(&jwk));
        assert!(jwks.find("b").is_none());
        assert!(jwks.to_json().unwrap().contains("\"kty\": \"OKP\""));
    }
}
