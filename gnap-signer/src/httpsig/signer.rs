//! Request signing with Ed25519 HTTP message signatures.

use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use ed25519_dalek::{SigningKey, VerifyingKey};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use signature::Signer;
use tracing::{debug, instrument};

use super::{
    SIGNATURE_LABEL,
    base::{Component, RequestView, build_signature_base},
    params::{SignatureParams, format_signature, format_signature_input, is_valid_sf_string},
};
use crate::error::{GnapError, Result};

/// `Signature` header name.
pub const SIGNATURE: HeaderName = HeaderName::from_static("signature");

/// `Signature-Input` header name.
pub const SIGNATURE_INPUT: HeaderName = HeaderName::from_static("signature-input");

/// `Content-Digest` header name.
pub const CONTENT_DIGEST: HeaderName = HeaderName::from_static("content-digest");

/// The `Signature` / `Signature-Input` header pair produced for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeaders {
    /// `Signature` header value.
    pub signature: String,
    /// `Signature-Input` header value.
    pub signature_input: String,
}

impl SignatureHeaders {
    /// Sets both headers on `headers`, replacing earlier values.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::InvalidHeaderValue`] if a value is not a legal
    /// header value (only possible for hand-built instances).
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<()> {
        headers.insert(SIGNATURE, header_value(&SIGNATURE, &self.signature)?);
        headers.insert(SIGNATURE_INPUT, header_value(&SIGNATURE_INPUT, &self.signature_input)?);
        Ok(())
    }
}

fn header_value(name: &HeaderName, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| GnapError::InvalidHeaderValue { name: name.to_string(), reason: e.to_string() })
}

/// Signs outbound requests with the client's Ed25519 key.
///
/// The key is shared behind an [`Arc`], so clones are cheap and concurrent
/// signing needs no locking. Signing never mutates the request: it returns
/// the headers to attach.
///
/// # Examples
///
/// ```
/// use ed25519_dalek::SigningKey;
/// use gnap_signer::httpsig::{RequestSigner, RequestView};
/// use reqwest::{Method, Url, header::HeaderMap};
///
/// # fn example() -> gnap_signer::error::Result<()> {
/// let signer = RequestSigner::new(SigningKey::from_bytes(&[0u8; 32]), "key-1")?;
///
/// let url = Url::parse("https://example.com/resource").unwrap();
/// let headers = HeaderMap::new();
/// let request = RequestView::new(&Method::GET, &url, &headers, b"");
///
/// let signed = signer.sign(&request)?;
/// assert!(signed.signature.starts_with("sig1=:"));
/// assert!(signed.signature_input.starts_with("sig1=(\"@method\" \"@target-uri\")"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RequestSigner {
    signing_key: Arc<SigningKey>,
    key_id: String,
}

impl RequestSigner {
    /// Creates a signer for `key_id`.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::InvalidInput`] if `key_id` is empty or contains
    /// characters that cannot appear in a structured-field string.
    pub fn new(signing_key: SigningKey, key_id: impl Into<String>) -> Result<Self> {
        Self::from_shared(Arc::new(signing_key), key_id)
    }

    /// Creates a signer over an already shared key.
    ///
    /// # Errors
    ///
    /// Same as [`RequestSigner::new`].
    pub fn from_shared(signing_key: Arc<SigningKey>, key_id: impl Into<String>) -> Result<Self> {
        let key_id = key_id.into();
        if key_id.is_empty() || !is_valid_sf_string(&key_id) {
            return Err(GnapError::InvalidInput(format!("invalid key id {key_id:?}")));
        }
        Ok(Self { signing_key, key_id })
    }

    /// Returns the key id carried in `keyid`.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Returns the public half of the signing key.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Returns the components covered for `request`.
    ///
    /// Always `@method` and `@target-uri`; `authorization` when the request
    /// carries one; `content-digest`, `content-length` and `content-type`
    /// when the body is non-empty.
    #[must_use]
    pub fn covered_components(request: &RequestView<'_>) -> Vec<Component> {
        let mut components = vec![Component::Method, Component::TargetUri];
        if request.headers.contains_key(AUTHORIZATION) {
            components.push(Component::authorization());
        }
        if !request.body.is_empty() {
            components.push(Component::content_digest());
            components.push(Component::content_length());
            components.push(Component::content_type());
        }
        components
    }

    /// Signs a request with the current time as `created`.
    ///
    /// # Errors
    ///
    /// Returns a construction error if the signature base cannot be built.
    pub fn sign(&self, request: &RequestView<'_>) -> Result<SignatureHeaders> {
        let created = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| GnapError::InvalidInput(format!("system clock before Unix epoch: {e}")))?
            .as_secs();
        self.sign_at(request, created)
    }

    /// Signs a request with an explicit `created` timestamp.
    ///
    /// # Errors
    ///
    /// Returns a construction error if the signature base cannot be built.
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url, key_id = %self.key_id))]
    pub fn sign_at(&self, request: &RequestView<'_>, created: u64) -> Result<SignatureHeaders> {
        let params =
            SignatureParams::new(Self::covered_components(request), created, self.key_id.as_str());
        let base = build_signature_base(request, &params)?;
        let signature = self.signing_key.sign(base.as_bytes());

        debug!(components = params.components.len(), "request signed");
        Ok(SignatureHeaders {
            signature: format_signature(SIGNATURE_LABEL, &signature.to_bytes()),
            signature_input: format_signature_input(SIGNATURE_LABEL, &params),
        })
    }
}

#[cfg(test)]
mod tests {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use ed25519_dalek::Signature;
    use reqwest::{
        Method, Url,
        header::{CONTENT_LENGTH, CONTENT_TYPE},
    };
    use signature::Verifier;

    use super::*;
    use crate::httpsig::content_digest;

    fn signer() -> RequestSigner {
        RequestSigner::new(SigningKey::from_bytes(&[0u8; 32]), "test-key").unwrap()
    }

    #[test]
    fn test_get_without_body_covers_method_and_target() {
        let url = Url::parse("https://example.com/resource").unwrap();
        let headers = HeaderMap::new();
        let request = RequestView::new(&Method::GET, &url, &headers, b"");

        let signed = signer().sign_at(&request, 1_700_000_000).unwrap();
        assert_eq!(
            signed.signature_input,
            "sig1=(\"@method\" \"@target-uri\");created=1700000000;keyid=\"test-key\";alg=\"ed25519\""
        );

        let base = "\"@method\": GET\n\"@target-uri\": https://example.com/resource\n\
                    \"@signature-params\": (\"@method\" \"@target-uri\");created=1700000000;\
                    keyid=\"test-key\";alg=\"ed25519\"";
        let encoded = signed.signature.strip_prefix("sig1=:").unwrap().strip_suffix(':').unwrap();
        let bytes: [u8; 64] = STANDARD.decode(encoded).unwrap().try_into().unwrap();
        signer()
            .verifying_key()
            .verify(base.as_bytes(), &Signature::from_bytes(&bytes))
            .unwrap();
    }

    #[test]
    fn test_authorization_is_covered_when_present() {
        let url = Url::parse("https://example.com/resource").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("GNAP abc"));
        let request = RequestView::new(&Method::GET, &url, &headers, b"");

        assert_eq!(
            RequestSigner::covered_components(&request),
            vec![Component::Method, Component::TargetUri, Component::authorization()]
        );
    }

    #[test]
    fn test_body_adds_content_components() {
        let url = Url::parse("https://auth.example.com/").unwrap();
        let body = br#"{"access_token":{}}"#;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        headers.insert(CONTENT_DIGEST, HeaderValue::from_str(&content_digest(body)).unwrap());
        let request = RequestView::new(&Method::POST, &url, &headers, body);

        let signed = signer().sign_at(&request, 1).unwrap();
        assert!(signed.signature_input.starts_with(
            "sig1=(\"@method\" \"@target-uri\" \"content-digest\" \"content-length\" \"content-type\");"
        ));
    }

    #[test]
    fn test_signing_is_deterministic() {
        let url = Url::parse("https://example.com/").unwrap();
        let headers = HeaderMap::new();
        let request = RequestView::new(&Method::DELETE, &url, &headers, b"");

        assert_eq!(signer().sign_at(&request, 42).unwrap(), signer().sign_at(&request, 42).unwrap());
        assert_ne!(
            signer().sign_at(&request, 42).unwrap().signature,
            signer().sign_at(&request, 43).unwrap().signature
        );
    }

    #[test]
    fn test_rejects_bad_key_id() {
        let key = SigningKey::from_bytes(&[0u8; 32]);
        assert!(matches!(RequestSigner::new(key.clone(), ""), Err(GnapError::InvalidInput(_))));
        assert!(matches!(RequestSigner::new(key, "bad\nid"), Err(GnapError::InvalidInput(_))));
    }

    #[test]
    fn test_apply_sets_both_headers() {
        let url = Url::parse("https://example.com/").unwrap();
        let headers = HeaderMap::new();
        let request = RequestView::new(&Method::GET, &url, &headers, b"");
        let signed = signer().sign_at(&request, 1).unwrap();

        let mut out = HeaderMap::new();
        signed.apply(&mut out).unwrap();
        assert_eq!(out.get(&SIGNATURE).unwrap(), signed.signature.as_str());
        assert_eq!(out.get(&SIGNATURE_INPUT).unwrap(), signed.signature_input.as_str());
    }

    #[test]
    fn test_debug_does_not_expose_secret() {
        let debug = format!("{:?}", signer());
        assert!(debug.contains("test-key"));
        assert!(!debug.contains("secret_key"));
    }
}
