//! Verification of Ed25519 HTTP message signatures.
//!
//! The verifier parses `Signature-Input`, rebuilds the signature base from
//! the declared components and checks the signature against a known public
//! key. Header absence and unparsable `Signature-Input` are reported as
//! distinct errors; every other failure is the uniform
//! [`GnapError::InvalidSignature`].

use ed25519_dalek::{Signature, VerifyingKey};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName};
use signature::Verifier;
use tracing::{debug, instrument, warn};

use super::{
    ALGORITHM,
    base::{Component, RequestView, build_base},
    content_digest,
    params::{SignatureInput, parse_signature, parse_signature_input},
    signer::{CONTENT_DIGEST, SIGNATURE, SIGNATURE_INPUT},
};
use crate::error::{GnapError, Result};

/// How much of the covered component set the verifier insists on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VerificationPolicy {
    /// Require the components this crate's signer always covers.
    ///
    /// The declared list must include `@method`, `@target-uri`,
    /// `authorization` when the request carries one, and, for a non-empty
    /// body, `content-digest`, `content-length` and `content-type`. The
    /// received `Content-Digest` must also match the body.
    #[default]
    Strict,
    /// Trust whatever list the signer declared.
    DeclaredOnly,
}

/// Metadata of a signature that verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSignature {
    /// Signature label, e.g. `sig1`.
    pub label: String,
    /// Declared `keyid`.
    pub key_id: String,
    /// Declared `created` timestamp.
    pub created: u64,
    /// Covered components, in declared order.
    pub components: Vec<Component>,
}

/// Verifies request signatures made with one Ed25519 key.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    verifying_key: VerifyingKey,
    policy: VerificationPolicy,
}

impl SignatureVerifier {
    /// Creates a verifier with the [`VerificationPolicy::Strict`] policy.
    #[must_use]
    pub fn new(verifying_key: VerifyingKey) -> Self {
        Self { verifying_key, policy: VerificationPolicy::default() }
    }

    /// Replaces the verification policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: VerificationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the active policy.
    #[must_use]
    pub const fn policy(&self) -> VerificationPolicy {
        self.policy
    }

    /// Verifies the signature carried by `request`.
    ///
    /// When `Signature-Input` has several members, the first one is verified.
    ///
    /// # Errors
    ///
    /// - [`GnapError::MissingSignatureInput`] / [`GnapError::MissingSignature`]
    ///   if a header is absent
    /// - [`GnapError::MalformedSignatureInput`] if `Signature-Input` does not
    ///   parse
    /// - [`GnapError::InvalidSignature`] for everything else, including a
    ///   declared component the request cannot supply
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    pub fn verify(&self, request: &RequestView<'_>) -> Result<VerifiedSignature> {
        let input_header = joined_header(request.headers, &SIGNATURE_INPUT)
            .map_err(GnapError::MalformedSignatureInput)?
            .ok_or(GnapError::MissingSignatureInput)?;
        let signature_header = joined_header(request.headers, &SIGNATURE)
            .map_err(|_| GnapError::InvalidSignature)?
            .ok_or(GnapError::MissingSignature)?;

        let input = parse_signature_input(&input_header)?
            .into_iter()
            .next()
            .ok_or_else(|| GnapError::MalformedSignatureInput("no signature".to_owned()))?;

        let result = self.verify_input(request, &input, &signature_header);
        match &result {
            Ok(()) => debug!(key_id = %input.params.keyid, "signature verified"),
            Err(e) => warn!(key_id = %input.params.keyid, error = %e, "signature verification failed"),
        }
        result?;

        Ok(VerifiedSignature {
            label: input.label,
            key_id: input.params.keyid,
            created: input.params.created,
            components: input.params.components,
        })
    }

    fn verify_input(
        &self,
        request: &RequestView<'_>,
        input: &SignatureInput,
        signature_header: &str,
    ) -> Result<()> {
        if input.alg.as_deref().is_some_and(|alg| alg != ALGORITHM) {
            return Err(GnapError::InvalidSignature);
        }

        let signature_bytes = parse_signature(signature_header)?
            .into_iter()
            .find(|(label, _)| *label == input.label)
            .map(|(_, bytes)| bytes)
            .ok_or(GnapError::InvalidSignature)?;

        if self.policy == VerificationPolicy::Strict {
            Self::check_strict(request, input)?;
        }

        // a covered component that cannot be rebuilt is just a bad signature
        let base = build_base(request, &input.params.components, input.serialized_params())
            .map_err(|_| GnapError::InvalidSignature)?;

        let signature_bytes: [u8; 64] =
            signature_bytes.try_into().map_err(|_| GnapError::InvalidSignature)?;
        let signature = Signature::from_bytes(&signature_bytes);
        self.verifying_key
            .verify(base.as_bytes(), &signature)
            .map_err(|_| GnapError::InvalidSignature)
    }

    fn check_strict(request: &RequestView<'_>, input: &SignatureInput) -> Result<()> {
        let params = &input.params;
        let mut required = vec![Component::Method, Component::TargetUri];
        if request.headers.contains_key(AUTHORIZATION) {
            required.push(Component::authorization());
        }
        if !request.body.is_empty() {
            required.extend([
                Component::content_digest(),
                Component::content_length(),
                Component::content_type(),
            ]);
        }
        if !required.iter().all(|c| params.covers(c)) {
            return Err(GnapError::InvalidSignature);
        }

        if !request.body.is_empty() {
            let received = request
                .headers
                .get(CONTENT_DIGEST)
                .and_then(|v| v.to_str().ok())
                .ok_or(GnapError::InvalidSignature)?;
            if received.trim() != content_digest(request.body) {
                return Err(GnapError::InvalidSignature);
            }
        }
        Ok(())
    }
}

/// Returns all values of `name` joined with `", "`, or `None` if absent.
fn joined_header(
    headers: &HeaderMap,
    name: &HeaderName,
) -> std::result::Result<Option<String>, String> {
    let mut values = Vec::new();
    for value in headers.get_all(name) {
        values.push(value.to_str().map_err(|e| format!("{name}: {e}"))?);
    }
    Ok(if values.is_empty() { None } else { Some(values.join(", ")) })
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::SigningKey;
    use reqwest::{
        Method, Url,
        header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderValue},
    };

    use super::*;
    use crate::httpsig::RequestSigner;

    fn key() -> SigningKey {
        SigningKey::from_bytes(&[9u8; 32])
    }

    fn signed_headers(method: &Method, url: &Url, mut headers: HeaderMap, body: &[u8]) -> HeaderMap {
        let signer = RequestSigner::new(key(), "client-key").unwrap();
        let signed = signer.sign_at(&RequestView::new(method, url, &headers, body), 1_700_000_000).unwrap();
        signed.apply(&mut headers).unwrap();
        headers
    }

    fn body_headers(body: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        headers.insert(CONTENT_DIGEST, HeaderValue::from_str(&content_digest(body)).unwrap());
        headers
    }

    #[test]
    fn test_verify_roundtrip_get() {
        let url = Url::parse("https://example.com/resource").unwrap();
        let headers = signed_headers(&Method::GET, &url, HeaderMap::new(), b"");

        let verifier = SignatureVerifier::new(key().verifying_key());
        let verified = verifier.verify(&RequestView::new(&Method::GET, &url, &headers, b"")).unwrap();

        assert_eq!(verified.label, "sig1");
        assert_eq!(verified.key_id, "client-key");
        assert_eq!(verified.created, 1_700_000_000);
        assert_eq!(verified.components, vec![Component::Method, Component::TargetUri]);
    }

    #[test]
    fn test_verify_roundtrip_with_body() {
        let url = Url::parse("https://auth.example.com/").unwrap();
        let body = br#"{"access_token":{"access":[{"type":"incoming-payment"}]}}"#;
        let headers = signed_headers(&Method::POST, &url, body_headers(body), body);

        let verifier = SignatureVerifier::new(key().verifying_key());
        assert!(verifier.verify(&RequestView::new(&Method::POST, &url, &headers, body)).is_ok());
    }

    #[test]
    fn test_missing_headers_are_distinct() {
        let url = Url::parse("https://example.com/").unwrap();
        let verifier = SignatureVerifier::new(key().verifying_key());

        let empty = HeaderMap::new();
        let result = verifier.verify(&RequestView::new(&Method::GET, &url, &empty, b""));
        assert!(matches!(result, Err(GnapError::MissingSignatureInput)));

        let mut headers = signed_headers(&Method::GET, &url, HeaderMap::new(), b"");
        headers.remove(SIGNATURE);
        let result = verifier.verify(&RequestView::new(&Method::GET, &url, &headers, b""));
        assert!(matches!(result, Err(GnapError::MissingSignature)));
    }

    #[test]
    fn test_malformed_input() {
        let url = Url::parse("https://example.com/").unwrap();
        let mut headers = signed_headers(&Method::GET, &url, HeaderMap::new(), b"");
        headers.insert(SIGNATURE_INPUT, HeaderValue::from_static("sig1=garbage"));

        let verifier = SignatureVerifier::new(key().verifying_key());
        let result = verifier.verify(&RequestView::new(&Method::GET, &url, &headers, b""));
        assert!(matches!(result, Err(GnapError::MalformedSignatureInput(_))));
    }

    #[test]
    fn test_tampered_method_fails() {
        let url = Url::parse("https://example.com/").unwrap();
        let headers = signed_headers(&Method::GET, &url, HeaderMap::new(), b"");

        let verifier = SignatureVerifier::new(key().verifying_key());
        let result = verifier.verify(&RequestView::new(&Method::DELETE, &url, &headers, b""));
        assert!(matches!(result, Err(GnapError::InvalidSignature)));
    }

    #[test]
    fn test_wrong_key_fails() {
        let url = Url::parse("https://example.com/").unwrap();
        let headers = signed_headers(&Method::GET, &url, HeaderMap::new(), b"");

        let other = SigningKey::from_bytes(&[1u8; 32]).verifying_key();
        let result = SignatureVerifier::new(other)
            .verify(&RequestView::new(&Method::GET, &url, &headers, b""));
        assert!(matches!(result, Err(GnapError::InvalidSignature)));
    }

    #[test]
    fn test_label_mismatch_and_bad_length_are_uniform() {
        let url = Url::parse("https://example.com/").unwrap();
        let verifier = SignatureVerifier::new(key().verifying_key());

        let mut headers = signed_headers(&Method::GET, &url, HeaderMap::new(), b"");
        let relabeled = headers[SIGNATURE].to_str().unwrap().replacen("sig1", "sig2", 1);
        headers.insert(SIGNATURE, HeaderValue::from_str(&relabeled).unwrap());
        let result = verifier.verify(&RequestView::new(&Method::GET, &url, &headers, b""));
        assert!(matches!(result, Err(GnapError::InvalidSignature)));

        headers.insert(SIGNATURE, HeaderValue::from_static("sig1=:AQID:"));
        let result = verifier.verify(&RequestView::new(&Method::GET, &url, &headers, b""));
        assert!(matches!(result, Err(GnapError::InvalidSignature)));
    }

    #[test]
    fn test_other_algorithm_is_rejected() {
        let url = Url::parse("https://example.com/").unwrap();
        let mut headers = signed_headers(&Method::GET, &url, HeaderMap::new(), b"");
        let input = headers[SIGNATURE_INPUT].to_str().unwrap().replace("ed25519", "rsa-pss-sha512");
        headers.insert(SIGNATURE_INPUT, HeaderValue::from_str(&input).unwrap());

        let verifier = SignatureVerifier::new(key().verifying_key());
        let result = verifier.verify(&RequestView::new(&Method::GET, &url, &headers, b""));
        assert!(matches!(result, Err(GnapError::InvalidSignature)));
    }

    #[test]
    fn test_strict_requires_body_coverage() {
        // signed as a GET without body, then a body is attached
        let url = Url::parse("https://example.com/").unwrap();
        let headers = signed_headers(&Method::POST, &url, HeaderMap::new(), b"");
        let verifier = SignatureVerifier::new(key().verifying_key());

        let result = verifier.verify(&RequestView::new(&Method::POST, &url, &headers, b"{}"));
        assert!(matches!(result, Err(GnapError::InvalidSignature)));

        let lenient = verifier.with_policy(VerificationPolicy::DeclaredOnly);
        assert!(lenient.verify(&RequestView::new(&Method::POST, &url, &headers, b"{}")).is_ok());
    }

    #[test]
    fn test_strict_checks_digest_against_body() {
        let url = Url::parse("https://example.com/").unwrap();
        let body = b"{\"a\":1}";
        let headers = signed_headers(&Method::POST, &url, body_headers(body), body);
        let verifier = SignatureVerifier::new(key().verifying_key());

        let result = verifier.verify(&RequestView::new(&Method::POST, &url, &headers, b"{\"a\":2}"));
        assert!(matches!(result, Err(GnapError::InvalidSignature)));

        // declared-only trusts the signed digest header and ignores the body
        let lenient = verifier.with_policy(VerificationPolicy::DeclaredOnly);
        assert!(lenient.verify(&RequestView::new(&Method::POST, &url, &headers, b"{\"a\":2}")).is_ok());
    }

    #[test]
    fn test_strict_requires_authorization_coverage() {
        let url = Url::parse("https://example.com/").unwrap();
        let mut headers = signed_headers(&Method::GET, &url, HeaderMap::new(), b"");
        headers.insert(AUTHORIZATION, HeaderValue::from_static("GNAP injected"));

        let verifier = SignatureVerifier::new(key().verifying_key());
        let result = verifier.verify(&RequestView::new(&Method::GET, &url, &headers, b""));
        assert!(matches!(result, Err(GnapError::InvalidSignature)));
    }

    #[test]
    fn test_unbuildable_component_is_uniform() {
        let url = Url::parse("https://example.com/").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            SIGNATURE_INPUT,
            HeaderValue::from_static(
                r#"sig1=("@method" "x-request-id");created=1700000000;keyid="client-key";alg="ed25519""#,
            ),
        );
        headers.insert(SIGNATURE, HeaderValue::from_static("sig1=:AQID:"));
        let verifier =
            SignatureVerifier::new(key().verifying_key()).with_policy(VerificationPolicy::DeclaredOnly);

        let result = verifier.verify(&RequestView::new(&Method::GET, &url, &headers, b""));
        assert!(matches!(result, Err(GnapError::InvalidSignature)));

        headers.insert("x-request-id", HeaderValue::from_bytes(b"req-\xff").unwrap());
        let result = verifier.verify(&RequestView::new(&Method::GET, &url, &headers, b""));
        assert!(matches!(result, Err(GnapError::InvalidSignature)));
    }
}
