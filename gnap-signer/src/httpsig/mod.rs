//! HTTP message signatures (RFC 9421) with Ed25519.
//!
//! This module contains everything needed to authenticate a request with the
//! client's key and to check such a signature:
//!
//! - [`key`]: loading the Ed25519 private key from a file or base64 blob
//! - [`content_digest`]: the `Content-Digest` header value for a body
//! - [`build_signature_base`]: the canonical string-to-sign
//! - [`RequestSigner`]: covered-component policy and signing
//! - [`SignatureVerifier`]: parsing, policy checks and verification
//! - [`jwk`]: publishing the public key as a JWK
//!
//! # Examples
//!
//! ```
//! use ed25519_dalek::SigningKey;
//! use gnap_signer::httpsig::{RequestSigner, RequestView, SignatureVerifier};
//! use reqwest::{Method, Url, header::HeaderMap};
//!
//! # fn example() -> gnap_signer::error::Result<()> {
//! let signer = RequestSigner::new(SigningKey::from_bytes(&[1u8; 32]), "key-1")?;
//! let verifier = SignatureVerifier::new(signer.verifying_key());
//!
//! let url = Url::parse("https://example.com/resource").unwrap();
//! let mut headers = HeaderMap::new();
//! let signed = signer.sign(&RequestView::new(&Method::GET, &url, &headers, b""))?;
//! signed.apply(&mut headers)?;
//!
//! let verified = verifier.verify(&RequestView::new(&Method::GET, &url, &headers, b""))?;
//! assert_eq!(verified.key_id, "key-1");
//! # Ok(())
//! # }
//! ```

pub mod base;
mod digest;
pub mod jwk;
pub mod key;
pub mod params;
pub mod signer;
pub mod verifier;

pub use base::{Component, RequestView, build_signature_base, target_uri};
pub use digest::{DIGEST_ALGORITHM, content_digest};
pub use params::SignatureParams;
pub use signer::{CONTENT_DIGEST, RequestSigner, SIGNATURE, SIGNATURE_INPUT, SignatureHeaders};
pub use verifier::{SignatureVerifier, VerificationPolicy, VerifiedSignature};

/// Signature label used for signatures this crate produces.
pub const SIGNATURE_LABEL: &str = "sig1";

/// Value of the `alg` signature parameter.
pub const ALGORITHM: &str = "ed25519";
