//! Error types for the GNAP signing client.
//!
//! Every fallible operation in this crate returns [`Result<T>`], whose error
//! type [`GnapError`] names the category of failure. Partial results are never
//! returned alongside an error.
//!
//! # Error Categories
//!
//! - **Key material** ([`GnapError::InvalidKeyEncoding`], [`GnapError::InvalidPem`],
//!   [`GnapError::InvalidKeyStructure`], [`GnapError::WrongKeyType`],
//!   [`GnapError::KeyFile`]): the private key could not be loaded
//! - **Construction** ([`GnapError::MissingComponent`], [`GnapError::InvalidHeaderValue`]):
//!   a signature base could not be built from the request
//! - **Verification** ([`GnapError::MissingSignatureInput`], [`GnapError::MissingSignature`],
//!   [`GnapError::MalformedSignatureInput`], [`GnapError::InvalidSignature`])
//! - **Protocol** ([`GnapError::Protocol`], [`GnapError::InvalidResponse`]): the server
//!   answered, but not with what the grant protocol expects
//! - **Transport** ([`GnapError::Http`], [`GnapError::Cancelled`]): the request never
//!   completed
//!
//! # Examples
//!
//! ```
//! use gnap_signer::error::{GnapError, Result};
//!
//! fn require_token(token: &str) -> Result<&str> {
//!     if token.is_empty() {
//!         return Err(GnapError::InvalidInput("missing access token".to_owned()));
//!     }
//!     Ok(token)
//! }
//!
//! assert!(require_token("").is_err());
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for GNAP client operations.
pub type Result<T> = std::result::Result<T, GnapError>;

/// Errors that can occur while signing, verifying, or driving a grant.
///
/// No variant is retried automatically anywhere in this crate. Grant
/// continuation and cancellation handles are single-use, so blind retries
/// would fail on the server side anyway; retry policy belongs to the caller.
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum GnapError {
    /// The key material was not valid base64.
    ///
    /// # Recovery
    ///
    /// Pass either a path to an existing PEM file or the standard base64
    /// encoding of the whole PEM document (header and footer included).
    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    /// The decoded key material was not a PEM document.
    #[error("invalid PEM: {0}")]
    InvalidPem(String),

    /// The PEM payload was not a PKCS#8 private key structure.
    #[error("invalid private key structure: {0}")]
    InvalidKeyStructure(String),

    /// The PKCS#8 key uses an algorithm other than Ed25519.
    ///
    /// Carries the algorithm OID found in the key.
    #[error("key is not an Ed25519 key (algorithm {0})")]
    WrongKeyType(String),

    /// A key file exists but could not be read.
    #[error("could not read key file {path}: {source}")]
    KeyFile {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A declared signature component has no corresponding header value.
    ///
    /// Only headers outside the well-known set (`authorization`,
    /// `content-digest`, `content-length`, `content-type`) trigger this; the
    /// well-known ones resolve to an empty value when absent.
    #[error("missing required signature component: {0}")]
    MissingComponent(String),

    /// A header value could not be used in a signature base or HTTP request.
    #[error("invalid header value for {name}: {reason}")]
    InvalidHeaderValue {
        /// Header name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The request carries no `Signature-Input` header.
    #[error("missing Signature-Input header")]
    MissingSignatureInput,

    /// The request carries no `Signature` header.
    #[error("missing Signature header")]
    MissingSignature,

    /// The `Signature-Input` header could not be parsed.
    #[error("malformed Signature-Input: {0}")]
    MalformedSignatureInput(String),

    /// The signature did not verify.
    ///
    /// Deliberately carries no detail: signature mismatch, wrong length,
    /// undecodable bytes, and policy violations all produce this variant.
    #[error("invalid signature")]
    InvalidSignature,

    /// The server answered with a status the operation does not accept.
    ///
    /// # Recovery
    ///
    /// Inspect `status` and `message`. Continuation and cancellation handles
    /// are single-use, so a 4xx on those usually means the handle was already
    /// consumed; start a new grant instead of retrying.
    #[error("{operation} failed with status {status}: {message}")]
    Protocol {
        /// Operation that failed (e.g. `"grant request"`).
        operation: &'static str,
        /// HTTP status code returned by the server.
        status: u16,
        /// Server-provided message, or the canonical reason phrase.
        message: String,
    },

    /// The server answered successfully but the body did not have the
    /// expected shape.
    #[error("invalid server response: {0}")]
    InvalidResponse(String),

    /// HTTP request failed before a response was received.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The call was cancelled through its cancellation token.
    #[error("request cancelled")]
    Cancelled,

    /// A URL could not be parsed or is not acceptable for the operation.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Caller-supplied parameters were rejected before any I/O happened.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The request body exceeded the configured buffering limit.
    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge {
        /// Configured maximum body size.
        limit: usize,
    },

    /// A response body exceeded the transport's buffering limit.
    #[error("response body exceeds {limit} bytes")]
    ResponseTooLarge {
        /// Maximum response size.
        limit: usize,
    },

    /// A request body could not be read while buffering.
    #[error("failed to read request body: {0}")]
    BodyRead(#[source] std::io::Error),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration was rejected.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl GnapError {
    /// Returns `true` for the verification failures a verifier reports.
    #[must_use]
    pub const fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            Self::MissingSignatureInput
                | Self::MissingSignature
                | Self::MalformedSignatureInput(_)
                | Self::InvalidSignature
        )
    }

    /// Returns `true` for the key-material loading failures.
    #[must_use]
    pub const fn is_key_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidKeyEncoding(_)
                | Self::InvalidPem(_)
                | Self::InvalidKeyStructure(_)
                | Self::WrongKeyType(_)
                | Self::KeyFile { .. }
        )
    }

    /// Returns the HTTP status of a protocol error.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Protocol { status, .. } => Some(*status),
            _ => None,
        }
    }
}
