//! Signature base construction per RFC 9421 §2.5.
//!
//! The signature base is the exact byte string that is signed and verified.
//! Signer and verifier must produce identical bases from the same request,
//! so every component value is taken verbatim: a single extra space or a
//! different header value breaks verification.
//!
//! ```text
//! "@method": POST
//! "@target-uri": https://auth.example.com/
//! "content-digest": sha-512=:...:
//! "content-length": 52
//! "content-type": application/json
//! "@signature-params": ("@method" "@target-uri" "content-digest" "content-length" "content-type");created=1700000000;keyid="key-1";alg="ed25519"
//! ```

use std::fmt;

use reqwest::{Method, Url, header::HeaderMap};

use super::params::SignatureParams;
use crate::error::{GnapError, Result};

/// A covered component of an HTTP message signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Component {
    /// `@method`: the request method.
    Method,
    /// `@target-uri`: the full request URI.
    TargetUri,
    /// A header field, by lower-case name.
    Header(String),
}

impl Component {
    /// `authorization` header component.
    #[must_use]
    pub fn authorization() -> Self {
        Self::Header("authorization".to_owned())
    }

    /// `content-digest` header component.
    #[must_use]
    pub fn content_digest() -> Self {
        Self::Header("content-digest".to_owned())
    }

    /// `content-length` header component.
    #[must_use]
    pub fn content_length() -> Self {
        Self::Header("content-length".to_owned())
    }

    /// `content-type` header component.
    #[must_use]
    pub fn content_type() -> Self {
        Self::Header("content-type".to_owned())
    }

    /// Parses a component identifier (without quotes).
    ///
    /// Header names are normalized to lower case. Derived components other
    /// than `@method` and `@target-uri` are not supported.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::MalformedSignatureInput`] for empty names or
    /// unsupported derived components.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "@method" => Ok(Self::Method),
            "@target-uri" => Ok(Self::TargetUri),
            "" => Err(GnapError::MalformedSignatureInput("empty component name".to_owned())),
            derived if derived.starts_with('@') => Err(GnapError::MalformedSignatureInput(
                format!("unsupported derived component {derived}"),
            )),
            header => Ok(Self::Header(header.to_ascii_lowercase())),
        }
    }

    /// Returns the component identifier as it appears in the signature base.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Method => "@method",
            Self::TargetUri => "@target-uri",
            Self::Header(name) => name,
        }
    }

    /// Returns `true` for the header components that resolve to an empty value
    /// when absent instead of failing.
    fn is_well_known_header(&self) -> bool {
        matches!(
            self,
            Self::Header(name)
                if matches!(
                    name.as_str(),
                    "authorization" | "content-digest" | "content-length" | "content-type"
                )
        )
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read-only view of the parts of a request a signature covers.
#[derive(Debug, Clone, Copy)]
pub struct RequestView<'a> {
    /// Request method.
    pub method: &'a Method,
    /// Absolute request URL.
    pub url: &'a Url,
    /// Request headers as they will be sent.
    pub headers: &'a HeaderMap,
    /// Request body bytes as they will be sent (empty when there is none).
    pub body: &'a [u8],
}

impl<'a> RequestView<'a> {
    /// Creates a view over request parts.
    #[must_use]
    pub const fn new(
        method: &'a Method,
        url: &'a Url,
        headers: &'a HeaderMap,
        body: &'a [u8],
    ) -> Self {
        Self { method, url, headers, body }
    }

    /// Returns `true` if the request carries the named header.
    #[must_use]
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    /// Resolves the value of one component.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::MissingComponent`] for absent non-well-known
    /// headers and [`GnapError::InvalidHeaderValue`] for values that are not
    /// visible ASCII.
    pub fn component_value(&self, component: &Component) -> Result<String> {
        match component {
            Component::Method => Ok(self.method.as_str().to_owned()),
            Component::TargetUri => Ok(target_uri(self.url)),
            Component::Header(name) => {
                let mut values = Vec::new();
                for value in self.headers.get_all(name.as_str()) {
                    let value = value.to_str().map_err(|e| GnapError::InvalidHeaderValue {
                        name: name.clone(),
                        reason: e.to_string(),
                    })?;
                    values.push(value.trim());
                }

                if values.is_empty() && !component.is_well_known_header() {
                    return Err(GnapError::MissingComponent(name.clone()));
                }
                Ok(values.join(", "))
            }
        }
    }
}

/// Serializes a URL for the `@target-uri` component.
///
/// A serialization without a path gets a single trailing slash.
#[must_use]
pub fn target_uri(url: &Url) -> String {
    let mut serialized = url.as_str().to_owned();
    if url.path().is_empty() {
        serialized.push('/');
    }
    serialized
}

/// Builds the signature base for a request and signature parameters.
///
/// Lines appear in the order of `params.components`, each formatted as
/// `"<name>": <value>`, followed by the `"@signature-params"` line.
///
/// The result must never be logged or persisted; it exists only as input to
/// signing and verification.
///
/// # Errors
///
/// Returns a construction error if a component cannot be resolved (see
/// [`RequestView::component_value`]).
pub fn build_signature_base(request: &RequestView<'_>, params: &SignatureParams) -> Result<String> {
    build_base(request, &params.components, &params.serialize())
}

/// Builds a signature base whose `"@signature-params"` line is `params_line`
/// verbatim, as received in a `Signature-Input` member.
pub(crate) fn build_base(
    request: &RequestView<'_>,
    components: &[Component],
    params_line: &str,
) -> Result<String> {
    let mut base = String::new();
    for component in components {
        let value = request.component_value(component)?;
        base.push('"');
        base.push_str(component.name());
        base.push_str("\": ");
        base.push_str(&value);
        base.push('\n');
    }
    base.push_str("\"@signature-params\": ");
    base.push_str(params_line);
    Ok(base)
}
