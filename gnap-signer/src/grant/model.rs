//! Grant request and response types.
//!
//! Request types are built by the caller and serialized into the grant
//! request body. Response types come back from the authorization server and
//! are classified into a [`Grant`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GnapError, Result};

/// One requested (or granted) access right.
///
/// `limits` is passed through untouched; its meaning belongs to the resource
/// server.
///
/// # Examples
///
/// ```
/// use gnap_signer::grant::AccessItem;
///
/// let item = AccessItem::new("incoming-payment").actions(["create", "read"]);
/// let json = serde_json::to_string(&item).unwrap();
/// assert_eq!(json, r#"{"type":"incoming-payment","actions":["create","read"]}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessItem {
    /// Resource type, e.g. `incoming-payment`.
    #[serde(rename = "type")]
    pub access_type: String,
    /// Allowed actions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    /// Resource identifier the access is restricted to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// Opaque resource-specific limits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<serde_json::Value>,
}

impl AccessItem {
    /// Creates an access item for a resource type.
    #[must_use]
    pub fn new(access_type: impl Into<String>) -> Self {
        Self { access_type: access_type.into(), actions: Vec::new(), identifier: None, limits: None }
    }

    /// Sets the allowed actions.
    #[must_use]
    pub fn actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions = actions.into_iter().map(Into::into).collect();
        self
    }

    /// Restricts access to one resource.
    #[must_use]
    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Attaches resource-specific limits.
    #[must_use]
    pub fn limits(mut self, limits: serde_json::Value) -> Self {
        self.limits = Some(limits);
        self
    }
}

/// The `access_token` member of a grant request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessTokenRequest {
    /// Requested access rights.
    pub access: Vec<AccessItem>,
}

/// How the client finishes an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractFinish {
    /// Finish method; always `redirect` here.
    pub method: String,
    /// Where the authorization server sends the user back.
    pub uri: String,
    /// Client nonce for the interaction hash.
    pub nonce: String,
}

/// The `interact` member of a grant request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractRequest {
    /// Interaction start modes.
    pub start: Vec<String>,
    /// Finish method, if the client can receive the user back.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish: Option<InteractFinish>,
}

impl InteractRequest {
    /// Interaction started by redirecting the user.
    #[must_use]
    pub fn redirect() -> Self {
        Self { start: vec!["redirect".to_owned()], finish: None }
    }

    /// Adds a redirect finish with the client's return URI and nonce.
    #[must_use]
    pub fn finish_redirect(mut self, uri: impl Into<String>, nonce: impl Into<String>) -> Self {
        self.finish =
            Some(InteractFinish { method: "redirect".to_owned(), uri: uri.into(), nonce: nonce.into() });
        self
    }
}

/// A grant request, minus the `client` member which the service fills in.
///
/// # Examples
///
/// ```
/// use gnap_signer::grant::{AccessItem, GrantRequest, InteractRequest};
///
/// let request = GrantRequest::access_token([AccessItem::new("quote").actions(["create"])])
///     .with_interact(
///         InteractRequest::redirect().finish_redirect("https://app.example.com/done", "n-1"),
///     );
/// assert!(request.interact.is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrantRequest {
    /// Requested access token.
    pub access_token: AccessTokenRequest,
    /// Interaction the client can perform.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interact: Option<InteractRequest>,
}

impl GrantRequest {
    /// Requests an access token for `access`.
    #[must_use]
    pub fn access_token(access: impl IntoIterator<Item = AccessItem>) -> Self {
        Self { access_token: AccessTokenRequest { access: access.into_iter().collect() }, interact: None }
    }

    /// Adds an interaction request.
    #[must_use]
    pub fn with_interact(mut self, interact: InteractRequest) -> Self {
        self.interact = Some(interact);
        self
    }
}

/// Wire form of a grant request.
#[derive(Serialize)]
pub(crate) struct GrantRequestBody<'a> {
    pub(crate) access_token: &'a AccessTokenRequest,
    pub(crate) client: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) interact: Option<&'a InteractRequest>,
}

/// Interaction the user must complete before the grant is issued.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InteractResponse {
    /// URL to send the user to.
    pub redirect: String,
    /// Server nonce for verifying the interaction hash; only present when
    /// the request asked for a finish redirect.
    #[serde(default)]
    pub finish: Option<String>,
}

/// The handle for continuing or cancelling a grant.
///
/// Single-use for cancellation; not `Clone` so a consumed handle cannot be
/// reused by accident.
#[derive(PartialEq, Eq)]
pub struct Continuation {
    /// Continuation URI.
    pub uri: String,
    /// Continuation access token.
    pub access_token: String,
    /// Seconds to wait before continuing, if the server asked for it.
    pub wait: Option<u64>,
}

impl Continuation {
    /// Creates a handle from a stored URI and token.
    #[must_use]
    pub fn new(uri: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self { uri: uri.into(), access_token: access_token.into(), wait: None }
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("uri", &self.uri)
            .field("access_token", &"<redacted>")
            .field("wait", &self.wait)
            .finish()
    }
}

/// An issued access token.
///
/// Not `Clone`: rotation and revocation consume it.
#[derive(PartialEq, Deserialize)]
pub struct AccessToken {
    /// Token value sent as `Authorization: GNAP <value>`.
    pub value: String,
    /// Token management URI.
    pub manage: String,
    /// Lifetime in seconds, if limited.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Rights the token grants.
    #[serde(default)]
    pub access: Vec<AccessItem>,
}

impl AccessToken {
    /// Creates a token handle from a stored value and management URI.
    #[must_use]
    pub fn new(value: impl Into<String>, manage: impl Into<String>) -> Self {
        Self { value: value.into(), manage: manage.into(), expires_in: None, access: Vec::new() }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("manage", &self.manage)
            .field("expires_in", &self.expires_in)
            .field("access", &self.access)
            .finish()
    }
}

/// Wire form of the continuation handle.
#[derive(Deserialize)]
struct ContinueResponse {
    uri: String,
    access_token: ContinueToken,
    #[serde(default)]
    wait: Option<u64>,
}

#[derive(Deserialize)]
struct ContinueToken {
    value: String,
}

/// Wire form of a grant response.
#[derive(Deserialize)]
pub(crate) struct GrantResponse {
    #[serde(default)]
    interact: Option<InteractResponse>,
    #[serde(default)]
    access_token: Option<AccessToken>,
    #[serde(rename = "continue", default)]
    continuation: Option<ContinueResponse>,
}

/// Wire form of a token rotation response.
#[derive(Deserialize)]
pub(crate) struct RotateResponse {
    #[serde(default)]
    pub(crate) access_token: Option<AccessToken>,
}

/// The outcome of a grant request or continuation.
///
/// Always carries a [`Continuation`]. [`Grant::Pending`] only comes back from
/// a continuation.
#[derive(Debug)]
pub enum Grant {
    /// The user must interact before the token is issued.
    Interactive {
        /// Where to send the user.
        interact: InteractResponse,
        /// Handle for continuing after the interaction.
        continuation: Continuation,
    },
    /// The token was issued.
    Granted {
        /// The issued token.
        access_token: AccessToken,
        /// Handle for cancelling the grant.
        continuation: Continuation,
    },
    /// The server is still deciding; poll again after `continuation.wait`.
    Pending {
        /// Handle for the next poll, usually with a rotated token.
        continuation: Continuation,
    },
}

impl Grant {
    /// Returns `true` if the user must interact.
    #[must_use]
    pub const fn is_interactive(&self) -> bool {
        matches!(self, Self::Interactive { .. })
    }

    /// Returns `true` if a token was issued.
    #[must_use]
    pub const fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }

    /// Returns `true` if the server has not decided yet.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    /// Returns the continuation handle.
    #[must_use]
    pub const fn continuation(&self) -> &Continuation {
        match self {
            Self::Interactive { continuation, .. }
            | Self::Granted { continuation, .. }
            | Self::Pending { continuation } => continuation,
        }
    }

    /// Returns the interaction, if any.
    #[must_use]
    pub const fn interact(&self) -> Option<&InteractResponse> {
        match self {
            Self::Interactive { interact, .. } => Some(interact),
            Self::Granted { .. } | Self::Pending { .. } => None,
        }
    }

    /// Returns the issued token, if any.
    #[must_use]
    pub const fn access_token(&self) -> Option<&AccessToken> {
        match self {
            Self::Granted { access_token, .. } => Some(access_token),
            Self::Interactive { .. } | Self::Pending { .. } => None,
        }
    }

    /// Consumes the grant, returning the continuation handle.
    #[must_use]
    pub fn into_continuation(self) -> Continuation {
        match self {
            Self::Interactive { continuation, .. }
            | Self::Granted { continuation, .. }
            | Self::Pending { continuation } => continuation,
        }
    }
}

impl GrantResponse {
    /// Classifies a continuation response, where a bare `continue` member
    /// means the grant is still pending.
    pub(crate) fn into_continued_grant(self) -> Result<Grant> {
        if self.interact.is_none() && self.access_token.is_none() {
            return Ok(Grant::Pending { continuation: self.into_continuation()? });
        }
        Grant::try_from(self)
    }

    fn into_continuation(self) -> Result<Continuation> {
        self.continuation
            .map(|c| Continuation { uri: c.uri, access_token: c.access_token.value, wait: c.wait })
            .ok_or_else(|| GnapError::InvalidResponse("grant has no continue handle".to_owned()))
    }
}

impl TryFrom<GrantResponse> for Grant {
    type Error = GnapError;

    fn try_from(mut response: GrantResponse) -> Result<Self> {
        let interact = response.interact.take();
        let access_token = response.access_token.take();
        let continuation = response.into_continuation()?;

        match (interact, access_token) {
            (Some(interact), None) => Ok(Self::Interactive { interact, continuation }),
            (None, Some(access_token)) => Ok(Self::Granted { access_token, continuation }),
            (Some(_), Some(_)) => Err(GnapError::InvalidResponse(
                "grant has both interact and access_token".to_owned(),
            )),
            (None, None) => Err(GnapError::InvalidResponse(
                "grant has neither interact nor access_token".to_owned(),
            )),
        }
    }
}
