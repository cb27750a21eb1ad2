//! The authenticated client: one key, one wallet address, one pipeline.
//!
//! # Examples
//!
//! ```no_run
//! use gnap_signer::{AccessItem, AuthenticatedClient, GrantRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(key_pem_base64: &str) -> gnap_signer::error::Result<()> {
//! let client = AuthenticatedClient::builder(
//!     "https://wallet.example.com/alice",
//!     key_pem_base64,
//!     "alice-key-1",
//! )
//! .build()?;
//!
//! let request = GrantRequest::access_token([
//!     AccessItem::new("incoming-payment").actions(["create", "read"]),
//! ]);
//! let grant = client
//!     .grant()
//!     .request("https://auth.example.com/", &request, &CancellationToken::new())
//!     .await?;
//! assert!(grant.is_granted());
//! # Ok(())
//! # }
//! ```

use std::fmt;

use ed25519_dalek::VerifyingKey;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;
use zeroize::Zeroizing;

use crate::{
    config::ClientConfig,
    error::{GnapError, Result},
    grant::{GrantService, TokenService},
    httpsig::{RequestSigner, jwk::Jwk, key::load_private_key},
    pipeline::{DEFAULT_MAX_BODY_BYTES, RequestHook, SigningPipeline},
    transport::{HttpConfig, HttpRequest, HttpResponse, HttpTransport, RequestDoer},
};

/// A GNAP client identified by a wallet address and an Ed25519 key.
///
/// Cheap to share by reference; the grant and token services borrow it.
#[derive(Debug, Clone)]
pub struct AuthenticatedClient<D = HttpTransport> {
    wallet_address: String,
    pipeline: SigningPipeline<D>,
}

impl AuthenticatedClient<HttpTransport> {
    /// Starts building a client over the default reqwest transport.
    ///
    /// `key_material` is a path to a PEM file or the base64 encoding of the
    /// PEM document.
    #[must_use]
    pub fn builder(
        wallet_address: impl Into<String>,
        key_material: impl Into<String>,
        key_id: impl Into<String>,
    ) -> AuthenticatedClientBuilder<HttpTransport> {
        AuthenticatedClientBuilder {
            wallet_address: wallet_address.into(),
            key_material: Zeroizing::new(key_material.into()),
            key_id: key_id.into(),
            pre_sign: None,
            post_sign: None,
            transport: HttpTransport::new(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Builds a client from a validated [`ClientConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::Config`] for rejected configuration and the
    /// errors of [`AuthenticatedClientBuilder::build`].
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        Self::builder(&config.wallet_address, config.private_key.as_str(), &config.key_id)
            .http_config(&config.http)?
            .max_body_bytes(config.max_body_bytes)
            .build()
    }
}

impl<D: RequestDoer> AuthenticatedClient<D> {
    /// Returns the wallet address sent as `client` in grant requests.
    #[must_use]
    pub fn wallet_address(&self) -> &str {
        &self.wallet_address
    }

    /// Returns the key id placed in `keyid`.
    #[must_use]
    pub fn key_id(&self) -> &str {
        self.pipeline.signer().key_id()
    }

    /// Returns the public half of the signing key.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.pipeline.signer().verifying_key()
    }

    /// Returns the JWK a wallet publishes for this client's key.
    #[must_use]
    pub fn jwk(&self) -> Jwk {
        Jwk::from_verifying_key(&self.verifying_key(), self.key_id())
    }

    /// Returns the signing pipeline.
    #[must_use]
    pub const fn pipeline(&self) -> &SigningPipeline<D> {
        &self.pipeline
    }

    /// Grant lifecycle operations.
    #[must_use]
    pub fn grant(&self) -> GrantService<'_, D> {
        GrantService::new(&self.pipeline, &self.wallet_address)
    }

    /// Token management operations.
    #[must_use]
    pub const fn token(&self) -> TokenService<'_, D> {
        TokenService::new(&self.pipeline)
    }

    /// Signs and sends an arbitrary request.
    ///
    /// # Errors
    ///
    /// See [`SigningPipeline::send_signed`].
    pub async fn send_signed(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse> {
        self.pipeline.send_signed(request, cancel).await
    }

    /// Sends a request without a signature.
    ///
    /// # Errors
    ///
    /// See [`SigningPipeline::send_unsigned`].
    pub async fn send_unsigned(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse> {
        self.pipeline.send_unsigned(request, cancel).await
    }
}

/// Builder for [`AuthenticatedClient`].
pub struct AuthenticatedClientBuilder<D> {
    wallet_address: String,
    key_material: Zeroizing<String>,
    key_id: String,
    pre_sign: Option<RequestHook>,
    post_sign: Option<RequestHook>,
    transport: D,
    max_body_bytes: usize,
}

impl<D> fmt::Debug for AuthenticatedClientBuilder<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedClientBuilder")
            .field("wallet_address", &self.wallet_address)
            .field("key_material", &"<redacted>")
            .field("key_id", &self.key_id)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish_non_exhaustive()
    }
}

impl AuthenticatedClientBuilder<HttpTransport> {
    /// Replaces the default transport with one built from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::Config`] for out-of-range values and
    /// [`GnapError::Http`] if the client cannot be built.
    pub fn http_config(mut self, config: &HttpConfig) -> Result<Self> {
        self.transport = HttpTransport::with_config(config)?;
        Ok(self)
    }
}

impl<D> AuthenticatedClientBuilder<D> {
    /// Sets a hook run on every signed request before signing.
    #[must_use]
    pub fn pre_sign_hook(mut self, hook: impl Fn(&mut HttpRequest) + Send + Sync + 'static) -> Self {
        self.pre_sign = Some(std::sync::Arc::new(hook));
        self
    }

    /// Sets a hook run on every signed request after signing.
    #[must_use]
    pub fn post_sign_hook(mut self, hook: impl Fn(&mut HttpRequest) + Send + Sync + 'static) -> Self {
        self.post_sign = Some(std::sync::Arc::new(hook));
        self
    }

    /// Sets the body buffering limit. Must be non-zero.
    #[must_use]
    pub const fn max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Replaces the transport with any [`RequestDoer`].
    #[must_use]
    pub fn transport<T: RequestDoer>(self, transport: T) -> AuthenticatedClientBuilder<T> {
        AuthenticatedClientBuilder {
            wallet_address: self.wallet_address,
            key_material: self.key_material,
            key_id: self.key_id,
            pre_sign: self.pre_sign,
            post_sign: self.post_sign,
            transport,
            max_body_bytes: self.max_body_bytes,
        }
    }
}

impl<D: RequestDoer> AuthenticatedClientBuilder<D> {
    /// Validates the inputs, loads the key and builds the client.
    ///
    /// # Errors
    ///
    /// - [`GnapError::InvalidInput`] for an empty or `$`-prefixed wallet
    ///   address, an unusable key id, or a zero body limit
    /// - [`GnapError::InvalidUrl`] if the wallet address is not a URL
    /// - key-material errors from loading the private key
    #[instrument(skip(self), fields(wallet_address = %self.wallet_address, key_id = %self.key_id))]
    pub fn build(self) -> Result<AuthenticatedClient<D>> {
        let wallet_address = validate_wallet_address(&self.wallet_address)?;
        if self.max_body_bytes == 0 {
            return Err(GnapError::InvalidInput("max_body_bytes must be greater than 0".to_owned()));
        }

        let signing_key = load_private_key(&self.key_material)?;
        let signer = RequestSigner::new(signing_key, self.key_id)?;

        let mut pipeline =
            SigningPipeline::new(signer, self.transport).with_max_body_bytes(self.max_body_bytes);
        if let Some(hook) = self.pre_sign {
            pipeline = pipeline.with_pre_sign_hook(hook);
        }
        if let Some(hook) = self.post_sign {
            pipeline = pipeline.with_post_sign_hook(hook);
        }

        debug!("authenticated client ready");
        Ok(AuthenticatedClient { wallet_address, pipeline })
    }
}

/// Checks a wallet address and returns it trimmed.
///
/// Payment pointers (`$wallet.example.com/alice`) must be resolved to their
/// `https://` form by the caller first.
pub(crate) fn validate_wallet_address(wallet_address: &str) -> Result<String> {
    let wallet_address = wallet_address.trim();
    if wallet_address.is_empty() {
        return Err(GnapError::InvalidInput("missing wallet address".to_owned()));
    }
    if wallet_address.starts_with('$') {
        return Err(GnapError::InvalidInput(format!(
            "wallet address {wallet_address} is a payment pointer; use its https URL"
        )));
    }
    Url::parse(wallet_address)
        .map_err(|e| GnapError::InvalidUrl(format!("wallet address {wallet_address}: {e}")))?;
    Ok(wallet_address.to_owned())
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::SigningKey;

    use super::*;
    use crate::httpsig::key::encode_private_key_base64;

    fn key_material() -> String {
        let key = SigningKey::from_bytes(&[11u8; 32]);
        encode_private_key_base64(&key).unwrap().to_string()
    }

    #[test]
    fn test_validate_wallet_address() {
        assert_eq!(
            validate_wallet_address(" https://wallet.example.com/alice ").unwrap(),
            "https://wallet.example.com/alice"
        );
        assert!(matches!(validate_wallet_address(""), Err(GnapError::InvalidInput(_))));
        assert!(matches!(
            validate_wallet_address("$wallet.example.com/alice"),
            Err(GnapError::InvalidInput(_))
        ));
        assert!(matches!(validate_wallet_address("not a url"), Err(GnapError::InvalidUrl(_))));
    }

    #[test]
    fn test_build_client() {
        let client = AuthenticatedClient::builder("https://wallet.example.com/alice", key_material(), "k1")
            .build()
            .unwrap();

        assert_eq!(client.wallet_address(), "https://wallet.example.com/alice");
        assert_eq!(client.key_id(), "k1");
        assert_eq!(client.verifying_key(), SigningKey::from_bytes(&[11u8; 32]).verifying_key());
        assert_eq!(client.jwk().kid, "k1");
    }

    #[test]
    fn test_build_rejects_bad_inputs() {
        let pointer = AuthenticatedClient::builder("$wallet.example.com/alice", key_material(), "k1").build();
        assert!(matches!(pointer, Err(GnapError::InvalidInput(_))));

        let key = AuthenticatedClient::builder("https://wallet.example.com/alice", "%%%", "k1").build();
        assert!(key.unwrap_err().is_key_error());

        let key_id = AuthenticatedClient::builder("https://wallet.example.com/alice", key_material(), "").build();
        assert!(matches!(key_id, Err(GnapError::InvalidInput(_))));

        let limit = AuthenticatedClient::builder("https://wallet.example.com/alice", key_material(), "k1")
            .max_body_bytes(0)
            .build();
        assert!(matches!(limit, Err(GnapError::InvalidInput(_))));
    }

    #[test]
    fn test_http_config_is_validated() {
        let config = HttpConfig { timeout_secs: 0, ..HttpConfig::default() };
        let result = AuthenticatedClient::builder("https://wallet.example.com/alice", key_material(), "k1")
            .http_config(&config);
        assert!(matches!(result, Err(GnapError::Config(_))));
    }
}
