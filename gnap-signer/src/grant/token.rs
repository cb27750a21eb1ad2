//! Access token management: rotate and revoke.

use reqwest::{Method, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::{
    model::{AccessToken, RotateResponse},
    protocol_error, require_non_empty,
};
use crate::{
    error::{GnapError, Result},
    pipeline::SigningPipeline,
    transport::{HttpRequest, RequestDoer},
};

/// Rotates and revokes access tokens through their management URI.
#[derive(Debug)]
pub struct TokenService<'a, D> {
    pipeline: &'a SigningPipeline<D>,
}

impl<'a, D: RequestDoer> TokenService<'a, D> {
    /// Creates a token service over a signing pipeline.
    #[must_use]
    pub const fn new(pipeline: &'a SigningPipeline<D>) -> Self {
        Self { pipeline }
    }

    /// Rotates `token`, returning its replacement.
    ///
    /// The old token is consumed; the server invalidates it and its
    /// management URI.
    ///
    /// # Errors
    ///
    /// - [`GnapError::InvalidInput`] for an empty URI/value or a URI without
    ///   `token/`
    /// - [`GnapError::Protocol`] for any status other than 200
    /// - [`GnapError::InvalidResponse`] if the body carries no token
    #[instrument(skip(self, token, cancel), fields(url = %token.manage))]
    pub async fn rotate(&self, token: AccessToken, cancel: &CancellationToken) -> Result<AccessToken> {
        require_non_empty("token management url", &token.manage)?;
        require_non_empty("access token", &token.value)?;
        if !token.manage.contains("token/") {
            return Err(GnapError::InvalidInput(format!("invalid token URL: {}", token.manage)));
        }

        let request = HttpRequest::new(Method::POST, &token.manage)?.with_gnap_token(&token.value)?;
        let response = self.pipeline.send_signed(request, cancel).await?;
        if response.status != StatusCode::OK {
            return Err(protocol_error("token rotation", &response));
        }

        let rotated = response
            .json::<RotateResponse>()
            .map_err(|e| GnapError::InvalidResponse(format!("token rotation: {e}")))?
            .access_token
            .ok_or_else(|| GnapError::InvalidResponse("rotation response has no access_token".to_owned()))?;
        debug!(manage = %rotated.manage, "token rotated");
        Ok(rotated)
    }

    /// Revokes `token`.
    ///
    /// # Errors
    ///
    /// - [`GnapError::InvalidInput`] for an empty URI or value
    /// - [`GnapError::Protocol`] for any status other than 204
    #[instrument(skip(self, token, cancel), fields(url = %token.manage))]
    pub async fn revoke(&self, token: AccessToken, cancel: &CancellationToken) -> Result<()> {
        require_non_empty("token management url", &token.manage)?;
        require_non_empty("access token", &token.value)?;

        let request = HttpRequest::new(Method::DELETE, &token.manage)?.with_gnap_token(&token.value)?;
        let response = self.pipeline.send_signed(request, cancel).await?;
        if response.status != StatusCode::NO_CONTENT {
            return Err(protocol_error("token revocation", &response));
        }
        debug!("token revoked");
        Ok(())
    }
}
