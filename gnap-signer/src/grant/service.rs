//! Grant lifecycle operations: request, continue, cancel.

use reqwest::{Method, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::{
    model::{Continuation, Grant, GrantRequest, GrantRequestBody, GrantResponse},
    protocol_error, require_non_empty,
};
use crate::{
    error::{GnapError, Result},
    pipeline::SigningPipeline,
    transport::{HttpRequest, RequestDoer},
};

/// Drives grants against an authorization server.
///
/// Borrowed from an [`AuthenticatedClient`](crate::AuthenticatedClient);
/// every request is signed with the client's key and identifies the client
/// by its wallet address.
#[derive(Debug)]
pub struct GrantService<'a, D> {
    pipeline: &'a SigningPipeline<D>,
    client: &'a str,
}

impl<'a, D: RequestDoer> GrantService<'a, D> {
    /// Creates a grant service over a signing pipeline.
    #[must_use]
    pub const fn new(pipeline: &'a SigningPipeline<D>, client: &'a str) -> Self {
        Self { pipeline, client }
    }

    /// Requests a grant.
    ///
    /// # Errors
    ///
    /// - [`GnapError::InvalidInput`] for an empty URL or access list
    /// - [`GnapError::Protocol`] for any status other than 200
    /// - [`GnapError::InvalidResponse`] if the body is not a grant
    /// - transport and signing errors
    #[instrument(skip(self, request, cancel), fields(url = auth_server_url))]
    pub async fn request(
        &self,
        auth_server_url: &str,
        request: &GrantRequest,
        cancel: &CancellationToken,
    ) -> Result<Grant> {
        require_non_empty("auth server url", auth_server_url)?;
        if request.access_token.access.is_empty() {
            return Err(GnapError::InvalidInput("grant request has no access items".to_owned()));
        }

        let body = GrantRequestBody {
            access_token: &request.access_token,
            client: self.client,
            interact: request.interact.as_ref(),
        };
        let http_request = HttpRequest::new(Method::POST, auth_server_url)?.with_json(&body)?;

        let grant = Grant::try_from(self.send_for_grant("grant request", http_request, cancel).await?)?;
        debug!(interactive = grant.is_interactive(), "grant received");
        Ok(grant)
    }

    /// Continues a grant, optionally with the interaction reference the
    /// user was redirected back with.
    ///
    /// The handle is borrowed so the caller can poll again after `wait`. A
    /// response carrying only a new `continue` member comes back as
    /// [`Grant::Pending`]; poll with its handle, not the old one.
    ///
    /// # Errors
    ///
    /// - [`GnapError::InvalidInput`] for an empty URI/token or a URI without
    ///   `continue/`
    /// - [`GnapError::Protocol`] for any status other than 200
    /// - [`GnapError::InvalidResponse`] if the body is not a grant
    #[instrument(skip(self, continuation, interact_ref, cancel), fields(url = %continuation.uri))]
    pub async fn continue_grant(
        &self,
        continuation: &Continuation,
        interact_ref: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Grant> {
        validate_continuation(continuation)?;

        let body = match interact_ref {
            Some(interact_ref) if !interact_ref.is_empty() => {
                serde_json::json!({ "interact_ref": interact_ref })
            }
            _ => serde_json::json!({}),
        };
        let request = HttpRequest::new(Method::POST, &continuation.uri)?
            .with_gnap_token(&continuation.access_token)?
            .with_json(&body)?;

        let grant = self.send_for_grant("grant continuation", request, cancel).await?;
        grant.into_continued_grant()
    }

    /// Cancels a grant. The handle is consumed.
    ///
    /// # Errors
    ///
    /// - [`GnapError::InvalidInput`] for an empty URI or token
    /// - [`GnapError::Protocol`] for any status other than 204, including a
    ///   second cancellation of the same grant
    #[instrument(skip(self, continuation, cancel), fields(url = %continuation.uri))]
    pub async fn cancel(&self, continuation: Continuation, cancel: &CancellationToken) -> Result<()> {
        require_non_empty("continuation uri", &continuation.uri)?;
        require_non_empty("continuation token", &continuation.access_token)?;

        let request = HttpRequest::new(Method::DELETE, &continuation.uri)?
            .with_gnap_token(&continuation.access_token)?;
        let response = self.pipeline.send_signed(request, cancel).await?;
        if response.status != StatusCode::NO_CONTENT {
            return Err(protocol_error("grant cancel", &response));
        }
        debug!("grant cancelled");
        Ok(())
    }

    async fn send_for_grant(
        &self,
        operation: &'static str,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<GrantResponse> {
        let response = self.pipeline.send_signed(request, cancel).await?;
        if response.status != StatusCode::OK {
            return Err(protocol_error(operation, &response));
        }
        response.json().map_err(|e| GnapError::InvalidResponse(format!("{operation}: {e}")))
    }
}

fn validate_continuation(continuation: &Continuation) -> Result<()> {
    require_non_empty("continuation uri", &continuation.uri)?;
    require_non_empty("continuation token", &continuation.access_token)?;
    if !continuation.uri.contains("continue/") {
        return Err(GnapError::InvalidInput(format!(
            "invalid continuation URL: {}",
            continuation.uri
        )));
    }
    Ok(())
}
