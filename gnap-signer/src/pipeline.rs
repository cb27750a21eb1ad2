//! The outbound signing pipeline.
//!
//! Every authenticated request goes through the same steps, in order:
//!
//! 1. pre-sign hook
//! 2. body buffering (bounded), `Content-Length` and `Content-Digest`
//! 3. `Signature` / `Signature-Input`
//! 4. post-sign hook
//! 5. dispatch through the [`RequestDoer`]
//!
//! Unsigned requests skip steps 1, 3 and 4 but are buffered the same way.

use std::{fmt, sync::Arc};

use reqwest::header::{ACCEPT, CONTENT_LENGTH, HeaderValue};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::{
    error::{GnapError, Result},
    httpsig::{CONTENT_DIGEST, RequestSigner, RequestView, content_digest},
    transport::{HttpRequest, HttpResponse, RequestBody, RequestDoer},
};

/// Default upper bound for buffered request bodies (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// A request rewrite hook run before or after signing.
pub type RequestHook = Arc<dyn Fn(&mut HttpRequest) + Send + Sync>;

/// Signs and dispatches requests through a [`RequestDoer`].
#[derive(Clone)]
pub struct SigningPipeline<D> {
    signer: RequestSigner,
    doer: D,
    pre_sign: Option<RequestHook>,
    post_sign: Option<RequestHook>,
    max_body_bytes: usize,
}

impl<D> fmt::Debug for SigningPipeline<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningPipeline")
            .field("signer", &self.signer)
            .field("pre_sign", &self.pre_sign.is_some())
            .field("post_sign", &self.post_sign.is_some())
            .field("max_body_bytes", &self.max_body_bytes)
            .finish_non_exhaustive()
    }
}

impl<D: RequestDoer> SigningPipeline<D> {
    /// Creates a pipeline without hooks and with the default body limit.
    #[must_use]
    pub fn new(signer: RequestSigner, doer: D) -> Self {
        Self { signer, doer, pre_sign: None, post_sign: None, max_body_bytes: DEFAULT_MAX_BODY_BYTES }
    }

    /// Sets the hook run before the body is buffered and the request signed.
    #[must_use]
    pub fn with_pre_sign_hook(mut self, hook: RequestHook) -> Self {
        self.pre_sign = Some(hook);
        self
    }

    /// Sets the hook run after signing, right before dispatch.
    ///
    /// Changes made here to signed components invalidate the signature.
    #[must_use]
    pub fn with_post_sign_hook(mut self, hook: RequestHook) -> Self {
        self.post_sign = Some(hook);
        self
    }

    /// Sets the body buffering limit.
    #[must_use]
    pub const fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Returns the signer.
    #[must_use]
    pub const fn signer(&self) -> &RequestSigner {
        &self.signer
    }

    /// Returns the underlying request doer.
    #[must_use]
    pub const fn doer(&self) -> &D {
        &self.doer
    }

    /// Runs every step except dispatch and returns the request as it would
    /// be sent.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::BodyTooLarge`] / [`GnapError::BodyRead`] from
    /// buffering, [`GnapError::Cancelled`] if `cancel` fires while the body is
    /// read, and construction errors from signing.
    pub async fn prepare_signed(
        &self,
        mut request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpRequest> {
        if let Some(hook) = &self.pre_sign {
            hook(&mut request);
        }

        self.buffer_body(&mut request, cancel).await?;
        let body = request.body_bytes();
        if !body.is_empty() {
            let digest = content_digest(body);
            let length = HeaderValue::from(body.len());
            request.headers.insert(CONTENT_LENGTH, length);
            request.headers.insert(
                CONTENT_DIGEST,
                HeaderValue::from_str(&digest).map_err(|e| GnapError::InvalidHeaderValue {
                    name: CONTENT_DIGEST.to_string(),
                    reason: e.to_string(),
                })?,
            );
        }
        set_default_accept(&mut request);

        let view = RequestView::new(
            &request.method,
            &request.url,
            &request.headers,
            request.body_bytes(),
        );
        let signature = self.signer.sign(&view)?;
        signature.apply(&mut request.headers)?;

        if let Some(hook) = &self.post_sign {
            hook(&mut request);
        }
        Ok(request)
    }

    /// Signs and sends a request.
    ///
    /// Non-success statuses are returned as responses.
    ///
    /// # Errors
    ///
    /// Returns preparation errors (see [`SigningPipeline::prepare_signed`])
    /// and transport errors, including [`GnapError::Cancelled`].
    #[instrument(skip(self, request, cancel), fields(method = %request.method, url = %request.url))]
    pub async fn send_signed(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse> {
        if cancel.is_cancelled() {
            return Err(GnapError::Cancelled);
        }
        let request = self.prepare_signed(request, cancel).await?;
        let response = self.doer.execute(request, cancel).await?;
        log_status(&response);
        Ok(response)
    }

    /// Sends a request without signing it.
    ///
    /// # Errors
    ///
    /// Returns buffering errors and transport errors.
    #[instrument(skip(self, request, cancel), fields(method = %request.method, url = %request.url))]
    pub async fn send_unsigned(
        &self,
        mut request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse> {
        if cancel.is_cancelled() {
            return Err(GnapError::Cancelled);
        }
        self.buffer_body(&mut request, cancel).await?;
        set_default_accept(&mut request);
        let response = self.doer.execute(request, cancel).await?;
        log_status(&response);
        Ok(response)
    }

    async fn buffer_body(
        &self,
        request: &mut HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if let Some(body) = request.body.take() {
            let bytes = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(GnapError::Cancelled),
                bytes = body.into_bytes(self.max_body_bytes) => bytes?,
            };
            request.body = Some(RequestBody::Bytes(bytes));
        }
        Ok(())
    }
}

fn set_default_accept(request: &mut HttpRequest) {
    request.headers.entry(ACCEPT).or_insert(HeaderValue::from_static("application/json"));
}

fn log_status(response: &HttpResponse) {
    if response.status.is_success() {
        debug!(status = response.status.as_u16(), "request completed");
    } else {
        warn!(status = response.status.as_u16(), "request returned non-success status");
    }
}
