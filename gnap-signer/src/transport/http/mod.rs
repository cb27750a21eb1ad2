//! The reqwest-backed [`RequestDoer`].

use std::sync::LazyLock;

use reqwest::{Client, Url};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::config::{HttpConfig, HttpVersion};
use crate::{
    error::{GnapError, Result},
    pipeline::DEFAULT_MAX_BODY_BYTES,
    transport::{HttpRequest, HttpResponse, RequestDoer},
};

/// Shared client behind every [`HttpTransport::new`], so default transports
/// share one connection pool.
static DEFAULT_HTTP_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    build_client(&HttpConfig::default()).expect("default reqwest client settings are valid")
});

fn build_client(config: &HttpConfig) -> reqwest::Result<Client> {
    let builder = Client::builder()
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout());

    match config.http_version {
        HttpVersion::Http1 => builder.http1_only(),
        HttpVersion::Http2 => builder.http2_prior_knowledge(),
        HttpVersion::Auto => builder,
    }
    .build()
}

/// Validates the URL scheme and host.
///
/// Only HTTPS is accepted unless `allow_insecure_http` is set.
fn validate_url(url: &Url, allow_insecure_http: bool) -> Result<()> {
    match url.scheme() {
        "https" => {}
        "http" if allow_insecure_http => {}
        "http" => {
            return Err(GnapError::InvalidUrl(format!(
                "{url}: plain HTTP is disabled (set allow_insecure_http)"
            )));
        }
        scheme => {
            return Err(GnapError::InvalidUrl(format!("{url}: unsupported scheme {scheme}")));
        }
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(GnapError::InvalidUrl(format!("{url}: missing host")));
    }
    Ok(())
}

/// Sends [`HttpRequest`]s with reqwest.
///
/// HTTPS only unless [`HttpConfig::allow_insecure_http`] is set. Reader
/// bodies that reach the transport unbuffered are read up to 1 MiB, and
/// response bodies are capped at the same size by default.
///
/// # Examples
///
/// ```
/// use gnap_signer::transport::{HttpConfig, HttpTransport, HttpVersion};
///
/// let config = HttpConfig {
///     pool_max_idle_per_host: 20,
///     timeout_secs: 60,
///     connect_timeout_secs: 15,
///     http_version: HttpVersion::Http2,
///     allow_insecure_http: false,
/// };
///
/// let transport = HttpTransport::with_config(&config).unwrap();
/// assert_eq!(transport.protocol_name(), "http/2");
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    http_version: HttpVersion,
    allow_insecure_http: bool,
    max_response_bytes: usize,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport {
    /// Transport over the shared default client: 100 idle connections per
    /// host, 30 s request and 10 s connect timeouts, HTTPS only.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: DEFAULT_HTTP_CLIENT.clone(),
            http_version: HttpVersion::Auto,
            allow_insecure_http: false,
            max_response_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Transport over a dedicated client built from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::Config`] if the configuration is out of bounds and
    /// [`GnapError::Http`] if reqwest rejects the settings.
    pub fn with_config(config: &HttpConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client: build_client(config)?,
            http_version: config.http_version,
            allow_insecure_http: config.allow_insecure_http,
            max_response_bytes: DEFAULT_MAX_BODY_BYTES,
        })
    }

    /// Sets the response body limit.
    #[must_use]
    pub const fn with_max_response_bytes(mut self, max_response_bytes: usize) -> Self {
        self.max_response_bytes = max_response_bytes;
        self
    }

    /// Protocol label recorded on request spans.
    #[must_use]
    pub const fn protocol_name(&self) -> &'static str {
        match self.http_version {
            HttpVersion::Http1 => "http/1.1",
            HttpVersion::Http2 => "http/2",
            HttpVersion::Auto => "http",
        }
    }

    #[instrument(
        skip(self, request),
        fields(method = %request.method, url = %request.url, protocol = self.protocol_name())
    )]
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        validate_url(&request.url, self.allow_insecure_http)?;

        let HttpRequest { method, url, headers, body } = request;
        let mut builder = self.client.request(method, url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body.into_bytes(DEFAULT_MAX_BODY_BYTES).await?);
        }

        let mut response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = self.read_capped(&mut response).await?;

        debug!(status = status.as_u16(), body_len = body.len(), "response received");
        Ok(HttpResponse { status, headers, body })
    }

    async fn read_capped(&self, response: &mut reqwest::Response) -> Result<Vec<u8>> {
        let limit = self.max_response_bytes;
        let declared_limit = u64::try_from(limit).unwrap_or(u64::MAX);
        if response.content_length().is_some_and(|len| len > declared_limit) {
            return Err(GnapError::ResponseTooLarge { limit });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > limit {
                return Err(GnapError::ResponseTooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

impl RequestDoer for HttpTransport {
    async fn execute<'a>(
        &'a self,
        request: HttpRequest,
        cancel: &'a CancellationToken,
    ) -> Result<HttpResponse> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(GnapError::Cancelled),
            result = self.send(request) => result,
        }
    }
}
