//! Request/response types and the transport abstraction.
//!
//! Everything that talks to the network goes through [`RequestDoer`]: the
//! signing pipeline hands it finished requests, and resource clients built on
//! top of this crate receive it as their "do request" capability. The
//! reqwest-backed [`HttpTransport`] is the production implementation; tests
//! substitute recording doubles.
//!
//! # Examples
//!
//! ```rust,no_run
//! use gnap_signer::transport::{HttpRequest, HttpTransport, RequestDoer};
//! use reqwest::Method;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> gnap_signer::error::Result<()> {
//! let transport = HttpTransport::new();
//! let request = HttpRequest::new(Method::GET, "https://wallet.example.com/alice")?;
//!
//! let response = transport.execute(request, &CancellationToken::new()).await?;
//! let document: serde_json::Value = response.json()?;
//! println!("{document}");
//! # Ok(())
//! # }
//! ```

use std::fmt;

#[allow(
    redundant_imports,
    reason = "Future needed for RPITIT despite being in Edition 2024 prelude"
)]
use std::future::Future;

use reqwest::{
    Method, StatusCode, Url,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

use crate::error::{GnapError, Result};

pub mod config;
pub mod http;

pub use config::{HttpConfig, HttpVersion};
pub use http::HttpTransport;

/// Body of an outbound request.
pub enum RequestBody {
    /// Bytes already in memory.
    Bytes(Vec<u8>),
    /// A stream read to completion before sending.
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

impl RequestBody {
    /// Reads the body into memory, failing if it exceeds `limit` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::BodyTooLarge`] past the limit and
    /// [`GnapError::BodyRead`] if the stream fails.
    pub async fn into_bytes(self, limit: usize) -> Result<Vec<u8>> {
        let bytes = match self {
            Self::Bytes(bytes) => bytes,
            Self::Reader(reader) => {
                // one byte past the limit distinguishes "exactly full" from "too large"
                let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
                let mut buffer = Vec::new();
                reader.take(cap).read_to_end(&mut buffer).await.map_err(GnapError::BodyRead)?;
                buffer
            }
        };
        if bytes.len() > limit {
            return Err(GnapError::BodyTooLarge { limit });
        }
        Ok(bytes)
    }
}

/// An outbound HTTP request.
#[derive(Debug)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Absolute request URL.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body, if any.
    pub body: Option<RequestBody>,
}

impl HttpRequest {
    /// Creates a request without headers or body.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::InvalidUrl`] if `url` is not an absolute URL.
    pub fn new(method: Method, url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| GnapError::InvalidUrl(format!("{url}: {e}")))?;
        Ok(Self::from_url(method, url))
    }

    /// Creates a request for an already parsed URL.
    #[must_use]
    pub fn from_url(method: Method, url: Url) -> Self {
        Self { method, url, headers: HeaderMap::new(), body: None }
    }

    /// Sets a header, replacing earlier values.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::InvalidHeaderValue`] if the name or value is not
    /// legal in an HTTP header (control characters included).
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            GnapError::InvalidHeaderValue { name: name.to_owned(), reason: e.to_string() }
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| {
            GnapError::InvalidHeaderValue { name: name.to_owned(), reason: e.to_string() }
        })?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    /// Sets `Authorization: GNAP <token>`.
    ///
    /// The value is marked sensitive so it is redacted from `Debug` output.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::InvalidHeaderValue`] if the token contains
    /// characters not allowed in a header.
    pub fn with_gnap_token(mut self, token: &str) -> Result<Self> {
        let mut value = HeaderValue::from_str(&format!("GNAP {token}")).map_err(|e| {
            GnapError::InvalidHeaderValue { name: "authorization".to_owned(), reason: e.to_string() }
        })?;
        value.set_sensitive(true);
        self.headers.insert(reqwest::header::AUTHORIZATION, value);
        Ok(self)
    }

    /// Sets an in-memory body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(RequestBody::Bytes(body.into()));
        self
    }

    /// Sets a streaming body, buffered before the request is signed or sent.
    #[must_use]
    pub fn with_reader(mut self, reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        self.body = Some(RequestBody::Reader(Box::new(reader)));
        self
    }

    /// Serializes `value` as the JSON body and sets `Content-Type`.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::Json`] if serialization fails.
    pub fn with_json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value)?;
        self.headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.body = Some(RequestBody::Bytes(body));
        Ok(self)
    }

    /// Returns the in-memory body bytes, or an empty slice.
    ///
    /// Streaming bodies are not visible until buffered.
    #[must_use]
    pub fn body_bytes(&self) -> &[u8] {
        match &self.body {
            Some(RequestBody::Bytes(bytes)) => bytes,
            _ => &[],
        }
    }
}

/// A received HTTP response with a fully read body.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response; mostly useful for test doubles.
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self { status, headers: HeaderMap::new(), body: body.into() }
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::Json`] if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Returns the body as text, replacing invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Executes HTTP requests.
///
/// The single seam between this crate and the network. Implementations must
/// return [`GnapError::Cancelled`] when `cancel` fires before the response
/// is complete, and must not retry.
pub trait RequestDoer: Send + Sync {
    /// Sends `request` and reads the whole response.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::Http`] for transport failures and
    /// [`GnapError::Cancelled`] on cancellation. Non-success statuses are
    /// returned as responses, not errors.
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
        cancel: &'a CancellationToken,
    ) -> impl Future<Output = Result<HttpResponse>> + Send + 'a;
}

impl<D: RequestDoer> RequestDoer for std::sync::Arc<D> {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
        cancel: &'a CancellationToken,
    ) -> impl Future<Output = Result<HttpResponse>> + Send + 'a {
        (**self).execute(request, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builders() {
        let request = HttpRequest::new(Method::POST, "https://auth.example.com/")
            .unwrap()
            .with_header("x-request-id", "abc")
            .unwrap()
            .with_json(&serde_json::json!({"a": 1}))
            .unwrap();

        assert_eq!(request.headers["x-request-id"], "abc");
        assert_eq!(request.headers[reqwest::header::CONTENT_TYPE], "application/json");
        assert_eq!(request.body_bytes(), br#"{"a":1}"#);
    }

    #[test]
    fn test_request_rejects_bad_url_and_header() {
        assert!(matches!(HttpRequest::new(Method::GET, "not a url"), Err(GnapError::InvalidUrl(_))));

        let request = HttpRequest::new(Method::GET, "https://example.com/").unwrap();
        let result = request.with_header("x-test", "line\r\nbreak");
        assert!(matches!(result, Err(GnapError::InvalidHeaderValue { .. })));
    }

    #[test]
    fn test_gnap_token_is_sensitive() {
        let request = HttpRequest::new(Method::GET, "https://example.com/")
            .unwrap()
            .with_gnap_token("secret-token")
            .unwrap();

        let value = &request.headers[reqwest::header::AUTHORIZATION];
        assert_eq!(value, "GNAP secret-token");
        assert!(value.is_sensitive());
        assert!(!format!("{request:?}").contains("secret-token"));
    }

    #[tokio::test]
    async fn test_body_limit() {
        let body = RequestBody::Bytes(vec![0u8; 16]);
        assert_eq!(body.into_bytes(16).await.unwrap().len(), 16);

        let body = RequestBody::Bytes(vec![0u8; 17]);
        assert!(matches!(body.into_bytes(16).await, Err(GnapError::BodyTooLarge { limit: 16 })));
    }

    #[tokio::test]
    async fn test_reader_body_is_buffered_with_limit() {
        let body = RequestBody::Reader(Box::new(&b"streamed body"[..]));
        assert_eq!(body.into_bytes(64).await.unwrap(), b"streamed body");

        let body = RequestBody::Reader(Box::new(&b"streamed body"[..]));
        assert!(matches!(body.into_bytes(4).await, Err(GnapError::BodyTooLarge { limit: 4 })));
    }

    #[test]
    fn test_response_json() {
        let response = HttpResponse::new(StatusCode::OK, br#"{"value":"t"}"#.to_vec());
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["value"], "t");

        let response = HttpResponse::new(StatusCode::OK, b"not json".to_vec());
        assert!(matches!(response.json::<serde_json::Value>(), Err(GnapError::Json(_))));
        assert_eq!(response.text(), "not json");
    }
}
