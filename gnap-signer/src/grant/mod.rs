//! The GNAP grant state machine and token management.
//!
//! ```text
//! request ──► Interactive ──continue──► Granted
//!    │             │                       │
//!    └──► Granted  └────────cancel─────────┴──► Cancelled
//! ```
//!
//! Success statuses are fixed: 200 for request, continue and rotate; 204 for
//! cancel and revoke. Anything else becomes [`GnapError::Protocol`] carrying
//! the server's message. Nothing is retried.

mod model;
mod service;
mod token;

pub use model::{
    AccessItem, AccessToken, AccessTokenRequest, Continuation, Grant, GrantRequest,
    InteractFinish, InteractRequest, InteractResponse,
};
pub use service::GrantService;
pub use token::TokenService;

use crate::{
    error::{GnapError, Result},
    transport::HttpResponse,
};

/// Longest server text kept in a protocol error message.
const MAX_ERROR_MESSAGE_CHARS: usize = 256;

/// Builds a [`GnapError::Protocol`] from a rejected response.
///
/// The message is the GNAP `error.description`, else `error.code` (or a
/// bare string `error`), else the body text, else the reason phrase.
pub(crate) fn protocol_error(operation: &'static str, response: &HttpResponse) -> GnapError {
    let from_json = serde_json::from_slice::<serde_json::Value>(&response.body).ok().and_then(|body| {
        let error = body.get("error")?;
        error
            .get("description")
            .and_then(serde_json::Value::as_str)
            .or_else(|| error.get("code").and_then(serde_json::Value::as_str))
            .or_else(|| error.as_str())
            .map(str::to_owned)
    });

    let message = from_json
        .or_else(|| {
            let text = response.text();
            let text = text.trim();
            (!text.is_empty()).then(|| text.chars().take(MAX_ERROR_MESSAGE_CHARS).collect())
        })
        .unwrap_or_else(|| response.status.canonical_reason().unwrap_or("unknown status").to_owned());

    GnapError::Protocol { operation, status: response.status.as_u16(), message }
}

/// Rejects empty caller-supplied values before any I/O.
pub(crate) fn require_non_empty(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(GnapError::InvalidInput(format!("missing {what}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::*;

    #[test]
    fn test_protocol_error_prefers_description() {
        let response = HttpResponse::new(
            StatusCode::BAD_REQUEST,
            br#"{"error":{"code":"invalid_request","description":"missing client"}}"#.to_vec(),
        );
        let error = protocol_error("grant request", &response);
        assert_eq!(error.to_string(), "grant request failed with status 400: missing client");
    }

    #[test]
    fn test_protocol_error_falls_back() {
        let code = HttpResponse::new(StatusCode::UNAUTHORIZED, br#"{"error":{"code":"invalid_client"}}"#.to_vec());
        assert!(protocol_error("x", &code).to_string().ends_with("invalid_client"));

        let bare = HttpResponse::new(StatusCode::UNAUTHORIZED, br#"{"error":"request_denied"}"#.to_vec());
        assert!(protocol_error("x", &bare).to_string().ends_with("request_denied"));

        let text = HttpResponse::new(StatusCode::BAD_GATEWAY, b"upstream down".to_vec());
        assert!(protocol_error("x", &text).to_string().ends_with("upstream down"));

        let empty = HttpResponse::new(StatusCode::NOT_FOUND, Vec::new());
        assert_eq!(protocol_error("grant cancel", &empty).to_string(), "grant cancel failed with status 404: Not Found");
    }

    #[test]
    fn test_require_non_empty() {
        assert!(require_non_empty("token", "t").is_ok());
        assert!(matches!(require_non_empty("token", "  "), Err(GnapError::InvalidInput(_))));
    }
}
