//! GNAP Signer: RFC 9421 request signing for GNAP clients
//!
//! A client-side core for the Grant Negotiation and Authorization Protocol
//! (GNAP) as used by Open Payments. Every outgoing request is signed with an
//! Ed25519 key using HTTP Message Signatures, bodies are bound with a
//! `Content-Digest`, and grants are driven through their full lifecycle.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │     AuthenticatedClient      │  wallet address + key
//! │  ┌────────────┐ ┌─────────┐  │
//! │  │GrantService│ │ Token   │  │  request / continue / cancel
//! │  │            │ │ Service │  │  rotate / revoke
//! │  └─────┬──────┘ └────┬────┘  │
//! │        └──────┬──────┘       │
//! │      ┌────────▼────────┐     │
//! │      │ SigningPipeline │     │  digest, Signature-Input, Signature
//! │      └────────┬────────┘     │
//! └───────────────┼──────────────┘
//!                 │ RequestDoer
//!         ┌───────▼───────┐
//!         │ HttpTransport │  reqwest, HTTPS only
//!         └───────────────┘
//! ```
//!
//! # Quick Start
//!
//! ## Sign a request
//!
//! ```
//! use ed25519_dalek::SigningKey;
//! use gnap_signer::httpsig::{RequestSigner, RequestView, SignatureVerifier};
//! use reqwest::{Method, Url, header::HeaderMap};
//!
//! let key = SigningKey::from_bytes(&[7u8; 32]);
//! let signer = RequestSigner::new(key.clone(), "key-1")?;
//!
//! let url = Url::parse("https://example.com/resource")?;
//! let mut headers = HeaderMap::new();
//! let view = RequestView::new(&Method::GET, &url, &headers, b"");
//! signer.sign(&view)?.apply(&mut headers)?;
//!
//! let view = RequestView::new(&Method::GET, &url, &headers, b"");
//! let verified = SignatureVerifier::new(key.verifying_key()).verify(&view)?;
//! assert_eq!(verified.key_id, "key-1");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Drive a grant
//!
//! ```no_run
//! use gnap_signer::{AccessItem, AuthenticatedClient, Grant, GrantRequest, InteractRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> gnap_signer::error::Result<()> {
//! let client = AuthenticatedClient::builder(
//!     "https://wallet.example.com/alice",
//!     "/etc/gnap/alice.pem",
//!     "alice-key-1",
//! )
//! .build()?;
//! let cancel = CancellationToken::new();
//!
//! let request = GrantRequest::access_token([
//!     AccessItem::new("outgoing-payment").actions(["create", "read"]),
//! ])
//! .with_interact(InteractRequest::redirect().finish_redirect(
//!     "https://shop.example.com/return",
//!     "nonce-123",
//! ));
//!
//! let grant = client.grant().request("https://auth.example.com/", &request, &cancel).await?;
//! if let Grant::Interactive { interact, continuation } = grant {
//!     println!("send the user to {}", interact.redirect);
//!     let granted = client.grant().continue_grant(&continuation, Some("ref"), &cancel).await?;
//!     if let Grant::Granted { access_token, .. } = granted {
//!         let rotated = client.token().rotate(access_token, &cancel).await?;
//!         client.token().revoke(rotated, &cancel).await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Security
//!
//! - Private keys are zeroized on drop and never logged
//! - Bearer token values are marked sensitive and redacted from `Debug`
//! - Plain `http://` is refused unless explicitly enabled
//! - Verification failures carry no detail beyond their category

#![allow(
    clippy::multiple_crate_versions,
    reason = "transitive dependencies from reqwest"
)]

pub mod client;
pub mod config;
pub mod error;
pub mod grant;
pub mod httpsig;
pub mod pipeline;
pub mod transport;

pub use client::{AuthenticatedClient, AuthenticatedClientBuilder};
pub use config::ClientConfig;
pub use error::{GnapError, Result};
pub use grant::{
    AccessItem, AccessToken, AccessTokenRequest, Continuation, Grant, GrantRequest,
    GrantService, InteractFinish, InteractRequest, InteractResponse, TokenService,
};
pub use httpsig::{RequestSigner, SignatureVerifier, VerificationPolicy};
pub use pipeline::SigningPipeline;
pub use transport::{HttpConfig, HttpRequest, HttpResponse, HttpTransport, RequestDoer};
