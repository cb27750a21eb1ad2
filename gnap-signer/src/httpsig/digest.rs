//! `Content-Digest` computation per RFC 9530.

use base64::{Engine, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha512};

/// Digest algorithm token used in `Content-Digest`.
pub const DIGEST_ALGORITHM: &str = "sha-512";

/// Computes the `Content-Digest` header value for a request body.
///
/// The value is a structured-field dictionary entry with a byte-sequence
/// member: `sha-512=:<base64 SHA-512>:`. It must be computed over the exact
/// bytes sent on the wire.
///
/// # Examples
///
/// ```
/// use gnap_signer::httpsig::content_digest;
///
/// let digest = content_digest(b"{\"hello\":\"world\"}");
/// assert!(digest.starts_with("sha-512=:"));
/// assert!(digest.ends_with(':'));
/// ```
#[must_use]
pub fn content_digest(body: &[u8]) -> String {
    let hash = Sha512::digest(body);
    format!("{DIGEST_ALGORITHM}=:{}:", STANDARD.encode(hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_digest_empty_body() {
        assert_eq!(
            content_digest(b""),
            "sha-512=:z4PhNX7vuL3xVChQ1m2AB9Yg5AULVxXcg/SpIdNs6c5H0NE8XYXysP+DGNKHfuwvY7kxvUdBeoGlODJ6+SfaPg==:"
        );
    }

    #[test]
    fn test_content_digest_deterministic() {
        let body = br#"{"access_token":{"access":[{"type":"quote","actions":["create"]}]}}"#;
        assert_eq!(content_digest(body), content_digest(body));
    }

    #[test]
    fn test_content_digest_changes_with_single_byte() {
        assert_ne!(content_digest(b"test body"), content_digest(b"test bodz"));
        assert_ne!(content_digest(b"test body"), content_digest(b"test body "));
    }

    #[test]
    fn test_content_digest_known_value() {
        let expected = STANDARD.encode(Sha512::digest(b"test body"));
        assert_eq!(content_digest(b"test body"), format!("sha-512=:{expected}:"));
    }
}
