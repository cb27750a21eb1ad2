use ed25519_dalek::SigningKey;
use proptest::prelude::*;
use reqwest::{
    Method, Url,
    header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderValue},
};

use crate::{
    error::GnapError,
    httpsig::{
        CONTENT_DIGEST, RequestSigner, RequestView, SIGNATURE, SignatureVerifier, content_digest,
    },
};

/// Builds the headers the signing pipeline would send and signs them.
fn signed(
    signer: &RequestSigner,
    method: &Method,
    url: &Url,
    token: Option<&str>,
    body: &[u8],
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(token) = token {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("GNAP {token}")).unwrap());
    }
    if !body.is_empty() {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        headers.insert(CONTENT_DIGEST, HeaderValue::from_str(&content_digest(body)).unwrap());
    }
    let signature =
        signer.sign_at(&RequestView::new(method, url, &headers, body), 1_700_000_000).unwrap();
    signature.apply(&mut headers).unwrap();
    headers
}

fn method_strategy() -> impl Strategy<Value = Method> {
    prop_oneof![Just(Method::GET), Just(Method::POST), Just(Method::PUT), Just(Method::DELETE)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn test_signature_verification_roundtrip(
        seed in any::<[u8; 32]>(),
        key_id in "[a-zA-Z0-9-_]{1,64}",
        method in method_strategy(),
        host in "[a-z0-9]+\\.com",
        path in "/[a-z0-9/]*",
        token in proptest::option::of("[A-Za-z0-9]{8,32}"),
        body in any::<Vec<u8>>(),
    ) {
        let signing_key = SigningKey::from_bytes(&seed);
        let verifier = SignatureVerifier::new(signing_key.verifying_key());
        let signer = RequestSigner::new(signing_key, key_id.as_str()).unwrap();
        let url = Url::parse(&format!("https://{host}{path}")).unwrap();

        let headers = signed(&signer, &method, &url, token.as_deref(), &body);
        let result = verifier.verify(&RequestView::new(&method, &url, &headers, &body));

        prop_assert!(result.is_ok(), "Verification failed: {:?}", result.err());
        prop_assert_eq!(result.unwrap().key_id, key_id);
    }

    #[test]
    fn test_signature_bit_flip_detected(
        seed in any::<[u8; 32]>(),
        path in "/[a-z0-9/]*",
        body in any::<Vec<u8>>(),
        bit in 0usize..512,
    ) {
        use base64::{Engine, engine::general_purpose::STANDARD};

        let signing_key = SigningKey::from_bytes(&seed);
        let verifier = SignatureVerifier::new(signing_key.verifying_key());
        let signer = RequestSigner::new(signing_key, "k").unwrap();
        let url = Url::parse(&format!("https://example.com{path}")).unwrap();
        let mut headers = signed(&signer, &Method::POST, &url, None, &body);

        let value = headers[SIGNATURE].to_str().unwrap().to_owned();
        let encoded = value.strip_prefix("sig1=:").and_then(|s| s.strip_suffix(':')).unwrap();
        let mut bytes = STANDARD.decode(encoded).unwrap();
        bytes[bit / 8] ^= 1 << (bit % 8);
        let tampered = format!("sig1=:{}:", STANDARD.encode(&bytes));
        headers.insert(SIGNATURE, HeaderValue::from_str(&tampered).unwrap());

        let result = verifier.verify(&RequestView::new(&Method::POST, &url, &headers, &body));
        prop_assert!(matches!(result, Err(GnapError::InvalidSignature)));
    }

    #[test]
    fn test_altered_target_uri_detected(
        seed in any::<[u8; 32]>(),
        path in "/[a-z0-9]{1,16}",
        suffix in "[a-z0-9]{1,8}",
    ) {
        let signing_key = SigningKey::from_bytes(&seed);
        let verifier = SignatureVerifier::new(signing_key.verifying_key());
        let signer = RequestSigner::new(signing_key, "k").unwrap();
        let url = Url::parse(&format!("https://example.com{path}")).unwrap();
        let headers = signed(&signer, &Method::GET, &url, None, b"");

        let altered = Url::parse(&format!("https://example.com{path}{suffix}")).unwrap();
        let result = verifier.verify(&RequestView::new(&Method::GET, &altered, &headers, b""));
        prop_assert!(matches!(result, Err(GnapError::InvalidSignature)));
    }

    #[test]
    fn test_altered_body_detected(
        seed in any::<[u8; 32]>(),
        body in proptest::collection::vec(any::<u8>(), 1..256),
        index in any::<prop::sample::Index>(),
    ) {
        let signing_key = SigningKey::from_bytes(&seed);
        let verifier = SignatureVerifier::new(signing_key.verifying_key());
        let signer = RequestSigner::new(signing_key, "k").unwrap();
        let url = Url::parse("https://example.com/").unwrap();
        let headers = signed(&signer, &Method::POST, &url, None, &body);

        let mut altered = body.clone();
        let i = index.index(altered.len());
        altered[i] ^= 0xff;
        let result = verifier.verify(&RequestView::new(&Method::POST, &url, &headers, &altered));
        prop_assert!(matches!(result, Err(GnapError::InvalidSignature)));
    }

    #[test]
    fn test_content_digest_deterministic(body in any::<Vec<u8>>()) {
        prop_assert_eq!(content_digest(&body), content_digest(&body));
    }
}
