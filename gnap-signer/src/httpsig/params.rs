//! `Signature-Input` and `Signature` header fields.
//!
//! Both headers are structured-field dictionaries (RFC 8941) keyed by
//! signature label. This module serializes the members this crate produces
//! and parses the subset of structured-field syntax RFC 9421 uses:
//!
//! ```text
//! Signature-Input: sig1=("@method" "@target-uri");created=1700000000;keyid="k";alg="ed25519"
//! Signature: sig1=:<base64>:
//! ```

use base64::{Engine, engine::general_purpose::STANDARD};

use super::{ALGORITHM, base::Component};
use crate::error::{GnapError, Result};

/// Signature parameters: the covered components plus metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureParams {
    /// Covered components, in signing order.
    pub components: Vec<Component>,
    /// Creation time (Unix seconds).
    pub created: u64,
    /// Key identifier the verifier resolves to a public key.
    pub keyid: String,
}

impl SignatureParams {
    /// Creates signature parameters.
    #[must_use]
    pub fn new(components: Vec<Component>, created: u64, keyid: impl Into<String>) -> Self {
        Self { components, created, keyid: keyid.into() }
    }

    /// Returns `true` if `component` is covered.
    #[must_use]
    pub fn covers(&self, component: &Component) -> bool {
        self.components.contains(component)
    }

    /// Serializes the parameters as the value of a `Signature-Input` member.
    ///
    /// This is also the value of the `"@signature-params"` base line.
    #[must_use]
    pub fn serialize(&self) -> String {
        let list = self
            .components
            .iter()
            .map(|c| format!("\"{}\"", c.name()))
            .collect::<Vec<_>>()
            .join(" ");
        format!(
            "({list});created={};keyid={};alg=\"{ALGORITHM}\"",
            self.created,
            quote(&self.keyid)
        )
    }
}

/// One parsed `Signature-Input` member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInput {
    /// Signature label (dictionary key), e.g. `sig1`.
    pub label: String,
    /// Parsed parameters.
    pub params: SignatureParams,
    /// The `alg` parameter, if declared.
    pub alg: Option<String>,
    serialized: String,
}

impl SignatureInput {
    /// Returns the member value exactly as received.
    ///
    /// Verification uses this text for the `"@signature-params"` line, so
    /// parameters this crate does not interpret are still covered.
    #[must_use]
    pub fn serialized_params(&self) -> &str {
        &self.serialized
    }
}

/// Formats a `Signature-Input` header value with a single member.
#[must_use]
pub fn format_signature_input(label: &str, params: &SignatureParams) -> String {
    format!("{label}={}", params.serialize())
}

/// Formats a `Signature` header value with a single member.
#[must_use]
pub fn format_signature(label: &str, signature: &[u8]) -> String {
    format!("{label}=:{}:", STANDARD.encode(signature))
}

/// Parses a `Signature-Input` header value.
///
/// Every member must be an inner list of quoted component identifiers with
/// integer `created` and string `keyid` parameters. Unknown parameters are
/// accepted and kept in [`SignatureInput::serialized_params`].
///
/// # Errors
///
/// Returns [`GnapError::MalformedSignatureInput`] on any syntax error, an
/// empty dictionary, or missing/ill-typed `created`/`keyid`.
pub fn parse_signature_input(header: &str) -> Result<Vec<SignatureInput>> {
    let malformed = GnapError::MalformedSignatureInput;
    let mut cursor = Cursor::new(header);
    let mut inputs = Vec::new();

    cursor.skip_whitespace();
    loop {
        let label = cursor.key().map_err(malformed)?.to_owned();
        if !cursor.eat(b'=') {
            return Err(malformed(format!("member {label} has no value")));
        }
        let start = cursor.pos;
        let components = cursor.component_list().map_err(malformed)?;
        let params = cursor.parameters().map_err(malformed)?;
        let serialized = cursor.input[start..cursor.pos].to_owned();

        let mut created = None;
        let mut keyid = None;
        let mut alg = None;
        for (name, value) in params {
            match (name, value) {
                ("created", Bare::Integer(n)) => created = Some(n),
                ("keyid", Bare::String(s)) => keyid = Some(s),
                ("alg", Bare::String(s)) => alg = Some(s),
                ("created" | "keyid" | "alg", _) => {
                    return Err(malformed(format!("parameter {name} has the wrong type")));
                }
                _ => {}
            }
        }
        let created = created.ok_or_else(|| malformed("missing created parameter".to_owned()))?;
        let keyid = keyid.ok_or_else(|| malformed("missing keyid parameter".to_owned()))?;

        inputs.push(SignatureInput {
            label,
            params: SignatureParams { components, created, keyid },
            alg,
            serialized,
        });

        if !cursor.next_member().map_err(malformed)? {
            break;
        }
    }
    Ok(inputs)
}

/// Parses a `Signature` header value into `(label, signature bytes)` pairs.
///
/// # Errors
///
/// Returns [`GnapError::InvalidSignature`] for any framing or base64 error;
/// signature problems are not described further.
pub fn parse_signature(header: &str) -> Result<Vec<(String, Vec<u8>)>> {
    let mut cursor = Cursor::new(header);
    let mut signatures = Vec::new();

    cursor.skip_whitespace();
    loop {
        let label = cursor.key().map_err(|_| GnapError::InvalidSignature)?.to_owned();
        if !cursor.eat(b'=') {
            return Err(GnapError::InvalidSignature);
        }
        let encoded = cursor.byte_sequence().map_err(|_| GnapError::InvalidSignature)?;
        let bytes = STANDARD.decode(encoded).map_err(|_| GnapError::InvalidSignature)?;
        cursor.parameters().map_err(|_| GnapError::InvalidSignature)?;
        signatures.push((label, bytes));

        if !cursor.next_member().map_err(|_| GnapError::InvalidSignature)? {
            break;
        }
    }
    Ok(signatures)
}

/// Serializes a structured-field string.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Returns `true` if `value` can be carried in a structured-field string.
#[must_use]
pub fn is_valid_sf_string(value: &str) -> bool {
    value.bytes().all(|b| (0x20..=0x7e).contains(&b))
}

/// Bare item values the parser understands.
#[derive(Debug, PartialEq, Eq)]
enum Bare {
    Integer(u64),
    String(String),
    Token(String),
    Boolean(bool),
}

type Parsed<T> = std::result::Result<T, String>;

/// Byte cursor over a header value.
struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let input = self.input;
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        &input[start..self.pos]
    }

    /// Advances past a member separator; returns `false` at end of input.
    fn next_member(&mut self) -> Parsed<bool> {
        self.skip_whitespace();
        if self.peek().is_none() {
            return Ok(false);
        }
        if !self.eat(b',') {
            return Err(format!("unexpected character at offset {}", self.pos));
        }
        self.skip_whitespace();
        if self.peek().is_none() {
            return Err("trailing comma".to_owned());
        }
        Ok(true)
    }

    fn key(&mut self) -> Parsed<&'a str> {
        match self.peek() {
            Some(b'a'..=b'z' | b'*') => {}
            _ => return Err(format!("expected key at offset {}", self.pos)),
        }
        Ok(self.take_while(|b| {
            b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'_' | b'-' | b'.' | b'*')
        }))
    }

    fn string(&mut self) -> Parsed<String> {
        if !self.eat(b'"') {
            return Err(format!("expected string at offset {}", self.pos));
        }
        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err("unterminated string".to_owned()),
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(value);
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(escaped @ (b'"' | b'\\')) => {
                            value.push(char::from(escaped));
                            self.pos += 1;
                        }
                        _ => return Err("invalid escape in string".to_owned()),
                    }
                }
                Some(b) if (0x20..=0x7e).contains(&b) => {
                    value.push(char::from(b));
                    self.pos += 1;
                }
                Some(_) => return Err("invalid character in string".to_owned()),
            }
        }
    }

    fn bare_item(&mut self) -> Parsed<Bare> {
        match self.peek() {
            Some(b'"') => self.string().map(Bare::String),
            Some(b'0'..=b'9') => {
                let digits = self.take_while(|b| b.is_ascii_digit());
                if digits.len() > 15 {
                    return Err("integer too long".to_owned());
                }
                digits.parse().map(Bare::Integer).map_err(|e| e.to_string())
            }
            Some(b'?') => {
                self.pos += 1;
                match self.peek() {
                    Some(b'1') => {
                        self.pos += 1;
                        Ok(Bare::Boolean(true))
                    }
                    Some(b'0') => {
                        self.pos += 1;
                        Ok(Bare::Boolean(false))
                    }
                    _ => Err("invalid boolean".to_owned()),
                }
            }
            Some(b) if b.is_ascii_alphabetic() || b == b'*' => {
                let token = self.take_while(|b| {
                    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~:/".contains(&b)
                });
                Ok(Bare::Token(token.to_owned()))
            }
            _ => Err(format!("unsupported item at offset {}", self.pos)),
        }
    }

    fn parameters(&mut self) -> Parsed<Vec<(&'a str, Bare)>> {
        let mut params = Vec::new();
        while self.eat(b';') {
            self.skip_spaces();
            let name = self.key()?;
            let value = if self.eat(b'=') { self.bare_item()? } else { Bare::Boolean(true) };
            params.push((name, value));
        }
        Ok(params)
    }

    fn component_list(&mut self) -> Parsed<Vec<Component>> {
        if !self.eat(b'(') {
            return Err("expected component list".to_owned());
        }
        let mut components = Vec::new();
        loop {
            self.skip_spaces();
            if self.eat(b')') {
                return Ok(components);
            }
            let name = self.string()?;
            if !self.parameters()?.is_empty() {
                return Err(format!("component parameters are not supported ({name})"));
            }
            let component =
                Component::parse(&name).map_err(|_| format!("unsupported component {name:?}"))?;
            if components.contains(&component) {
                return Err(format!("duplicate component {name}"));
            }
            components.push(component);
            match self.peek() {
                Some(b' ' | b')') => {}
                _ => return Err("expected space or ')' after component".to_owned()),
            }
        }
    }

    fn byte_sequence(&mut self) -> Parsed<&'a str> {
        if !self.eat(b':') {
            return Err("expected byte sequence".to_owned());
        }
        let encoded =
            self.take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='));
        if !self.eat(b':') {
            return Err("unterminated byte sequence".to_owned());
        }
        Ok(encoded)
    }
}
