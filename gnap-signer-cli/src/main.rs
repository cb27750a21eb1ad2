//! `gnap-signer`: key provisioning and signature tooling for GNAP clients.
//!
//! ```text
//! gnap-signer keygen --key-id alice-key-1
//! gnap-signer jwk --key ./alice.pem --key-id alice-key-1
//! gnap-signer sign --key ./alice.pem --key-id alice-key-1 \
//!     --method POST --url https://auth.example.com/ --body '{"client":"..."}'
//! gnap-signer verify --jwk ./alice.jwk.json --method GET \
//!     --url https://example.com/resource \
//!     --signature 'sig1=:...:' --signature-input 'sig1=(...)'
//! ```

mod observability;

use std::{fs, process::ExitCode};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use gnap_signer::{
    HttpRequest, HttpTransport, RequestSigner, SignatureVerifier, SigningPipeline,
    VerificationPolicy,
    httpsig::{
        RequestView, SIGNATURE, SIGNATURE_INPUT,
        jwk::{Jwk, Jwks},
        key::{encode_private_key_base64, generate_signing_key, load_private_key},
    },
};
use reqwest::{
    Method, Url,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::observability::{LogFormat, init_logging};

#[derive(Debug, Parser)]
#[command(name = "gnap-signer", version, about = "GNAP client key and signature tooling")]
struct Cli {
    /// Log format on stderr: `pretty` or `json`.
    #[arg(long, global = true, env = "LOG_FORMAT", default_value = "pretty")]
    log_format: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a new Ed25519 key and print it with its JWK.
    Keygen {
        /// Key id to publish the key under.
        #[arg(long, default_value = "key-1")]
        key_id: String,
    },
    /// Print the public JWK of a private key.
    Jwk(KeyArgs),
    /// Print the headers a signed request would carry.
    Sign(SignArgs),
    /// Verify a captured request against a published JWK.
    Verify(VerifyArgs),
}

#[derive(Debug, Args)]
struct KeyArgs {
    /// PEM file path or base64 PEM blob.
    #[arg(long, env = "GNAP_PRIVATE_KEY", hide_env_values = true)]
    key: String,

    /// Key id placed in `keyid`.
    #[arg(long, env = "GNAP_KEY_ID")]
    key_id: String,
}

#[derive(Debug, Args)]
struct SignArgs {
    #[command(flatten)]
    key: KeyArgs,

    /// HTTP method.
    #[arg(long, default_value = "GET")]
    method: String,

    /// Target URL.
    #[arg(long)]
    url: String,

    /// Request body.
    #[arg(long)]
    body: Option<String>,

    /// GNAP access token for the `Authorization` header.
    #[arg(long)]
    authorization: Option<String>,

    /// Content type of the body.
    #[arg(long, default_value = "application/json")]
    content_type: String,
}

#[derive(Debug, Args)]
struct VerifyArgs {
    /// JWK or JWKS, as a file path or inline JSON.
    #[arg(long)]
    jwk: String,

    /// Key id to pick from a JWKS.
    #[arg(long)]
    key_id: Option<String>,

    /// HTTP method.
    #[arg(long, default_value = "GET")]
    method: String,

    /// Target URL.
    #[arg(long)]
    url: String,

    /// `Signature` header value.
    #[arg(long)]
    signature: String,

    /// `Signature-Input` header value.
    #[arg(long)]
    signature_input: String,

    /// Additional request header as `name: value`. Repeatable.
    #[arg(long = "header", value_name = "NAME:VALUE")]
    headers: Vec<String>,

    /// Request body.
    #[arg(long)]
    body: Option<String>,

    /// Trust the declared component list instead of requiring the full set.
    #[arg(long)]
    lenient: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(LogFormat::parse_env_value(&cli.log_format), "info");

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Keygen { key_id } => keygen(&key_id),
        Command::Jwk(args) => print_jwk(&args),
        Command::Sign(args) => sign(args).await,
        Command::Verify(args) => verify(&args),
    }
}

fn keygen(key_id: &str) -> anyhow::Result<()> {
    let key = generate_signing_key();
    let private_key = encode_private_key_base64(&key)?;
    let jwk = Jwk::from_verifying_key(&key.verifying_key(), key_id);

    let output = serde_json::json!({
        "private_key": private_key.as_str(),
        "jwk": jwk,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_jwk(args: &KeyArgs) -> anyhow::Result<()> {
    let key = load_private_key(&args.key).context("loading private key")?;
    let jwks = Jwks::new(Jwk::from_verifying_key(&key.verifying_key(), &args.key_id));
    println!("{}", jwks.to_json()?);
    Ok(())
}

async fn sign(args: SignArgs) -> anyhow::Result<()> {
    let key = load_private_key(&args.key.key).context("loading private key")?;
    let signer = RequestSigner::new(key, args.key.key_id)?;
    let pipeline = SigningPipeline::new(signer, HttpTransport::new());

    let method = parse_method(&args.method)?;
    let mut request = HttpRequest::new(method, &args.url)?;
    if let Some(token) = &args.authorization {
        request = request.with_gnap_token(token)?;
    }
    if let Some(body) = args.body {
        request = request.with_header("content-type", &args.content_type)?.with_body(body);
    }

    let prepared = pipeline.prepare_signed(request, &CancellationToken::new()).await?;
    for (name, value) in &prepared.headers {
        if value.is_sensitive() {
            println!("{name}: <redacted>");
        } else {
            println!("{name}: {}", value.to_str().unwrap_or("<binary>"));
        }
    }
    Ok(())
}

fn verify(args: &VerifyArgs) -> anyhow::Result<()> {
    let jwk = read_jwk(&args.jwk, args.key_id.as_deref())?;
    let policy =
        if args.lenient { VerificationPolicy::DeclaredOnly } else { VerificationPolicy::Strict };
    let verifier = SignatureVerifier::new(jwk.to_verifying_key()?).with_policy(policy);

    let method = parse_method(&args.method)?;
    let url = Url::parse(&args.url).with_context(|| format!("parsing URL {}", args.url))?;
    let mut headers = HeaderMap::new();
    for header in &args.headers {
        let (name, value) = parse_header(header)?;
        headers.append(name, value);
    }
    headers.insert(SIGNATURE, HeaderValue::from_str(&args.signature)?);
    headers.insert(SIGNATURE_INPUT, HeaderValue::from_str(&args.signature_input)?);

    let body = args.body.as_deref().unwrap_or_default().as_bytes();
    let verified = verifier.verify(&RequestView::new(&method, &url, &headers, body))?;
    debug!(label = %verified.label, "signature verified");

    let components: Vec<&str> = verified.components.iter().map(|c| c.name()).collect();
    println!(
        "valid: label={} keyid={} created={} components={}",
        verified.label,
        verified.key_id,
        verified.created,
        components.join(",")
    );
    Ok(())
}

fn parse_method(method: &str) -> anyhow::Result<Method> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid HTTP method {method:?}"))
}

fn parse_header(header: &str) -> anyhow::Result<(HeaderName, HeaderValue)> {
    let Some((name, value)) = header.split_once(':') else {
        bail!("header {header:?} is not in NAME:VALUE form");
    };
    let name = HeaderName::from_bytes(name.trim().as_bytes())
        .with_context(|| format!("invalid header name in {header:?}"))?;
    let value = HeaderValue::from_str(value.trim())
        .with_context(|| format!("invalid header value in {header:?}"))?;
    Ok((name, value))
}

/// Reads a JWK or JWKS from a file or inline JSON.
fn read_jwk(source: &str, key_id: Option<&str>) -> anyhow::Result<Jwk> {
    let json = if source.trim_start().starts_with('{') {
        source.to_owned()
    } else {
        fs::read_to_string(source).with_context(|| format!("reading {source}"))?
    };

    if let Ok(jwk) = Jwk::from_json(&json) {
        return Ok(jwk);
    }
    let jwks: Jwks = serde_json::from_str(&json).context("expected a JWK or a JWKS")?;
    let jwk = match key_id {
        Some(kid) => jwks.find(kid).with_context(|| format!("no key {kid:?} in JWKS"))?,
        None => jwks.keys.first().context("JWKS has no keys")?,
    };
    Ok(jwk.clone())
}
