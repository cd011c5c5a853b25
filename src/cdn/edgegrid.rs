// Copyright (c) 2025 - Cowboy AI, Inc.
//! EdgeGrid v1 Request Signing
//!
//! Akamai APIs authenticate each request with an `EG1-HMAC-SHA256` header:
//!
//! ```text
//! auth_data   = "EG1-HMAC-SHA256 client_token=..;access_token=..;timestamp=..;nonce=..;"
//! signing_key = base64(HMAC-SHA256(client_secret, timestamp))
//! canonical   = METHOD \t scheme \t host \t path?query \t headers \t content_hash \t
//! signature   = base64(HMAC-SHA256(signing_key, canonical + auth_data))
//! header      = auth_data + "signature=" + signature
//! ```
//!
//! `content_hash` is the base64 SHA-256 of the POST body (truncated to
//! `max_body` bytes). Every call to [`EdgeGridSigner::sign`] draws a fresh
//! timestamp and nonce; signatures are never reused.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

use crate::errors::{InvalidatorError, InvalidatorResult};

type HmacSha256 = Hmac<Sha256>;

/// Signing algorithm identifier
pub const ALGORITHM: &str = "EG1-HMAC-SHA256";

/// Default number of body bytes covered by the content hash
pub const DEFAULT_MAX_BODY: usize = 131_072;

/// API client credential; immutable once built
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredential {
    access_token: String,
    client_token: String,
    client_secret: String,
    host: String,
    max_body: usize,
}

impl ClientCredential {
    pub fn new(
        access_token: impl Into<String>,
        client_token: impl Into<String>,
        client_secret: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            client_token: client_token.into(),
            client_secret: client_secret.into(),
            host: host.into(),
            max_body: DEFAULT_MAX_BODY,
        }
    }

    pub fn with_max_body(mut self, max_body: usize) -> Self {
        self.max_body = max_body;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

impl fmt::Debug for ClientCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredential")
            .field("host", &self.host)
            .field("client_token", &"<redacted>")
            .field("access_token", &"<redacted>")
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Computes `Authorization` header values for EdgeGrid APIs
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeGridSigner;

impl EdgeGridSigner {
    pub fn new() -> Self {
        Self
    }

    /// Sign a request with a fresh timestamp and nonce
    pub fn sign(
        &self,
        credential: &ClientCredential,
        method: &str,
        url: &Url,
        body: &[u8],
    ) -> InvalidatorResult<String> {
        let timestamp = format_timestamp(Utc::now());
        let nonce = Uuid::new_v4().to_string();
        self.sign_with(credential, method, url, body, &timestamp, &nonce)
    }

    /// Sign a request with an explicit timestamp and nonce
    pub fn sign_with(
        &self,
        credential: &ClientCredential,
        method: &str,
        url: &Url,
        body: &[u8],
        timestamp: &str,
        nonce: &str,
    ) -> InvalidatorResult<String> {
        let auth_data = format!(
            "{} client_token={};access_token={};timestamp={};nonce={};",
            ALGORITHM, credential.client_token, credential.access_token, timestamp, nonce
        );
        let signing_key = hmac_base64(credential.client_secret.as_bytes(), timestamp.as_bytes())?;
        let canonical = canonicalize(credential, method, url, body);
        let signature = hmac_base64(
            signing_key.as_bytes(),
            format!("{}{}", canonical, auth_data).as_bytes(),
        )?;

        Ok(format!("{}signature={}", auth_data, signature))
    }
}

/// EdgeGrid timestamp, e.g. `20240102T03:04:05+0000`
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H:%M:%S+0000").to_string()
}

fn canonicalize(credential: &ClientCredential, method: &str, url: &Url, body: &[u8]) -> String {
    let method = method.to_uppercase();
    let relative = match url.query() {
        Some(query) if !query.is_empty() => format!("{}?{}", url.path(), query),
        _ => url.path().to_string(),
    };
    let content_hash = content_hash(&method, body, credential.max_body);

    [
        method.as_str(),
        url.scheme(),
        &canonical_host(url),
        &relative,
        "",
        &content_hash,
        "",
    ]
    .join("\t")
}

/// Host as the request will carry it; default ports are dropped by `Url`
fn canonical_host(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    }
}

fn content_hash(method: &str, body: &[u8], max_body: usize) -> String {
    if method != "POST" || body.is_empty() {
        return String::new();
    }
    let signed = &body[..body.len().min(max_body)];
    STANDARD.encode(Sha256::digest(signed))
}

fn hmac_base64(key: &[u8], data: &[u8]) -> InvalidatorResult<String> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| InvalidatorError::Signing(format!("HMAC error: {}", e)))?;
    mac.update(data);
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}
