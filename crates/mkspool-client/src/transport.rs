//! Signed REST transport for the cloud API.
//!
//! Every request carries the application key, the consumer key, a unix
//! timestamp and a signature computed as
//! `"$1$" + hex(sha1(secret + "+" + consumer + "+" + METHOD + "+" + URL + "+" + BODY + "+" + TS))`.
//! Transport failures are classified into [`TransportKind`] here, where the
//! underlying error is still typed.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::Deserialize;
use sha1::{Digest, Sha1};
use tracing::debug;

use crate::error::{ApiError, ApiResult, TransportKind};

const HEADER_APPLICATION: &str = "X-Ovh-Application";
const HEADER_CONSUMER: &str = "X-Ovh-Consumer";
const HEADER_TIMESTAMP: &str = "X-Ovh-Timestamp";
const HEADER_SIGNATURE: &str = "X-Ovh-Signature";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw request/response exchange with the remote API.
///
/// `path` is relative to the API root and may carry a query string.
/// Implementations return the response body on 2xx and an
/// [`ApiError::Status`] otherwise.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, method: Method, path: &str, body: Option<Vec<u8>>) -> ApiResult<Vec<u8>>;
}

/// API credentials. The secret is never logged.
#[derive(Clone, Default)]
pub struct Credentials {
    pub application_key: String,
    pub application_secret: String,
    pub consumer_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("application_key", &self.application_key)
            .field("application_secret", &"<redacted>")
            .field("consumer_key", &self.consumer_key)
            .finish()
    }
}

/// Map an endpoint alias to its API root. Anything else is taken as a URL.
pub fn resolve_endpoint(endpoint: &str) -> String {
    match endpoint {
        "ovh-eu" => "https://eu.api.ovh.com/1.0".to_string(),
        "ovh-ca" => "https://ca.api.ovh.com/1.0".to_string(),
        "ovh-us" => "https://api.us.ovhcloud.com/1.0".to_string(),
        other => other.trim_end_matches('/').to_string(),
    }
}

/// Request signature over the canonical string.
pub fn sign(
    credentials: &Credentials,
    method: Method,
    url: &str,
    body: &str,
    timestamp: u64,
) -> String {
    let mut hasher = Sha1::new();
    hasher.update(
        format!(
            "{}+{}+{}+{}+{}+{}",
            credentials.application_secret,
            credentials.consumer_key,
            method.as_str(),
            url,
            body,
            timestamp
        )
        .as_bytes(),
    );
    format!("$1${}", hex::encode(hasher.finalize()))
}

/// Transport over reqwest with request signing.
pub struct OvhTransport {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl OvhTransport {
    pub fn new(endpoint: &str, credentials: Credentials) -> ApiResult<Self> {
        if credentials.application_key.is_empty() {
            return Err(ApiError::InvalidConfig("application key is required".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ApiError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            http,
            base_url: resolve_endpoint(endpoint),
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for OvhTransport {
    async fn call(&self, method: Method, path: &str, body: Option<Vec<u8>>) -> ApiResult<Vec<u8>> {
        let url = format!("{}{}", self.base_url, path);
        let body = body.unwrap_or_default();
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let signature = sign(
            &self.credentials,
            method,
            &url,
            &String::from_utf8_lossy(&body),
            timestamp,
        );

        let request = match method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
            Method::Put => self.http.put(&url),
            Method::Delete => self.http.delete(&url),
        };
        let mut request = request
            .header(HEADER_APPLICATION, &self.credentials.application_key)
            .header(HEADER_CONSUMER, &self.credentials.consumer_key)
            .header(HEADER_TIMESTAMP, timestamp.to_string())
            .header(HEADER_SIGNATURE, signature)
            .header(reqwest::header::ACCEPT, "application/json");
        if !body.is_empty() {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        debug!(%method, %path, "sending request");
        let response = request.send().await.map_err(classify)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(classify)?;

        if status.is_success() {
            return Ok(bytes.to_vec());
        }
        Err(ApiError::Status {
            status: status.as_u16(),
            message: error_message(&bytes, status.canonical_reason()),
        })
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// The API reports failures as `{"message": "..."}`; fall back to the raw
/// body, then the reason phrase.
fn error_message(body: &[u8], reason: Option<&str>) -> String {
    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
        return parsed.message;
    }
    let text = String::from_utf8_lossy(body).trim().to_string();
    if !text.is_empty() {
        return text;
    }
    reason.unwrap_or("unknown error").to_string()
}

fn classify(err: reqwest::Error) -> ApiError {
    let message = err.to_string();
    let kind = if err.is_timeout() {
        TransportKind::Timeout
    } else {
        match io_kind(&err) {
            Some(io::ErrorKind::ConnectionRefused) => TransportKind::Connect,
            Some(io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted) => {
                TransportKind::Reset
            }
            Some(io::ErrorKind::TimedOut) => TransportKind::Timeout,
            _ if message_mentions_dns(&err) => TransportKind::Dns,
            _ if err.is_connect() => TransportKind::Connect,
            _ => TransportKind::Other,
        }
    };
    ApiError::Transport { kind, message }
}

fn io_kind(err: &(dyn StdError + 'static)) -> Option<io::ErrorKind> {
    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(io_err) = inner.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        source = inner.source();
    }
    None
}

fn message_mentions_dns(err: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        let text = e.to_string().to_lowercase();
        if text.contains("dns error") || text.contains("temporary failure") {
            return true;
        }
        current = e.source();
    }
    false
}
