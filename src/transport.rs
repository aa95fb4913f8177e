use crate::snapshot::ResponseSnapshot;
use crate::types::{Method, RequestDescriptor};
use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::header::{HeaderName, HeaderValue};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// 30 seconds per exchange
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to initialize HTTP client: {0}")]
    Init(String),
    #[error("invalid request URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("invalid request header `{0}`")]
    InvalidHeader(String),
    #[error("connection to {url} failed: {reason}")]
    Connect { url: String, reason: String },
    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },
    #[error("failed to read response body from {url}: {reason}")]
    Read { url: String, reason: String },
    #[error("exchange with {url} failed: {reason}")]
    Other { url: String, reason: String },
}

/// Seam to the HTTP collaborator. Tests substitute their own
/// implementations serving canned snapshots.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs one exchange. 4xx/5xx responses are valid snapshots, never
    /// transport errors; no retries happen at this layer.
    async fn send(
        &self,
        request: &RequestDescriptor,
        timeout: Duration,
    ) -> Result<ResponseSnapshot, TransportError>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<HttpTransport, TransportError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Init(e.to_string()))?;
        Ok(HttpTransport { client })
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
    }
}

fn classify(error: reqwest::Error, url: &str, timeout: Duration) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
            timeout,
        }
    } else if error.is_connect() {
        TransportError::Connect {
            url: url.to_string(),
            reason: error.to_string(),
        }
    } else {
        TransportError::Other {
            url: url.to_string(),
            reason: error.to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &RequestDescriptor,
        timeout: Duration,
    ) -> Result<ResponseSnapshot, TransportError> {
        debug_assert!(request.body.is_none() || request.method.allows_body());

        let url = reqwest::Url::parse(&request.url).map_err(|e| TransportError::InvalidUrl {
            url: request.url.clone(),
            reason: e.to_string(),
        })?;

        let mut builder = self
            .client
            .request(reqwest_method(request.method), url)
            .timeout(timeout);
        for (name, value) in &request.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| TransportError::InvalidHeader(name.clone()))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| TransportError::InvalidHeader(format!("{name}: {value}")))?;
            builder = builder.header(header_name, header_value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let started = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|e| classify(e, &request.url, timeout))?;

        let status = response.status().as_u16();
        let mut headers: IndexMap<String, String> = IndexMap::new();
        for (name, value) in response.headers() {
            let value = value.to_str().unwrap_or("<binary>").to_string();
            match headers.entry(name.as_str().to_string()) {
                indexmap::map::Entry::Occupied(mut entry) => {
                    // Repeated headers (Set-Cookie) collapse into one line
                    let existing = entry.get_mut();
                    existing.push_str(", ");
                    existing.push_str(&value);
                }
                indexmap::map::Entry::Vacant(entry) => {
                    entry.insert(value);
                }
            }
        }

        let bytes = response.bytes().await.map_err(|e| TransportError::Read {
            url: request.url.clone(),
            reason: e.to_string(),
        })?;
        let elapsed = started.elapsed();
        debug!(
            method = %request.method,
            url = %request.url,
            status,
            ms = elapsed.as_millis() as u64,
            "exchange complete"
        );

        Ok(ResponseSnapshot::new(
            status,
            headers,
            bytes.to_vec(),
            elapsed,
        ))
    }
}
