//! HTTP retrieval of archive payloads.
//!
//! The [`Retriever`] trait is the seam between the orchestrator and the
//! network. [`HttpRetriever`] is the production implementation,
//! [`FileRetriever`] serves local archives, and tests substitute in-memory
//! fakes.

use std::time::Duration;

use async_trait::async_trait;

use crate::TransportFailure;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Fetches one archive payload.
///
/// Implementations must report every failure through the returned
/// [`TransportFailure`]; they never panic and never retry on their own.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Downloads `url` and returns the raw response body.
    ///
    /// # Errors
    ///
    /// Returns [`TransportFailure`] on network errors, timeouts, and
    /// non-2xx responses.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportFailure>;
}

/// `reqwest`-backed retriever that identifies itself with a fixed
/// `User-Agent` and bounds every request by a timeout.
pub struct HttpRetriever {
    client: reqwest::Client,
}

impl HttpRetriever {
    /// Builds a retriever sending `user_agent` on every request.
    ///
    /// # Errors
    ///
    /// Returns a [`reqwest::Error`] if the HTTP client cannot be built
    /// (e.g., TLS backend initialization fails).
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportFailure> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("GET {url} failed: {e}");
                return Err(failure_from_reqwest(url, &e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            log::warn!("GET {url} returned HTTP {status}");
            return Err(TransportFailure {
                url: url.to_string(),
                status: Some(status.as_u16()),
                message: format!("HTTP {status}"),
                transient: is_transient_status(status),
            });
        }

        match response.bytes().await {
            Ok(body) => {
                #[allow(clippy::cast_precision_loss)]
                let kb = body.len() as f64 / 1024.0;
                log::info!("GET {url} -> {status} ({kb:.1} KB)");
                Ok(body.to_vec())
            }
            Err(e) => {
                log::warn!("GET {url}: body read failed: {e}");
                Err(failure_from_reqwest(url, &e))
            }
        }
    }
}

/// Reads archives from the local filesystem.
///
/// The "URL" is taken as a path, with an optional `file://` prefix. Used by
/// `inspect` and for offline runs against a directory of downloaded
/// archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileRetriever;

#[async_trait]
impl Retriever for FileRetriever {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportFailure> {
        let path = url.strip_prefix("file://").unwrap_or(url);

        match tokio::fs::read(path).await {
            Ok(bytes) => {
                log::debug!("read {path} ({} bytes)", bytes.len());
                Ok(bytes)
            }
            Err(e) => {
                log::warn!("read {path} failed: {e}");
                Err(TransportFailure {
                    url: url.to_string(),
                    status: None,
                    message: e.to_string(),
                    transient: e.kind() == std::io::ErrorKind::Interrupted,
                })
            }
        }
    }
}

/// Returns `true` when `base_url` points at the local filesystem rather
/// than an HTTP(S) server.
#[must_use]
pub fn is_local(base_url: &str) -> bool {
    !(base_url.starts_with("http://") || base_url.starts_with("https://"))
}

fn failure_from_reqwest(url: &str, e: &reqwest::Error) -> TransportFailure {
    TransportFailure {
        url: url.to_string(),
        status: e.status().map(|s| s.as_u16()),
        message: e.to_string(),
        transient: is_transient(e),
    }
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}

fn is_transient_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
