//! HTTP retrieval of protoc release archives.
//!
//! Archives are small enough to hold in memory, so the body is streamed into
//! a buffer rather than a file. Status handling is left to the caller: a
//! fetcher only fails on transport errors.

use std::time::Duration;

use anyhow::Result;
use futures_util::StreamExt;
use tracing::debug;

use crate::errors::LauncherError;

/// Request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// User-Agent header for HTTP requests.
const USER_AGENT: &str = concat!("protoc-launcher/", env!("CARGO_PKG_VERSION"));

/// HTTP status accepted as a successful download.
pub const STATUS_OK: u16 = 200;

/// Response to an archive request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArchive {
    /// HTTP status code of the response.
    pub status: u16,
    /// Response body. Only read for [`STATUS_OK`] responses.
    pub body: Vec<u8>,
}

/// Capability to GET a release archive.
pub trait ArchiveFetcher {
    /// Performs a GET request.
    ///
    /// # Errors
    ///
    /// Returns [`LauncherError::Download`] if the request cannot be sent or the
    /// body cannot be read.
    fn get(&self, url: &str) -> impl Future<Output = Result<FetchedArchive>>;
}

/// Fetcher backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher with the launcher's timeout and User-Agent.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                LauncherError::download_with_source("", "failed to create HTTP client", e)
            })?;
        Ok(Self { client })
    }
}

impl ArchiveFetcher for HttpFetcher {
    async fn get(&self, url: &str) -> Result<FetchedArchive> {
        debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LauncherError::download_with_source(url, "failed to connect", e))?;

        let status = response.status().as_u16();
        if status != STATUS_OK {
            return Ok(FetchedArchive {
                status,
                body: Vec::new(),
            });
        }

        let capacity = response
            .content_length()
            .and_then(|len| usize::try_from(len).ok())
            .unwrap_or(0);
        let mut body = Vec::with_capacity(capacity);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| LauncherError::download_with_source(url, "failed to read body", e))?;
            body.extend_from_slice(&chunk);
        }

        debug!("Downloaded {} bytes from {url}", body.len());
        Ok(FetchedArchive { status, body })
    }
}
