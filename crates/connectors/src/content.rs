//! Remote content resolution.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use inbox_core::ContentRef;
use tracing::debug;

use crate::config::FetchConfig;
use crate::error::{ConnectorError, ConnectorResult};

/// Read a response body, giving up as soon as it grows past `max_bytes`.
///
/// A `Content-Length` over the limit is rejected before any body is read;
/// chunked bodies are counted as they arrive.
pub(crate) async fn read_capped(
    mut response: reqwest::Response,
    max_bytes: usize,
    timeout: Duration,
    wrap: fn(String) -> ConnectorError,
) -> ConnectorResult<Bytes> {
    let too_large = |size: u64| wrap(format!("body is {} bytes, limit is {}", size, max_bytes));

    let declared = response.content_length();
    if let Some(len) = declared {
        if len > max_bytes as u64 {
            return Err(too_large(len));
        }
    }

    let mut body = BytesMut::with_capacity(declared.unwrap_or(0) as usize);
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| ConnectorError::from_http(e, timeout, wrap))?
    {
        let received = body.len() + chunk.len();
        if received > max_bytes {
            return Err(wrap(format!(
                "body exceeds {} byte limit after {} bytes",
                max_bytes, received
            )));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

/// Resolves a content reference to raw bytes.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, reference: &ContentRef) -> ConnectorResult<Bytes>;
}

/// Downloads `http(s)://` references.
pub struct HttpContentFetcher {
    client: reqwest::Client,
    max_bytes: usize,
    timeout: Duration,
}

impl HttpContentFetcher {
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            max_bytes: config.max_bytes,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn parse_ref(reference: &ContentRef) -> ConnectorResult<url::Url> {
        let parsed = url::Url::parse(reference.as_str()).map_err(|e| {
            ConnectorError::ContentUnavailable(format!("invalid reference {}: {}", reference, e))
        })?;
        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            scheme => Err(ConnectorError::ContentUnavailable(format!(
                "unsupported reference scheme: {}",
                scheme
            ))),
        }
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch(&self, reference: &ContentRef) -> ConnectorResult<Bytes> {
        let url = Self::parse_ref(reference)?;
        let timeout = self.timeout;

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| ConnectorError::from_http(e, timeout, ConnectorError::ContentUnavailable))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConnectorError::ContentUnavailable(format!(
                "download returned {}",
                status
            )));
        }

        let body = read_capped(
            response,
            self.max_bytes,
            timeout,
            ConnectorError::ContentUnavailable,
        )
        .await?;

        debug!(bytes = body.len(), "Content fetched");
        Ok(body)
    }
}
