//! Source media access.

use async_trait::async_trait;
use bytes::Bytes;

/// Where the draft's source asset lives. The worker only needs its size
/// and its bytes.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Size in bytes, from a HEAD request. Zero when the server reports no
    /// length.
    async fn content_length(&self, url: &str) -> Result<u64, MediaError>;

    async fn fetch(&self, url: &str) -> Result<Bytes, MediaError>;
}

/// HTTP-backed media source.
pub struct HttpMediaSource {
    client: reqwest::Client,
}

impl HttpMediaSource {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpMediaSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaSource for HttpMediaSource {
    async fn content_length(&self, url: &str) -> Result<u64, MediaError> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| MediaError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MediaError::Unavailable(response.status().as_u16()));
        }

        Ok(response.content_length().unwrap_or(0))
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, MediaError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MediaError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MediaError::Unavailable(response.status().as_u16()));
        }

        response
            .bytes()
            .await
            .map_err(|e| MediaError::Request(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("media unavailable (status {0})")]
    Unavailable(u16),
}
