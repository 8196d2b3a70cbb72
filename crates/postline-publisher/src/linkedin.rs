//! LinkedIn REST client for document uploads and posts.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// One byte range of the upload, with its destination URL.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadInstruction {
    pub upload_url: String,
    pub first_byte: u64,
    pub last_byte: u64,
}

/// An initialized upload session.
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub document_urn: String,
    pub instructions: Vec<UploadInstruction>,
}

/// Processing state of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    Available,
    Processing,
    ProcessingFailed,
}

#[derive(Debug, Clone)]
pub struct DocumentState {
    pub status: DocumentStatus,
    pub download_url: Option<String>,
}

/// The external publishing platform, as the worker sees it.
///
/// One implementation talks to LinkedIn; tests substitute their own.
#[async_trait]
pub trait DocumentPlatform: Send + Sync {
    /// Start an upload session for `file_size_bytes` owned by `owner_urn`.
    async fn initialize_upload(
        &self,
        access_token: &str,
        owner_urn: &str,
        file_size_bytes: u64,
    ) -> Result<UploadSession, PlatformError>;

    /// PUT one chunk; the returned part ID (the response ETag) must be
    /// passed to finalize in byte-range order.
    async fn upload_chunk(
        &self,
        access_token: &str,
        upload_url: &str,
        chunk: Bytes,
    ) -> Result<String, PlatformError>;

    async fn finalize_upload(
        &self,
        access_token: &str,
        document_urn: &str,
        part_ids: &[String],
    ) -> Result<(), PlatformError>;

    async fn get_document(
        &self,
        access_token: &str,
        document_urn: &str,
    ) -> Result<DocumentState, PlatformError>;

    /// Publish the feed post referencing an available document. Returns
    /// the platform's post URN.
    async fn create_post(
        &self,
        access_token: &str,
        author_urn: &str,
        commentary: &str,
        title: &str,
        document_urn: &str,
    ) -> Result<String, PlatformError>;
}

/// LinkedIn API client.
pub struct LinkedInClient {
    client: reqwest::Client,
    base_url: String,
    version: String,
}

impl LinkedInClient {
    pub fn new(base_url: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            version: version.into(),
        }
    }

    fn request(&self, builder: reqwest::RequestBuilder, access_token: &str) -> reqwest::RequestBuilder {
        builder
            .header("Authorization", format!("Bearer {access_token}"))
            .header("LinkedIn-Version", self.version.as_str())
            .header("X-Restli-Protocol-Version", "2.0.0")
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InitializeUploadRequest<'a> {
    owner: &'a str,
    file_size_bytes: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeUploadValue {
    document: String,
    upload_instructions: Vec<UploadInstruction>,
}

#[derive(Debug, Deserialize)]
struct InitializeUploadResponse {
    value: InitializeUploadValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentResponse {
    status: String,
    download_url: Option<String>,
}

#[async_trait]
impl DocumentPlatform for LinkedInClient {
    async fn initialize_upload(
        &self,
        access_token: &str,
        owner_urn: &str,
        file_size_bytes: u64,
    ) -> Result<UploadSession, PlatformError> {
        let url = format!("{}/rest/documents?action=initializeUpload", self.base_url);
        let payload = serde_json::json!({
            "initializeUploadRequest": InitializeUploadRequest {
                owner: owner_urn,
                file_size_bytes,
            }
        });

        let response = self
            .request(self.client.post(&url), access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PlatformError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PlatformError::Api(format!(
                "initializeUpload failed ({status}): {text}"
            )));
        }

        let body: InitializeUploadResponse = response
            .json()
            .await
            .map_err(|e| PlatformError::Parse(e.to_string()))?;

        Ok(UploadSession {
            document_urn: body.value.document,
            instructions: body.value.upload_instructions,
        })
    }

    async fn upload_chunk(
        &self,
        access_token: &str,
        upload_url: &str,
        chunk: Bytes,
    ) -> Result<String, PlatformError> {
        let response = self
            .request(self.client.put(upload_url), access_token)
            .header("Content-Type", "application/octet-stream")
            .body(chunk)
            .send()
            .await
            .map_err(|e| PlatformError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PlatformError::Api(format!(
                "chunk upload failed ({status}): {text}"
            )));
        }

        response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|value| value.to_str().ok())
            .map(String::from)
            .ok_or(PlatformError::MissingPartId)
    }

    async fn finalize_upload(
        &self,
        access_token: &str,
        document_urn: &str,
        part_ids: &[String],
    ) -> Result<(), PlatformError> {
        let url = format!("{}/rest/documents?action=finalizeUpload", self.base_url);
        let payload = serde_json::json!({
            "finalizeUploadRequest": {
                "document": document_urn,
                "uploadToken": "",
                "uploadedPartIds": part_ids,
            }
        });

        let response = self
            .request(self.client.post(&url), access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PlatformError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PlatformError::Api(format!(
                "finalizeUpload failed ({status}): {text}"
            )));
        }
        Ok(())
    }

    async fn get_document(
        &self,
        access_token: &str,
        document_urn: &str,
    ) -> Result<DocumentState, PlatformError> {
        let url = format!(
            "{}/rest/documents/{}",
            self.base_url,
            urlencoding::encode(document_urn)
        );

        let response = self
            .request(self.client.get(&url), access_token)
            .send()
            .await
            .map_err(|e| PlatformError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PlatformError::Api(format!(
                "document lookup failed ({status}): {text}"
            )));
        }

        let body: DocumentResponse = response
            .json()
            .await
            .map_err(|e| PlatformError::Parse(e.to_string()))?;

        let status = match body.status.as_str() {
            "AVAILABLE" => DocumentStatus::Available,
            "PROCESSING_FAILED" => DocumentStatus::ProcessingFailed,
            _ => DocumentStatus::Processing,
        };

        Ok(DocumentState {
            status,
            download_url: body.download_url,
        })
    }

    async fn create_post(
        &self,
        access_token: &str,
        author_urn: &str,
        commentary: &str,
        title: &str,
        document_urn: &str,
    ) -> Result<String, PlatformError> {
        let url = format!("{}/rest/posts", self.base_url);
        let payload = serde_json::json!({
            "author": author_urn,
            "commentary": commentary,
            "visibility": "PUBLIC",
            "distribution": {
                "feedDistribution": "MAIN_FEED",
                "targetEntities": [],
                "thirdPartyDistributionChannels": [],
            },
            "content": {
                "media": {
                    "title": title,
                    "id": document_urn,
                }
            },
            "lifecycleState": "PUBLISHED",
            "isReshareDisabledByAuthor": false,
        });

        let response = self
            .request(self.client.post(&url), access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PlatformError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PlatformError::Api(format!(
                "post creation failed ({status}): {text}"
            )));
        }

        response
            .headers()
            .get("x-restli-id")
            .and_then(|value| value.to_str().ok())
            .map(String::from)
            .ok_or_else(|| PlatformError::Parse("post response missing x-restli-id".to_string()))
    }
}

/// Platform API errors.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("chunk response carried no part identifier")]
    MissingPartId,
}
