//! Shared fakes for publisher tests.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use postline_core::{DraftId, Identity, PublishJob, UserId, WorkspaceId, job::PUBLISH_JOB_KIND};
use postline_db::{CredentialRepo, DbError, DbResult, DraftRecord, DraftRepo, PlatformCredential};
use postline_publisher::{
    DocumentPlatform, DocumentState, DocumentStatus, MediaError, MediaSource, PlatformError,
    UploadInstruction, UploadSession,
};
use postline_scheduler::QueuedJob;
use std::collections::HashMap;
use std::sync::Mutex;

pub fn identity() -> Identity {
    Identity::new(UserId::from("user-1"), None)
}

/// A claimed queue job carrying a publish payload, for driving the worker
/// directly without a runner.
pub fn claimed_job(owner: &str, draft: &str, attempts: i32, max_attempts: i32) -> QueuedJob {
    QueuedJob {
        id: uuid::Uuid::now_v7(),
        kind: PUBLISH_JOB_KIND.to_string(),
        payload: serde_json::to_value(PublishJob::new(owner.into(), draft.into())).unwrap(),
        run_at: Utc::now(),
        attempts,
        max_attempts,
        backoff_ms: 1_000,
        status: "running".to_string(),
        last_error: None,
        claimed_by: Some("test".to_string()),
        claimed_at: Some(Utc::now()),
        created_at: Utc::now(),
    }
}

pub struct FakeDraftRepo {
    rows: Mutex<HashMap<String, DraftRecord>>,
}

impl FakeDraftRepo {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_draft(self, owner: &str, id: &str, content: &str, media_url: Option<&str>) -> Self {
        let record = DraftRecord {
            id: id.to_string(),
            owner_id: owner.to_string(),
            workspace_id: None,
            name: "Launch post".to_string(),
            content: content.to_string(),
            media_url: media_url.map(String::from),
            status: "saved".to_string(),
            scheduled_for: None,
            time_zone: None,
            document_urn: None,
            download_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.rows.lock().unwrap().insert(id.to_string(), record);
        self
    }

    pub fn set_status(&self, id: &str, status: &str) {
        let mut rows = self.rows.lock().unwrap();
        let row = rows.get_mut(id).unwrap();
        row.status = status.to_string();
        if status == "scheduled" {
            row.scheduled_for = Some(Utc::now() + chrono::Duration::hours(1));
            row.time_zone = Some("UTC".to_string());
        }
    }

    pub fn record(&self, id: &str) -> DraftRecord {
        self.rows.lock().unwrap().get(id).unwrap().clone()
    }

    pub fn status_of(&self, id: &str) -> String {
        self.record(id).status
    }
}

#[async_trait]
impl DraftRepo for FakeDraftRepo {
    async fn get(&self, owner: &UserId, id: &DraftId) -> DbResult<Option<DraftRecord>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(id.as_str())
            .filter(|row| row.owner_id == owner.as_str())
            .cloned())
    }

    async fn upsert(
        &self,
        owner: &UserId,
        workspace: Option<&WorkspaceId>,
        id: &DraftId,
        name: &str,
        content: Option<&str>,
        media_url: Option<&str>,
    ) -> DbResult<DraftRecord> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .entry(id.as_str().to_string())
            .or_insert_with(|| DraftRecord {
                id: id.as_str().to_string(),
                owner_id: owner.as_str().to_string(),
                workspace_id: workspace.map(|w| w.as_str().to_string()),
                name: String::new(),
                content: String::new(),
                media_url: None,
                status: "saved".to_string(),
                scheduled_for: None,
                time_zone: None,
                document_urn: None,
                download_url: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            });
        row.name = name.to_string();
        if let Some(content) = content {
            row.content = content.to_string();
        }
        if let Some(media_url) = media_url {
            row.media_url = Some(media_url.to_string());
        }
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn mark_scheduled(
        &self,
        _owner: &UserId,
        id: &DraftId,
        scheduled_for: DateTime<Utc>,
        time_zone: &str,
        name: &str,
    ) -> DbResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(id.as_str())
            .ok_or_else(|| DbError::NotFound(id.to_string()))?;
        row.status = "scheduled".to_string();
        row.scheduled_for = Some(scheduled_for);
        row.time_zone = Some(time_zone.to_string());
        row.name = name.to_string();
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_in_progress(&self, _owner: &UserId, id: &DraftId) -> DbResult<bool> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(id.as_str()) {
            Some(row) if row.status == "scheduled" || row.status == "progress" => {
                row.status = "progress".to_string();
                row.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_published(
        &self,
        _owner: &UserId,
        id: &DraftId,
        document_urn: &str,
        download_url: Option<&str>,
    ) -> DbResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(id.as_str())
            .ok_or_else(|| DbError::NotFound(id.to_string()))?;
        row.status = "published".to_string();
        row.document_urn = Some(document_urn.to_string());
        row.download_url = download_url.map(String::from);
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_failed(&self, _owner: &UserId, id: &DraftId) -> DbResult<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.get_mut(id.as_str()) {
            if row.status == "progress" {
                row.status = "failed".to_string();
                row.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn clear_schedule(&self, _owner: &UserId, id: &DraftId) -> DbResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(id.as_str())
            .ok_or_else(|| DbError::NotFound(id.to_string()))?;
        if row.status == "scheduled" {
            row.status = "saved".to_string();
        }
        row.scheduled_for = None;
        row.time_zone = None;
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn find_stuck_in_progress(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<DraftRecord>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|row| row.status == "progress" && row.updated_at < cutoff)
            .cloned()
            .collect())
    }
}

pub struct FakeCredentialRepo {
    credential: Option<PlatformCredential>,
}

impl FakeCredentialRepo {
    pub fn connected(owner: &str) -> Self {
        Self {
            credential: Some(PlatformCredential {
                id: uuid::Uuid::now_v7(),
                owner_id: owner.to_string(),
                workspace_id: None,
                access_token: "token-1".to_string(),
                author_urn: "urn:li:person:abc".to_string(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }),
        }
    }

    pub fn disconnected() -> Self {
        Self { credential: None }
    }
}

#[async_trait]
impl CredentialRepo for FakeCredentialRepo {
    async fn resolve(
        &self,
        owner: &UserId,
        _workspace: Option<&WorkspaceId>,
    ) -> DbResult<Option<PlatformCredential>> {
        Ok(self
            .credential
            .clone()
            .filter(|c| c.owner_id == owner.as_str()))
    }
}

#[derive(Default)]
struct MockPlatformState {
    initialize_calls: u32,
    uploaded_chunks: Vec<(usize, usize)>,
    finalized_parts: Option<Vec<String>>,
    polls: u32,
    posts: Vec<String>,
}

/// Scriptable platform double. Splits uploads into `chunk_size` byte
/// ranges and reports `AVAILABLE` after a configured number of polls.
pub struct MockPlatform {
    chunk_size: u64,
    polls_until_available: u32,
    fail_initialize: bool,
    omit_part_ids: bool,
    state: Mutex<MockPlatformState>,
}

impl MockPlatform {
    pub fn new(chunk_size: u64, polls_until_available: u32) -> Self {
        Self {
            chunk_size,
            polls_until_available,
            fail_initialize: false,
            omit_part_ids: false,
            state: Mutex::new(MockPlatformState::default()),
        }
    }

    pub fn failing_initialize(mut self) -> Self {
        self.fail_initialize = true;
        self
    }

    pub fn without_part_ids(mut self) -> Self {
        self.omit_part_ids = true;
        self
    }

    pub fn initialize_calls(&self) -> u32 {
        self.state.lock().unwrap().initialize_calls
    }

    pub fn uploaded_chunks(&self) -> Vec<(usize, usize)> {
        self.state.lock().unwrap().uploaded_chunks.clone()
    }

    pub fn finalized_parts(&self) -> Option<Vec<String>> {
        self.state.lock().unwrap().finalized_parts.clone()
    }

    pub fn posts(&self) -> Vec<String> {
        self.state.lock().unwrap().posts.clone()
    }
}

#[async_trait]
impl DocumentPlatform for MockPlatform {
    async fn initialize_upload(
        &self,
        _access_token: &str,
        _owner_urn: &str,
        file_size_bytes: u64,
    ) -> Result<UploadSession, PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.initialize_calls += 1;
        if self.fail_initialize {
            return Err(PlatformError::Api(
                "initializeUpload failed (500): upstream exploded".to_string(),
            ));
        }

        let mut instructions = Vec::new();
        let mut first = 0;
        let mut index = 0;
        while first < file_size_bytes {
            let last = (first + self.chunk_size - 1).min(file_size_bytes - 1);
            instructions.push(UploadInstruction {
                upload_url: format!("https://upload.example/part/{index}"),
                first_byte: first,
                last_byte: last,
            });
            first = last + 1;
            index += 1;
        }

        Ok(UploadSession {
            document_urn: "urn:li:document:mock-1".to_string(),
            instructions,
        })
    }

    async fn upload_chunk(
        &self,
        _access_token: &str,
        upload_url: &str,
        chunk: Bytes,
    ) -> Result<String, PlatformError> {
        if self.omit_part_ids {
            return Err(PlatformError::MissingPartId);
        }
        let index: usize = upload_url.rsplit('/').next().unwrap().parse().unwrap();
        self.state
            .lock()
            .unwrap()
            .uploaded_chunks
            .push((index, chunk.len()));
        Ok(format!("etag-{index}"))
    }

    async fn finalize_upload(
        &self,
        _access_token: &str,
        _document_urn: &str,
        part_ids: &[String],
    ) -> Result<(), PlatformError> {
        self.state.lock().unwrap().finalized_parts = Some(part_ids.to_vec());
        Ok(())
    }

    async fn get_document(
        &self,
        _access_token: &str,
        _document_urn: &str,
    ) -> Result<DocumentState, PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.polls += 1;
        if state.polls >= self.polls_until_available {
            Ok(DocumentState {
                status: DocumentStatus::Available,
                download_url: Some("https://dl.example/doc.pdf".to_string()),
            })
        } else {
            Ok(DocumentState {
                status: DocumentStatus::Processing,
                download_url: None,
            })
        }
    }

    async fn create_post(
        &self,
        _access_token: &str,
        _author_urn: &str,
        _commentary: &str,
        _title: &str,
        document_urn: &str,
    ) -> Result<String, PlatformError> {
        self.state
            .lock()
            .unwrap()
            .posts
            .push(document_urn.to_string());
        Ok("urn:li:share:123".to_string())
    }
}

/// Fixed in-memory media.
pub struct MemoryMedia {
    bytes: Bytes,
}

impl MemoryMedia {
    pub fn sized(len: usize) -> Self {
        Self {
            bytes: Bytes::from(vec![0x5a; len]),
        }
    }
}

#[async_trait]
impl MediaSource for MemoryMedia {
    async fn content_length(&self, _url: &str) -> Result<u64, MediaError> {
        Ok(self.bytes.len() as u64)
    }

    async fn fetch(&self, _url: &str) -> Result<Bytes, MediaError> {
        Ok(self.bytes.clone())
    }
}
