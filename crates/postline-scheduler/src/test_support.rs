//! In-memory draft repository for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use postline_core::{DraftId, UserId, WorkspaceId};
use postline_db::{DbError, DbResult, DraftRecord, DraftRepo};
use std::collections::HashMap;
use std::sync::Mutex;

pub struct FakeDraftRepo {
    rows: Mutex<HashMap<String, DraftRecord>>,
}

impl FakeDraftRepo {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_draft(self, owner: &str, id: &str, content: &str) -> Self {
        let record = DraftRecord {
            id: id.to_string(),
            owner_id: owner.to_string(),
            workspace_id: None,
            name: String::new(),
            content: content.to_string(),
            media_url: None,
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

    pub fn set_status(&self, id: &str, status: &str, updated_at: DateTime<Utc>) {
        let mut rows = self.rows.lock().unwrap();
        let row = rows.get_mut(id).unwrap();
        row.status = status.to_string();
        row.updated_at = updated_at;
    }

    pub fn status_of(&self, id: &str) -> String {
        self.rows.lock().unwrap().get(id).unwrap().status.clone()
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
