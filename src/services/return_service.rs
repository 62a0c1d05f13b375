use crate::api::error::AppError;
use crate::entities::return_media::MediaType;
use crate::entities::{return_media, return_requests};
use crate::services::storage::StorageService;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set, TransactionTrait};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncRead;
use uuid::Uuid;

/// A media file already written to storage, waiting for its database row.
#[derive(Debug)]
pub struct StagedMedia {
    pub key: String,
    pub media_type: MediaType,
    pub size: i64,
}

pub struct ReturnService {
    db: DatabaseConnection,
    storage: Arc<dyn StorageService>,
}

impl ReturnService {
    pub fn new(db: DatabaseConnection, storage: Arc<dyn StorageService>) -> Self {
        Self { db, storage }
    }

    /// Storage key for a new upload: date-sharded directory plus a fresh
    /// UUID carrying the original extension, lowercased.
    fn build_storage_key(filename: &str) -> String {
        let date = Utc::now().format("%Y/%m/%d");
        let id = Uuid::new_v4();
        match Path::new(filename).extension().and_then(|e| e.to_str()) {
            Some(ext) if !ext.is_empty() => {
                format!("return_media/{}/{}.{}", date, id, ext.to_lowercase())
            }
            _ => format!("return_media/{}/{}", date, id),
        }
    }

    /// Write one uploaded file to storage and classify it. The database row
    /// is created later in [`ReturnService::create_request`], so a request
    /// that fails partway leaves no rows behind.
    pub async fn stage_media<'a>(
        &self,
        original_filename: &str,
        reader: impl AsyncRead + Unpin + Send + 'a,
    ) -> Result<StagedMedia, AppError> {
        let key = Self::build_storage_key(original_filename);
        let saved = self
            .storage
            .save_stream(&key, Box::new(reader))
            .await
            .map_err(|e| AppError::Internal(format!("Storage write failed: {}", e)))?;

        if saved.size == 0 {
            let _ = self.storage.delete_file(&key).await;
            return Err(AppError::field(
                "media_files",
                "The submitted file is empty.",
            ));
        }

        tracing::info!(
            "📎 Staged media {} ({} bytes, {:?})",
            key,
            saved.size,
            MediaType::from_filename(original_filename)
        );

        Ok(StagedMedia {
            key,
            media_type: MediaType::from_filename(original_filename),
            size: saved.size,
        })
    }

    /// Remove staged files after a failed request. Best effort.
    pub async fn discard_staged(&self, staged: &[StagedMedia]) {
        for media in staged {
            if let Err(e) = self.storage.delete_file(&media.key).await {
                tracing::warn!("Failed to remove staged media {}: {}", media.key, e);
            }
        }
    }

    /// Insert the return request and all of its media rows as one unit.
    /// The owner is whatever caller identity the handler passes in; the
    /// request body never carries it. If the transaction fails, the staged
    /// files are removed so storage does not accumulate orphans.
    pub async fn create_request(
        &self,
        user_id: &str,
        barcode: String,
        staged: Vec<StagedMedia>,
    ) -> Result<return_requests::Model, AppError> {
        match self.insert_rows(user_id, barcode, &staged).await {
            Ok(request) => Ok(request),
            Err(e) => {
                self.discard_staged(&staged).await;
                Err(e)
            }
        }
    }

    async fn insert_rows(
        &self,
        user_id: &str,
        barcode: String,
        staged: &[StagedMedia],
    ) -> Result<return_requests::Model, AppError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let request = return_requests::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            user_id: Set(user_id.to_string()),
            barcode: Set(barcode),
            status: Set(return_requests::ReturnStatus::Pending),
            admin_notes: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        for media in staged {
            return_media::ActiveModel {
                id: Set(Uuid::new_v4().to_string()),
                return_request_id: Set(request.id.clone()),
                file: Set(media.key.clone()),
                media_type: Set(media.media_type),
                uploaded_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;

        tracing::info!(
            "📦 Created return request {} for user {} with {} media file(s)",
            request.id,
            user_id,
            staged.len()
        );

        Ok(request)
    }
}
