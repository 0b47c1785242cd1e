/// Drive file records; the bytes live in external storage
use crate::db::DriveStore;
use crate::error::Result;
use crate::models::{CreateDriveFileRequest, DriveFile, Page, PageParams, RenameDriveFileRequest};
use crate::services::ownership::owned_by;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

pub struct DriveService {
    store: Arc<dyn DriveStore>,
}

impl DriveService {
    pub fn new(store: Arc<dyn DriveStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, owner_id: Uuid, params: &PageParams) -> Result<Page<DriveFile>> {
        self.store.list_by_owner(owner_id, params).await
    }

    pub async fn create(&self, owner_id: Uuid, request: CreateDriveFileRequest) -> Result<DriveFile> {
        request.validate()?;

        let now = Utc::now();
        let file = DriveFile {
            id: Uuid::new_v4(),
            name: request.name.trim().to_string(),
            file_type: request.file_type,
            link: request.link,
            user_id: owner_id,
            created_at: now,
            updated_at: now,
        };
        self.store.create(&file).await?;

        info!(file_id = %file.id, user_id = %owner_id, "drive file created");
        Ok(file)
    }

    pub async fn rename(
        &self,
        caller: Uuid,
        id: Uuid,
        request: RenameDriveFileRequest,
    ) -> Result<DriveFile> {
        request.validate()?;
        let mut file = owned_by(self.store.find_by_id(id).await?, caller)?;

        file.name = request.name.trim().to_string();
        file.updated_at = Utc::now();
        self.store.update(&file).await?;
        Ok(file)
    }

    pub async fn delete(&self, caller: Uuid, id: Uuid) -> Result<()> {
        let file = owned_by(self.store.find_by_id(id).await?, caller)?;
        self.store.delete(file.id).await?;
        info!(file_id = %id, user_id = %caller, "drive file deleted");
        Ok(())
    }
}
