/// Drive file records on Postgres
use super::DriveStore;
use crate::error::{AccountError, Result};
use crate::models::{DriveFile, FileType, Page, PageParams};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
struct DriveRow {
    id: Uuid,
    name: String,
    file_type: String,
    link: String,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DriveRow> for DriveFile {
    type Error = AccountError;

    fn try_from(row: DriveRow) -> Result<Self> {
        let file_type = FileType::from_code(&row.file_type).ok_or_else(|| {
            AccountError::Database(format!("unknown file type '{}'", row.file_type))
        })?;

        Ok(DriveFile {
            id: row.id,
            name: row.name,
            file_type,
            link: row.link,
            user_id: row.user_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct PgDriveStore {
    pool: PgPool,
}

impl PgDriveStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DriveStore for PgDriveStore {
    async fn create(&self, file: &DriveFile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO drive_files (id, name, file_type, link, user_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(file.id)
        .bind(&file.name)
        .bind(file.file_type.code())
        .bind(&file.link)
        .bind(file.user_id)
        .bind(file.created_at)
        .bind(file.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<DriveFile>> {
        let row = sqlx::query_as::<_, DriveRow>(
            "SELECT id, name, file_type, link, user_id, created_at, updated_at FROM drive_files WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(DriveFile::try_from).transpose()
    }

    async fn list_by_owner(&self, owner_id: Uuid, params: &PageParams) -> Result<Page<DriveFile>> {
        let pattern = params.search_term().map(|s| format!("%{s}%"));

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM drive_files WHERE user_id = $1 AND ($2::TEXT IS NULL OR name ILIKE $2)",
        )
        .bind(owner_id)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, DriveRow>(
            r#"
            SELECT id, name, file_type, link, user_id, created_at, updated_at
            FROM drive_files
            WHERE user_id = $1 AND ($2::TEXT IS NULL OR name ILIKE $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(owner_id)
        .bind(&pattern)
        .bind(i64::from(params.per_page()))
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(DriveFile::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page::new(items, total, params))
    }

    async fn update(&self, file: &DriveFile) -> Result<()> {
        sqlx::query("UPDATE drive_files SET name = $2, link = $3, updated_at = $4 WHERE id = $1")
            .bind(file.id)
            .bind(&file.name)
            .bind(&file.link)
            .bind(file.updated_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM drive_files WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
