/// One-time code persistence on Postgres
use super::OtpStore;
use crate::error::{AccountError, Result};
use crate::models::{OtpPurpose, OtpRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
struct OtpRow {
    id: Uuid,
    email: String,
    code_hash: String,
    purpose: String,
    reference_hash: Option<String>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OtpRow> for OtpRequest {
    type Error = AccountError;

    fn try_from(row: OtpRow) -> Result<Self> {
        let purpose = OtpPurpose::parse(&row.purpose).ok_or_else(|| {
            AccountError::Database(format!("unknown OTP purpose '{}'", row.purpose))
        })?;

        Ok(OtpRequest {
            id: row.id,
            email: row.email,
            code_hash: row.code_hash,
            purpose,
            reference_hash: row.reference_hash,
            expires_at: row.expires_at,
            created_at: row.created_at,
        })
    }
}

#[derive(Clone)]
pub struct PgOtpStore {
    pool: PgPool,
}

impl PgOtpStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OtpStore for PgOtpStore {
    async fn create(&self, otp: &OtpRequest) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO otp_requests (id, email, code_hash, purpose, reference_hash, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(otp.id)
        .bind(&otp.email)
        .bind(&otp.code_hash)
        .bind(otp.purpose.as_str())
        .bind(&otp.reference_hash)
        .bind(otp.expires_at)
        .bind(otp.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_code(
        &self,
        code_hash: &str,
        purpose: OtpPurpose,
        email: Option<&str>,
    ) -> Result<Option<OtpRequest>> {
        let row = sqlx::query_as::<_, OtpRow>(
            r#"
            SELECT id, email, code_hash, purpose, reference_hash, expires_at, created_at
            FROM otp_requests
            WHERE code_hash = $1 AND purpose = $2 AND ($3::TEXT IS NULL OR email = $3)
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(code_hash)
        .bind(purpose.as_str())
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(OtpRequest::try_from).transpose()
    }

    async fn set_reference(&self, id: Uuid, reference_hash: &str) -> Result<()> {
        sqlx::query("UPDATE otp_requests SET reference_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(reference_hash)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_by_reference(
        &self,
        reference_hash: &str,
        purpose: OtpPurpose,
    ) -> Result<Option<OtpRequest>> {
        let row = sqlx::query_as::<_, OtpRow>(
            r#"
            SELECT id, email, code_hash, purpose, reference_hash, expires_at, created_at
            FROM otp_requests
            WHERE reference_hash = $1 AND purpose = $2
            "#,
        )
        .bind(reference_hash)
        .bind(purpose.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(OtpRequest::try_from).transpose()
    }

    async fn delete_for_email(&self, email: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM otp_requests WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
