/// User and profile persistence on Postgres
use super::CredentialStore;
use crate::error::{AccountError, Result};
use crate::models::{Page, PageParams, ProfileStatus, User, UserProfile};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const USER_COLUMNS: &str = r#"
    u.id, u.username, u.email, u.first_name, u.last_name, u.password_hash,
    u.is_verified, u.verification_code, u.verified_at, u.is_staff, u.is_superuser,
    u.last_login_at, u.last_login_ip, u.created_at, u.updated_at, u.deleted_at,
    p.phone, p.photo, p.role, p.status, p.birthday
"#;

/// Joined users + user_profiles row
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    password_hash: String,
    is_verified: bool,
    verification_code: Option<String>,
    verified_at: Option<DateTime<Utc>>,
    is_staff: bool,
    is_superuser: bool,
    last_login_at: Option<DateTime<Utc>>,
    last_login_ip: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
    phone: Option<String>,
    photo: Option<String>,
    role: String,
    status: i16,
    birthday: Option<NaiveDate>,
}

impl TryFrom<UserRow> for User {
    type Error = AccountError;

    fn try_from(row: UserRow) -> Result<Self> {
        let status = ProfileStatus::from_i16(row.status).ok_or_else(|| {
            AccountError::Database(format!("unknown profile status {} for user {}", row.status, row.id))
        })?;

        Ok(User {
            id: row.id,
            username: row.username,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            password_hash: row.password_hash,
            is_verified: row.is_verified,
            verification_code: row.verification_code,
            verified_at: row.verified_at,
            is_staff: row.is_staff,
            is_superuser: row.is_superuser,
            last_login_at: row.last_login_at,
            last_login_ip: row.last_login_ip,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
            profile: UserProfile {
                phone: row.phone,
                photo: row.photo,
                role: row.role,
                status,
                birthday: row.birthday,
            },
        })
    }
}

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(&self, predicate: &str, value: &str) -> Result<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u JOIN user_profiles p ON p.user_id = u.id WHERE {predicate}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        row.map(User::try_from).transpose()
    }

    async fn fetch_by_id(&self, id: Uuid, include_deleted: bool) -> Result<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u JOIN user_profiles p ON p.user_id = u.id \
             WHERE u.id = $1 AND ($2 OR u.deleted_at IS NULL)"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(include_deleted)
            .fetch_optional(&self.pool)
            .await?;

        row.map(User::try_from).transpose()
    }
}

fn map_unique_violation(err: sqlx::Error) -> AccountError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let constraint = db_err.constraint().unwrap_or_default();
            return if constraint.contains("username") {
                AccountError::Conflict("Username already exists".to_string())
            } else {
                AccountError::Conflict("Email already exists".to_string())
            };
        }
    }
    AccountError::from(err)
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.fetch_one_where("u.email = $1 AND u.deleted_at IS NULL", email)
            .await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        self.fetch_one_where("u.username = $1 AND u.deleted_at IS NULL", username)
            .await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.fetch_by_id(id, false).await
    }

    async fn find_any_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.fetch_by_id(id, true).await
    }

    async fn find_by_verification_code(&self, code_hash: &str) -> Result<Option<User>> {
        self.fetch_one_where("u.verification_code = $1 AND u.deleted_at IS NULL", code_hash)
            .await
    }

    async fn find_deleted_by_email(&self, email: &str) -> Result<Option<User>> {
        self.fetch_one_where(
            "u.email = $1 AND u.deleted_at IS NOT NULL ORDER BY u.deleted_at DESC LIMIT 1",
            email,
        )
        .await
    }

    async fn create(&self, user: &User) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, email, first_name, last_name, password_hash,
                is_verified, verification_code, verified_at, is_staff, is_superuser,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .bind(user.is_verified)
        .bind(&user.verification_code)
        .bind(user.verified_at)
        .bind(user.is_staff)
        .bind(user.is_superuser)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        sqlx::query(
            r#"
            INSERT INTO user_profiles (user_id, phone, photo, role, status, birthday)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id)
        .bind(&user.profile.phone)
        .bind(&user.profile.photo)
        .bind(&user.profile.role)
        .bind(user.profile.status.as_i16())
        .bind(user.profile.birthday)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn save(&self, user: &User) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE users
            SET username = $2, email = $3, first_name = $4, last_name = $5, password_hash = $6,
                is_verified = $7, verification_code = $8, verified_at = $9,
                is_staff = $10, is_superuser = $11, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .bind(user.is_verified)
        .bind(&user.verification_code)
        .bind(user.verified_at)
        .bind(user.is_staff)
        .bind(user.is_superuser)
        .execute(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        sqlx::query(
            r#"
            UPDATE user_profiles
            SET phone = $2, photo = $3, role = $4, status = $5, birthday = $6
            WHERE user_id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.profile.phone)
        .bind(&user.profile.photo)
        .bind(&user.profile.role)
        .bind(user.profile.status.as_i16())
        .bind(user.profile.birthday)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>, ip: Option<String>) -> Result<()> {
        sqlx::query("UPDATE users SET last_login_at = $2, last_login_ip = $3 WHERE id = $1")
            .bind(id)
            .bind(at)
            .bind(ip)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn soft_delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AccountError::UserNotFound);
        }
        Ok(())
    }

    async fn restore(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET deleted_at = NULL, updated_at = NOW() WHERE id = $1 AND deleted_at IS NOT NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        if result.rows_affected() == 0 {
            return Err(AccountError::UserNotFound);
        }
        Ok(())
    }

    async fn permanent_delete(&self, id: Uuid) -> Result<()> {
        // Profile, products and drive files cascade
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AccountError::UserNotFound);
        }
        Ok(())
    }

    async fn list(&self, params: &PageParams) -> Result<Page<User>> {
        let pattern = params.search_term().map(|s| format!("%{s}%"));

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users u WHERE ($1::TEXT IS NULL OR u.username ILIKE $1 OR u.email ILIKE $1)",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u JOIN user_profiles p ON p.user_id = u.id \
             WHERE ($1::TEXT IS NULL OR u.username ILIKE $1 OR u.email ILIKE $1) \
             ORDER BY u.created_at DESC LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&pattern)
            .bind(i64::from(params.per_page()))
            .bind(params.offset())
            .fetch_all(&self.pool)
            .await?;

        let users = rows
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page::new(users, total, params))
    }
}
