/// Product catalog persistence on Postgres
use super::ProductStore;
use crate::error::Result;
use crate::models::{Page, PageParams, Product};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

const PRODUCT_COLUMNS: &str =
    "id, title, description, image, price, is_enable, user_id, created_at, updated_at";

#[derive(Clone)]
pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn create(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, title, description, image, price, is_enable, user_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(product.id)
        .bind(&product.title)
        .bind(&product.description)
        .bind(&product.image)
        .bind(product.price)
        .bind(product.is_enable)
        .bind(product.user_id)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    async fn list_enabled(&self, params: &PageParams) -> Result<Page<Product>> {
        let pattern = params.search_term().map(|s| format!("%{s}%"));

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE is_enable AND ($1::TEXT IS NULL OR title ILIKE $1)",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_enable AND ($1::TEXT IS NULL OR title ILIKE $1) \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        );
        let items = sqlx::query_as::<_, Product>(&sql)
            .bind(&pattern)
            .bind(i64::from(params.per_page()))
            .bind(params.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(items, total, params))
    }

    async fn list_by_owner(&self, owner_id: Uuid, params: &PageParams) -> Result<Page<Product>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE user_id = $1")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE user_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        );
        let items = sqlx::query_as::<_, Product>(&sql)
            .bind(owner_id)
            .bind(i64::from(params.per_page()))
            .bind(params.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(items, total, params))
    }

    async fn update(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE products
            SET title = $2, description = $3, image = $4, price = $5, is_enable = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(product.id)
        .bind(&product.title)
        .bind(&product.description)
        .bind(&product.image)
        .bind(product.price)
        .bind(product.is_enable)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
