use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    /// Price in cents
    pub price: i64,
    pub is_enable: bool,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 4, max = 255, message = "must be between 4 and 255 characters"))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    #[validate(url(message = "must be a valid URL"))]
    pub image: Option<String>,
    #[validate(range(min = 0, message = "must not be negative"))]
    pub price: i64,
    #[serde(default = "default_enabled")]
    pub is_enable: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 4, max = 255, message = "must be between 4 and 255 characters"))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(url(message = "must be a valid URL"))]
    pub image: Option<String>,
    #[validate(range(min = 0, message = "must not be negative"))]
    pub price: Option<i64>,
    pub is_enable: Option<bool>,
}

fn default_enabled() -> bool {
    true
}
