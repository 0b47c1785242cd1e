/// Product catalogue use cases
use crate::db::ProductStore;
use crate::error::Result;
use crate::models::{CreateProductRequest, Page, PageParams, Product, UpdateProductRequest};
use crate::services::ownership::{found, owned_by};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

pub struct ProductService {
    store: Arc<dyn ProductStore>,
}

impl ProductService {
    pub fn new(store: Arc<dyn ProductStore>) -> Self {
        Self { store }
    }

    /// Enabled products, visible to everyone
    pub async fn list(&self, params: &PageParams) -> Result<Page<Product>> {
        self.store.list_enabled(params).await
    }

    pub async fn list_mine(&self, owner_id: Uuid, params: &PageParams) -> Result<Page<Product>> {
        self.store.list_by_owner(owner_id, params).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Product> {
        found(self.store.find_by_id(id).await?)
    }

    pub async fn create(&self, owner_id: Uuid, request: CreateProductRequest) -> Result<Product> {
        request.validate()?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            title: request.title.trim().to_string(),
            description: request.description,
            image: request.image,
            price: request.price,
            is_enable: request.is_enable,
            user_id: owner_id,
            created_at: now,
            updated_at: now,
        };
        self.store.create(&product).await?;

        info!(product_id = %product.id, user_id = %owner_id, "product created");
        Ok(product)
    }

    pub async fn update(
        &self,
        caller: Uuid,
        id: Uuid,
        request: UpdateProductRequest,
    ) -> Result<Product> {
        request.validate()?;
        let mut product = owned_by(self.store.find_by_id(id).await?, caller)?;

        if let Some(title) = request.title {
            product.title = title.trim().to_string();
        }
        if let Some(description) = request.description {
            product.description = description;
        }
        if let Some(image) = request.image {
            product.image = Some(image);
        }
        if let Some(price) = request.price {
            product.price = price;
        }
        if let Some(is_enable) = request.is_enable {
            product.is_enable = is_enable;
        }
        product.updated_at = Utc::now();

        self.store.update(&product).await?;
        Ok(product)
    }

    pub async fn delete(&self, caller: Uuid, id: Uuid) -> Result<()> {
        let product = owned_by(self.store.find_by_id(id).await?, caller)?;
        self.store.delete(product.id).await?;
        info!(product_id = %id, user_id = %caller, "product deleted");
        Ok(())
    }
}
