use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::products::ProductEntity;

/// Catalog lookup used when pricing an order.
#[async_trait]
#[automock]
pub trait ProductProvider {
    async fn find_product_by_id(&self, product_id: Uuid) -> Result<Option<ProductEntity>>;
}
