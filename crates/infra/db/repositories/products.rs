use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{entities::products::ProductEntity, repositories::products::ProductProvider},
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::products},
};

pub struct ProductPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl ProductPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ProductProvider for ProductPostgres {
    async fn find_product_by_id(&self, product_id: Uuid) -> Result<Option<ProductEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let product = products::table
            .find(product_id)
            .select(ProductEntity::as_select())
            .first::<ProductEntity>(&mut conn)
            .optional()?;

        Ok(product)
    }
}
