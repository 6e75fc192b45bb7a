//! Read-only views over the client, staff and product directories.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{client, product, user};
use crate::errors::ServiceError;
use crate::models::UserRole;

#[async_trait]
pub trait Directory: Send + Sync {
    async fn get_client(&self, id: Uuid) -> Result<Option<client::Model>, ServiceError>;

    async fn get_user(&self, id: Uuid) -> Result<Option<user::Model>, ServiceError>;

    /// Rate in percent when the vendor is commissionable, `None` otherwise.
    /// A commissionable vendor without an explicit rate yields `default_rate`.
    async fn vendor_commission_rate(
        &self,
        vendor_id: Uuid,
        default_rate: Decimal,
    ) -> Result<Option<Decimal>, ServiceError> {
        Ok(self
            .get_user(vendor_id)
            .await?
            .filter(|u| u.active && u.commissionable)
            .map(|u| u.commission_rate.unwrap_or(default_rate)))
    }

    /// Active partners, ordered by id so the pool split is deterministic.
    async fn list_active_partners(&self) -> Result<Vec<user::Model>, ServiceError>;
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_product(&self, id: Uuid) -> Result<Option<product::Model>, ServiceError>;
}

/// Directory and catalog backed by the application database.
#[derive(Clone)]
pub struct DbDirectory {
    db: Arc<DbPool>,
}

impl DbDirectory {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Directory for DbDirectory {
    async fn get_client(&self, id: Uuid) -> Result<Option<client::Model>, ServiceError> {
        Ok(client::Entity::find_by_id(id).one(&*self.db).await?)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<user::Model>, ServiceError> {
        Ok(user::Entity::find_by_id(id).one(&*self.db).await?)
    }

    async fn list_active_partners(&self) -> Result<Vec<user::Model>, ServiceError> {
        Ok(user::Entity::find()
            .filter(user::Column::Role.eq(UserRole::Partner))
            .filter(user::Column::Active.eq(true))
            .order_by_asc(user::Column::Id)
            .all(&*self.db)
            .await?)
    }
}

#[async_trait]
impl Catalog for DbDirectory {
    async fn get_product(&self, id: Uuid) -> Result<Option<product::Model>, ServiceError> {
        Ok(product::Entity::find_by_id(id).one(&*self.db).await?)
    }
}
