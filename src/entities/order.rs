use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{DeliveryType, DiscountType, OrderStatus, PaymentMethod};

/// The `orders` table: the canonical commitment materialized from a budget.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Human-readable `PED-YYMM-xxxxxx` number.
    #[sea_orm(unique)]
    pub order_number: String,

    /// At most one order per budget.
    #[sea_orm(unique)]
    pub budget_id: Uuid,

    pub vendor_id: Uuid,
    pub client_id: Uuid,
    pub client_name: String,
    pub client_phone: Option<String>,
    pub client_email: Option<String>,
    pub client_address: Option<String>,

    pub status: OrderStatus,

    pub items_subtotal: Decimal,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub discount_amount: Decimal,
    pub delivery_type: DeliveryType,
    pub shipping_cost: Decimal,
    pub payment_method: PaymentMethod,
    pub installments: i32,
    pub interest_amount: Decimal,
    pub down_payment: Decimal,

    pub total_value: Decimal,
    /// Sum of confirmed payments, written only by the ledger.
    pub paid_value: Decimal,

    pub delivery_date: Option<DateTime<Utc>>,
    pub tracking_code: Option<String>,
    pub notes: Option<String>,

    /// Optimistic concurrency token.
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    Items,
    #[sea_orm(has_many = "super::production_order::Entity")]
    ProductionOrders,
    #[sea_orm(has_many = "super::commission::Entity")]
    Commissions,
    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::production_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductionOrders.def()
    }
}

impl Related<super::commission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Commissions.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();
        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }
        active_model.updated_at = Set(now);
        Ok(active_model)
    }
}
