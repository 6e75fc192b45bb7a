use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{BudgetStatus, DeliveryType, DiscountType};

/// The `budgets` table: a priced commercial proposal owned by a vendor.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "budgets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Human-readable `BUD-YYMM-xxxxxx` number.
    #[sea_orm(unique)]
    pub budget_number: String,

    pub vendor_id: Uuid,
    /// Budgets may stay client-less until conversion.
    pub client_id: Option<Uuid>,

    pub contact_name: String,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub contact_address: Option<String>,

    pub status: BudgetStatus,

    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    /// Set when an administrator lifted the minimum-price clamp.
    pub discount_authorized: bool,
    pub authorized_by: Option<Uuid>,
    pub authorized_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,

    pub delivery_type: DeliveryType,
    pub shipping_cost: Decimal,

    pub items_subtotal: Decimal,
    pub minimum_total: Decimal,
    pub discount_amount: Decimal,
    pub interest_amount: Decimal,
    pub total: Decimal,

    pub notes: Option<String>,
    pub converted_order_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::budget_item::Entity")]
    Items,
    #[sea_orm(has_one = "super::budget_payment::Entity")]
    Payment,
}

impl Related<super::budget_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::budget_payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payment.def()
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
