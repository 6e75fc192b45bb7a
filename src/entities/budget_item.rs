use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{DiscountType, PriceSource, ProducerRef};

/// The `budget_items` table: one priced product line of a budget.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "budget_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub budget_id: Uuid,
    pub position: i32,

    pub product_id: Uuid,
    pub product_name: String,
    /// `internal`, a producer uuid, or null when unassigned.
    pub producer_ref: Option<String>,

    pub quantity: i32,
    pub unit_cost: Decimal,
    pub customization_value: Decimal,
    pub customization_description: Option<String>,
    pub general_customization_value: Decimal,

    pub price_source: PriceSource,
    pub unit_price: Decimal,
    pub minimum_price: Decimal,
    pub base_price_with_margin: Decimal,
    pub below_minimum: bool,

    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub discount_amount: Decimal,
    pub total_price: Decimal,

    pub width: Option<Decimal>,
    pub height: Option<Decimal>,
    pub depth: Option<Decimal>,

    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn producer(&self) -> Result<Option<ProducerRef>, ServiceError> {
        ProducerRef::from_column(self.producer_ref.as_deref())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::budget::Entity",
        from = "Column::BudgetId",
        to = "super::budget::Column::Id",
        on_delete = "Cascade"
    )]
    Budget,
}

impl Related<super::budget::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Budget.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
