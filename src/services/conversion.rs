//! Turns an approved budget into an order, its receivable, one production
//! order per external producer and the order's commissions, atomically.

use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::{self, DbPool};
use crate::directory::Directory;
use crate::entities::{
    accounts_receivable, budget, budget_item, commission, order, order_item,
    production_order, production_order_item,
};
use crate::errors::ServiceError;
use crate::events::{self, Event, EventSender};
use crate::metrics;
use crate::models::{BudgetStatus, OrderStatus};
use crate::money::Money;
use crate::services::budgets::load_details;
use crate::services::commissions::{self, CommissionService};
use crate::services::receivables;
use crate::services::sequence;

pub const PRODUCTION_PENDING: &str = "pending";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvertBudgetRequest {
    /// Overrides the client captured on the budget.
    pub client_id: Option<Uuid>,
    pub delivery_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductionOrderDetails {
    pub production_order: production_order::Model,
    pub items: Vec<production_order_item::Model>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvertedOrder {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub production_orders: Vec<ProductionOrderDetails>,
    pub receivable: accounts_receivable::Model,
    pub commissions: Vec<commission::Model>,
}

/// Groups lines by external producer, keeping line order within each group.
/// Internal and unassigned lines are never sent to a producer.
pub fn partition_by_producer(
    items: &[budget_item::Model],
) -> Result<BTreeMap<Uuid, Vec<&budget_item::Model>>, ServiceError> {
    let mut groups: BTreeMap<Uuid, Vec<&budget_item::Model>> = BTreeMap::new();
    for item in items {
        if let Some(producer_id) = item.producer()?.and_then(|p| p.external_id()) {
            groups.entry(producer_id).or_default().push(item);
        }
    }
    Ok(groups)
}

fn precondition(budget: &budget::Model) -> Result<(), ServiceError> {
    match budget.status {
        BudgetStatus::Converted => Err(ServiceError::ConversionConflict(format!(
            "Budget {} is already converted",
            budget.budget_number
        ))),
        status if !status.is_convertible() => Err(ServiceError::NotApproved(format!(
            "Budget {} is '{}'",
            budget.budget_number, status
        ))),
        _ => Ok(()),
    }
}

#[derive(Clone)]
pub struct ConversionService {
    db_pool: Arc<DbPool>,
    directory: Arc<dyn Directory>,
    commissions: CommissionService,
    config: Arc<AppConfig>,
    event_sender: Option<Arc<EventSender>>,
}

impl ConversionService {
    pub fn new(
        db_pool: Arc<DbPool>,
        directory: Arc<dyn Directory>,
        commissions: CommissionService,
        config: Arc<AppConfig>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db_pool,
            directory,
            commissions,
            config,
            event_sender,
        }
    }

    /// Converts `budget_id`. Fails with `NotApproved`, `ClientRequired` or
    /// `ConversionConflict`; on any failure nothing is written.
    #[instrument(skip(self, request), fields(budget_id = %budget_id))]
    pub async fn convert(
        &self,
        budget_id: Uuid,
        request: ConvertBudgetRequest,
    ) -> Result<ConvertedOrder, ServiceError> {
        let result = self.convert_inner(budget_id, request).await;
        let outcome = match &result {
            Ok(_) => "converted",
            Err(ServiceError::ConversionConflict(_)) => "conflict",
            Err(ServiceError::NotApproved(_)) => "not_approved",
            Err(ServiceError::ClientRequired(_)) => "client_required",
            Err(_) => "failed",
        };
        metrics::CONVERSIONS.with_label_values(&[outcome]).inc();
        result
    }

    async fn convert_inner(
        &self,
        budget_id: Uuid,
        request: ConvertBudgetRequest,
    ) -> Result<ConvertedOrder, ServiceError> {
        // Directory reads happen before the transaction opens.
        let snapshot = budget::Entity::find_by_id(budget_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Budget {} not found", budget_id)))?;
        precondition(&snapshot)?;

        let client_id = request
            .client_id
            .or(snapshot.client_id)
            .ok_or(ServiceError::ClientRequired(budget_id))?;
        let client = self.directory.get_client(client_id).await?.ok_or_else(|| {
            warn!(%client_id, "Conversion client does not exist");
            ServiceError::NotFound(format!("Client {} not found", client_id))
        })?;
        let ctx = self.commissions.context_for(snapshot.vendor_id).await?;

        let started = Instant::now();
        let txn = db::begin(&self.db_pool).await?;

        let (budget, items, terms) = load_details(&txn, budget_id).await?;
        precondition(&budget)?;

        // The status-guarded update is the exclusive gate: only one caller
        // can move the budget out of an approved state.
        let gate = budget::Entity::update_many()
            .col_expr(budget::Column::Status, Expr::value(BudgetStatus::Converted))
            .col_expr(budget::Column::ClientId, Expr::value(client.id))
            .col_expr(budget::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(budget::Column::Id.eq(budget_id))
            .filter(
                budget::Column::Status.is_in([BudgetStatus::Approved, BudgetStatus::AdminApproved]),
            )
            .exec(&txn)
            .await?;
        if gate.rows_affected == 0 {
            return Err(ServiceError::ConversionConflict(format!(
                "Budget {} was converted concurrently",
                budget.budget_number
            )));
        }

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let txn_ref = &txn;
        let (budget_ref, terms_ref, client_ref) = (&budget, &terms, &client);
        let delivery_date = request.delivery_date;

        let order = sequence::retry_on_collision(
            "order",
            self.config.sequence_max_attempts,
            |attempt| async move {
                let number = sequence::next_order_number(txn_ref, now, attempt).await?;
                let active = order::ActiveModel {
                    id: Set(order_id),
                    order_number: Set(number),
                    budget_id: Set(budget_ref.id),
                    vendor_id: Set(budget_ref.vendor_id),
                    client_id: Set(client_ref.id),
                    client_name: Set(client_ref.name.clone()),
                    client_phone: Set(client_ref.phone.clone()),
                    client_email: Set(client_ref.email.clone()),
                    client_address: Set(client_ref.address.clone()),
                    status: Set(OrderStatus::Pending),
                    items_subtotal: Set(budget_ref.items_subtotal),
                    discount_type: Set(budget_ref.discount_type),
                    discount_value: Set(budget_ref.discount_value),
                    discount_amount: Set(budget_ref.discount_amount),
                    delivery_type: Set(budget_ref.delivery_type),
                    shipping_cost: Set(budget_ref.shipping_cost),
                    payment_method: Set(terms_ref.payment_method),
                    installments: Set(terms_ref.installments),
                    interest_amount: Set(budget_ref.interest_amount),
                    down_payment: Set(terms_ref.down_payment),
                    total_value: Set(budget_ref.total),
                    paid_value: Set(Money::ZERO.to_stored()),
                    delivery_date: Set(delivery_date),
                    tracking_code: Set(None),
                    notes: Set(budget_ref.notes.clone()),
                    version: Set(1),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                sequence::insert_numbered(txn_ref, active).await
            },
        )
        .await?;

        let order_items = copy_items(&txn, order.id, &items).await?;
        let receivable = receivables::seed_for_order(&txn, &order).await?;
        let production_orders =
            create_production_orders(&txn, order.id, &items, delivery_date).await?;
        let commissions =
            commissions::create_in(&txn, order.id, Money::new(order.total_value), &ctx).await?;

        let mut converted: budget::ActiveModel = budget.into();
        converted.status = Set(BudgetStatus::Converted);
        converted.client_id = Set(Some(client.id));
        converted.converted_order_id = Set(Some(order.id));
        converted.update(&txn).await?;

        db::commit(txn, started).await.map_err(|e| {
            error!(error = %e, "Failed to commit budget conversion");
            e
        })?;

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            production_orders = production_orders.len(),
            commissions = commissions.len(),
            "Budget converted"
        );

        events::publish(self.event_sender.as_deref(), Event::OrderCreated(order.id)).await;
        events::publish(
            self.event_sender.as_deref(),
            Event::BudgetConverted {
                budget_id,
                order_id: order.id,
                production_orders: production_orders.len(),
            },
        )
        .await;

        Ok(ConvertedOrder {
            order,
            items: order_items,
            production_orders,
            receivable,
            commissions,
        })
    }
}

async fn copy_items<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    items: &[budget_item::Model],
) -> Result<Vec<order_item::Model>, ServiceError> {
    let mut copied = Vec::with_capacity(items.len());
    for item in items {
        let row = order_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            budget_item_id: Set(item.id),
            product_id: Set(item.product_id),
            product_name: Set(item.product_name.clone()),
            producer_ref: Set(item.producer_ref.clone()),
            quantity: Set(item.quantity),
            unit_price: Set(item.unit_price),
            customization_value: Set(item.customization_value),
            customization_description: Set(item.customization_description.clone()),
            discount_amount: Set(item.discount_amount),
            total_price: Set(item.total_price),
        }
        .insert(conn)
        .await?;
        copied.push(row);
    }
    Ok(copied)
}

async fn create_production_orders<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    items: &[budget_item::Model],
    deadline: Option<DateTime<Utc>>,
) -> Result<Vec<ProductionOrderDetails>, ServiceError> {
    let mut created = Vec::new();
    for (producer_id, lines) in partition_by_producer(items)? {
        let production_order = production_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            producer_id: Set(producer_id),
            status: Set(PRODUCTION_PENDING.to_string()),
            deadline: Set(deadline),
            created_at: Set(Utc::now()),
        }
        .insert(conn)
        .await?;

        let mut rows = Vec::with_capacity(lines.len());
        for line in lines {
            let row = production_order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                production_order_id: Set(production_order.id),
                budget_item_id: Set(line.id),
                product_id: Set(line.product_id),
                product_name: Set(line.product_name.clone()),
                quantity: Set(line.quantity),
                customization_value: Set(line.customization_value),
                customization_description: Set(line.customization_description.clone()),
                width: Set(line.width),
                height: Set(line.height),
                depth: Set(line.depth),
            }
            .insert(conn)
            .await?;
            rows.push(row);
        }

        created.push(ProductionOrderDetails {
            production_order,
            items: rows,
        });
    }
    Ok(created)
}
