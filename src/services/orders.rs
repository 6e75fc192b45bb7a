//! Order lifecycle after conversion: status transitions with their
//! commission and receivable hooks, and value edits.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::db::{self, DbPool};
use crate::entities::{
    accounts_receivable, commission, order, order_item, payment, production_order,
    production_order_item,
};
use crate::errors::ServiceError;
use crate::events::{self, Event, EventSender};
use crate::models::{OrderStatus, StatusMachine};
use crate::money::Money;
use crate::services::commissions::{self, CommissionService};
use crate::services::conversion::ProductionOrderDetails;
use crate::services::locks::LedgerLocks;
use crate::services::receivables;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    #[validate(length(max = 100))]
    pub tracking_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOrderValueRequest {
    pub total_value: Decimal,
}

/// The order with everything that hangs off it.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub production_orders: Vec<ProductionOrderDetails>,
    pub receivable: Option<accounts_receivable::Model>,
    pub payments: Vec<payment::Model>,
    pub commissions: Vec<commission::Model>,
}

async fn find_order<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<order::Model, ServiceError> {
    order::Entity::find_by_id(order_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
}

/// Writes `apply` to the order row only if nobody bumped its version since
/// `order` was read, then returns the fresh row.
async fn guarded_update<C, F>(
    conn: &C,
    order: &order::Model,
    apply: F,
) -> Result<order::Model, ServiceError>
where
    C: ConnectionTrait,
    F: FnOnce(sea_orm::UpdateMany<order::Entity>) -> sea_orm::UpdateMany<order::Entity>,
{
    let update = order::Entity::update_many()
        .col_expr(order::Column::Version, Expr::value(order.version + 1))
        .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(order::Column::Id.eq(order.id))
        .filter(order::Column::Version.eq(order.version));
    let result = apply(update).exec(conn).await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::ConcurrentModification(order.id));
    }
    find_order(conn, order.id).await
}

#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    commissions: CommissionService,
    locks: LedgerLocks,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        commissions: CommissionService,
        locks: LedgerLocks,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db_pool,
            commissions,
            locks,
            event_sender,
        }
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get(&self, order_id: Uuid) -> Result<OrderDetails, ServiceError> {
        let db = &*self.db_pool;
        let order = find_order(db, order_id).await?;

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(db)
            .await?;

        let mut production_orders = Vec::new();
        for production_order in production_order::Entity::find()
            .filter(production_order::Column::OrderId.eq(order_id))
            .order_by_asc(production_order::Column::CreatedAt)
            .all(db)
            .await?
        {
            let items = production_order_item::Entity::find()
                .filter(production_order_item::Column::ProductionOrderId.eq(production_order.id))
                .all(db)
                .await?;
            production_orders.push(ProductionOrderDetails {
                production_order,
                items,
            });
        }

        let receivable = accounts_receivable::Entity::find()
            .filter(accounts_receivable::Column::OrderId.eq(order_id))
            .one(db)
            .await?;
        let payments = payment::Entity::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .order_by_asc(payment::Column::PaidAt)
            .all(db)
            .await?;
        let commissions = commission::Entity::find()
            .filter(commission::Column::OrderId.eq(order_id))
            .order_by_asc(commission::Column::CreatedAt)
            .all(db)
            .await?;

        Ok(OrderDetails {
            order,
            items,
            production_orders,
            receivable,
            payments,
            commissions,
        })
    }

    /// Moves the order through its state machine. Delivery confirms vendor
    /// commissions; cancellation voids every commission and the receivable.
    #[instrument(skip(self, request), fields(order_id = %order_id, status = %request.status))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        request: UpdateOrderStatusRequest,
    ) -> Result<order::Model, ServiceError> {
        request.validate()?;

        let _guard = self.locks.acquire(order_id).await;
        let started = Instant::now();
        let txn = db::begin(&self.db_pool).await?;

        let current = find_order(&txn, order_id).await?;
        let old_status = current.status;
        let next = old_status.transition_to(request.status)?;
        let tracking_code = request.tracking_code.or_else(|| current.tracking_code.clone());

        let updated = guarded_update(&txn, &current, |update| {
            update
                .col_expr(order::Column::Status, Expr::value(next))
                .col_expr(order::Column::TrackingCode, Expr::value(tracking_code))
        })
        .await?;

        match next {
            OrderStatus::Delivered => {
                let confirmed = commissions::confirm_vendor_in(&txn, order_id).await?;
                info!(confirmed, "Vendor commissions confirmed on delivery");
            }
            OrderStatus::Cancelled => {
                let cancelled = commissions::cancel_all_in(&txn, order_id).await?;
                receivables::refresh_for_order(&txn, &updated).await?;
                warn!(cancelled, "Order cancelled, commissions voided");
            }
            _ => {}
        }

        db::commit(txn, started).await?;
        info!(from = %old_status, to = %next, "Order status changed");

        events::publish(
            self.event_sender.as_deref(),
            Event::OrderStatusChanged {
                order_id,
                old_status: old_status.to_string(),
                new_status: next.to_string(),
            },
        )
        .await;

        Ok(updated)
    }

    /// Changes the order's total, then re-derives its receivable and
    /// recomputes its commissions against the new value.
    #[instrument(skip(self), fields(order_id = %order_id, new_total = %new_total))]
    pub async fn update_value(
        &self,
        order_id: Uuid,
        new_total: Decimal,
    ) -> Result<order::Model, ServiceError> {
        if new_total < Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "Order value cannot be negative, got {}",
                new_total
            )));
        }
        let new_total = Money::new(new_total).to_stored();

        let snapshot = find_order(&*self.db_pool, order_id).await?;
        if snapshot.total_value == new_total {
            return Ok(snapshot);
        }
        let ctx = self.commissions.context_for(snapshot.vendor_id).await?;

        let _guard = self.locks.acquire(order_id).await;
        let started = Instant::now();
        let txn = db::begin(&self.db_pool).await?;

        let current = find_order(&txn, order_id).await?;
        if !current.status.accepts_value_changes() {
            return Err(ServiceError::InvalidStatus(format!(
                "Order {} is '{}' and its value can no longer change",
                current.order_number, current.status
            )));
        }
        if current.total_value == new_total {
            return Ok(current);
        }
        let old_total = current.total_value;

        let updated = guarded_update(&txn, &current, |update| {
            update.col_expr(order::Column::TotalValue, Expr::value(new_total))
        })
        .await?;
        receivables::refresh_for_order(&txn, &updated).await?;
        let recomputed = commissions::recompute_in(&txn, &updated, &ctx).await?;

        db::commit(txn, started).await?;
        crate::metrics::COMMISSION_RECALCULATIONS.inc();
        info!(%old_total, commissions = recomputed.len(), "Order value changed");

        events::publish(
            self.event_sender.as_deref(),
            Event::OrderValueChanged {
                order_id,
                old_total,
                new_total,
            },
        )
        .await;

        Ok(updated)
    }
}
