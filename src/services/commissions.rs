//! Vendor and partner commissions derived from the realized order value.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::CommissionConfig;
use crate::db::{self, DbPool};
use crate::directory::Directory;
use crate::entities::{commission, order};
use crate::errors::ServiceError;
use crate::events::{self, Event, EventSender};
use crate::metrics;
use crate::models::{CommissionStatus, CommissionType, StatusMachine};
use crate::money::Money;
use crate::services::locks::LedgerLocks;

/// Directory facts resolved ahead of the transaction that writes commissions.
#[derive(Clone, Debug, PartialEq)]
pub struct CommissionContext {
    pub vendor_id: Uuid,
    /// `None` when the vendor is not commissionable.
    pub vendor_rate: Option<Decimal>,
    pub partner_ids: Vec<Uuid>,
    pub partner_pool_rate: Decimal,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CommissionPlan {
    pub payee_id: Uuid,
    pub kind: CommissionType,
    pub percentage: Decimal,
    pub status: CommissionStatus,
}

/// Vendors are paid on delivery; partners split the pool equally and are
/// confirmed immediately.
pub fn plan_commissions(ctx: &CommissionContext) -> Vec<CommissionPlan> {
    let mut plans = Vec::with_capacity(ctx.partner_ids.len() + 1);

    if let Some(rate) = ctx.vendor_rate {
        plans.push(CommissionPlan {
            payee_id: ctx.vendor_id,
            kind: CommissionType::Vendor,
            percentage: rate,
            status: CommissionStatus::Pending,
        });
    }

    if !ctx.partner_ids.is_empty() {
        let share =
            (ctx.partner_pool_rate / Decimal::from(ctx.partner_ids.len() as u64)).round_dp(4);
        plans.extend(ctx.partner_ids.iter().map(|&payee_id| CommissionPlan {
            payee_id,
            kind: CommissionType::Partner,
            percentage: share,
            status: CommissionStatus::Confirmed,
        }));
    }

    plans
}

pub fn commission_amount(order_value: Money, percentage: Decimal) -> Money {
    order_value.percentage_of(percentage).rounded()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PayeeTotal {
    pub payee_id: Uuid,
    pub total: Money,
    pub commissions: usize,
}

/// Inserts one commission per plan.
pub(crate) async fn create_in<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    order_value: Money,
    ctx: &CommissionContext,
) -> Result<Vec<commission::Model>, ServiceError> {
    let now = Utc::now();
    let mut created = Vec::new();
    for plan in plan_commissions(ctx) {
        let model = commission::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            payee_id: Set(plan.payee_id),
            commission_type: Set(plan.kind),
            percentage: Set(plan.percentage),
            amount: Set(commission_amount(order_value, plan.percentage).to_stored()),
            order_value: Set(order_value.to_stored()),
            status: Set(plan.status),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await?;
        created.push(model);
    }
    Ok(created)
}

/// Recomputes every live commission of `order` against its current value,
/// creating them when none exist. Statuses are left untouched.
pub(crate) async fn recompute_in<C: ConnectionTrait>(
    conn: &C,
    order: &order::Model,
    ctx: &CommissionContext,
) -> Result<Vec<commission::Model>, ServiceError> {
    let existing = commission::Entity::find()
        .filter(commission::Column::OrderId.eq(order.id))
        .order_by_asc(commission::Column::CreatedAt)
        .all(conn)
        .await?;

    let order_value = Money::new(order.total_value);
    if existing.is_empty() {
        return create_in(conn, order.id, order_value, ctx).await;
    }

    let mut result = Vec::with_capacity(existing.len());
    for c in existing {
        if c.status == CommissionStatus::Cancelled {
            result.push(c);
            continue;
        }
        let amount = commission_amount(order_value, c.percentage).to_stored();
        let mut active: commission::ActiveModel = c.into();
        active.amount = Set(amount);
        active.order_value = Set(order_value.to_stored());
        active.updated_at = Set(Utc::now());
        result.push(active.update(conn).await?);
    }
    Ok(result)
}

/// Delivery confirms pending vendor commissions.
pub(crate) async fn confirm_vendor_in<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<usize, ServiceError> {
    let pending = commission::Entity::find()
        .filter(commission::Column::OrderId.eq(order_id))
        .filter(commission::Column::CommissionType.eq(CommissionType::Vendor))
        .filter(commission::Column::Status.eq(CommissionStatus::Pending))
        .all(conn)
        .await?;

    let count = pending.len();
    for c in pending {
        let next = c.status.transition_to(CommissionStatus::Confirmed)?;
        let mut active: commission::ActiveModel = c.into();
        active.status = Set(next);
        active.updated_at = Set(Utc::now());
        active.update(conn).await?;
    }
    Ok(count)
}

/// Cancellation voids every commission of the order and zeroes its amount.
pub(crate) async fn cancel_all_in<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<usize, ServiceError> {
    let live = commission::Entity::find()
        .filter(commission::Column::OrderId.eq(order_id))
        .filter(commission::Column::Status.ne(CommissionStatus::Cancelled))
        .all(conn)
        .await?;

    let count = live.len();
    for c in live {
        let next = c.status.transition_to(CommissionStatus::Cancelled)?;
        let mut active: commission::ActiveModel = c.into();
        active.status = Set(next);
        active.amount = Set(Money::ZERO.to_stored());
        active.updated_at = Set(Utc::now());
        active.update(conn).await?;
    }
    Ok(count)
}

#[derive(Clone)]
pub struct CommissionService {
    db_pool: Arc<DbPool>,
    directory: Arc<dyn Directory>,
    config: CommissionConfig,
    locks: LedgerLocks,
    event_sender: Option<Arc<EventSender>>,
}

impl CommissionService {
    pub fn new(
        db_pool: Arc<DbPool>,
        directory: Arc<dyn Directory>,
        config: CommissionConfig,
        locks: LedgerLocks,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db_pool,
            directory,
            config,
            locks,
            event_sender,
        }
    }

    /// Resolves the vendor rate and the active partners. Must run outside any
    /// open transaction.
    pub async fn context_for(&self, vendor_id: Uuid) -> Result<CommissionContext, ServiceError> {
        let vendor_rate = self
            .directory
            .vendor_commission_rate(vendor_id, self.config.default_vendor_rate)
            .await?;
        let partner_ids = self
            .directory
            .list_active_partners()
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();

        Ok(CommissionContext {
            vendor_id,
            vendor_rate,
            partner_ids,
            partner_pool_rate: self.config.partner_pool_rate,
        })
    }

    /// Recomputes the commissions of an order from its current value.
    /// Delivered and cancelled orders keep their commissions as they are.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn recalculate(&self, order_id: Uuid) -> Result<Vec<commission::Model>, ServiceError> {
        let vendor_id = order::Entity::find_by_id(order_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?
            .vendor_id;
        let ctx = self.context_for(vendor_id).await?;

        let _guard = self.locks.acquire(order_id).await;
        let started = Instant::now();
        let txn = db::begin(&self.db_pool).await?;

        let order = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        if !order.status.accepts_value_changes() {
            warn!(status = %order.status, "Commission recalculation refused");
            return Err(ServiceError::InvalidStatus(format!(
                "Commissions of order {} are frozen while '{}'",
                order.order_number, order.status
            )));
        }
        let commissions = recompute_in(&txn, &order, &ctx).await?;

        db::commit(txn, started).await?;
        metrics::COMMISSION_RECALCULATIONS.inc();
        info!(commissions = commissions.len(), "Commissions recalculated");

        events::publish(
            self.event_sender.as_deref(),
            Event::CommissionsRecalculated {
                order_id,
                order_value: order.total_value,
            },
        )
        .await;

        Ok(commissions)
    }

    #[instrument(skip(self))]
    pub async fn list_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<commission::Model>, ServiceError> {
        Ok(commission::Entity::find()
            .filter(commission::Column::OrderId.eq(order_id))
            .order_by_asc(commission::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?)
    }

    /// Settles a confirmed commission.
    #[instrument(skip(self), fields(commission_id = %commission_id))]
    pub async fn mark_paid(&self, commission_id: Uuid) -> Result<commission::Model, ServiceError> {
        let started = Instant::now();
        let txn = db::begin(&self.db_pool).await?;

        let c = commission::Entity::find_by_id(commission_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                warn!("Commission not found");
                ServiceError::NotFound(format!("Commission {} not found", commission_id))
            })?;

        let next = c.status.transition_to(CommissionStatus::Paid)?;
        let mut active: commission::ActiveModel = c.into();
        active.status = Set(next);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        db::commit(txn, started).await?;
        info!("Commission marked as paid");
        Ok(updated)
    }

    /// Totals per payee over non-cancelled commissions, optionally for one payee.
    #[instrument(skip(self))]
    pub async fn totals(&self, payee_id: Option<Uuid>) -> Result<Vec<PayeeTotal>, ServiceError> {
        let mut query = commission::Entity::find()
            .filter(commission::Column::Status.ne(CommissionStatus::Cancelled));
        if let Some(payee_id) = payee_id {
            query = query.filter(commission::Column::PayeeId.eq(payee_id));
        }
        let rows = query.all(&*self.db_pool).await?;

        let mut totals: BTreeMap<Uuid, (Money, usize)> = BTreeMap::new();
        for c in rows {
            let entry = totals.entry(c.payee_id).or_insert((Money::ZERO, 0));
            entry.0 += Money::new(c.amount);
            entry.1 += 1;
        }

        Ok(totals
            .into_iter()
            .map(|(payee_id, (total, commissions))| PayeeTotal {
                payee_id,
                total: total.rounded(),
                commissions,
            })
            .collect())
    }
}
