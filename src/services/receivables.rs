//! Receivable/payment ledger. Received values are always re-derived from the
//! set of confirmed payments, never incremented.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::db::{self, DbPool};
use crate::entities::{accounts_receivable, order, payment};
use crate::errors::ServiceError;
use crate::events::{self, Event, EventSender};
use crate::metrics;
use crate::models::{OrderStatus, PaymentMethod, PaymentStatus, ReceivableStatus, StatusMachine};
use crate::money::Money;
use crate::services::locks::LedgerLocks;

/// Whether a receivable mirrors an order or was entered by hand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceivableKind {
    Order,
    Manual,
}

/// Status as a pure function of the balance.
pub fn derive_receivable_status(
    kind: ReceivableKind,
    amount: Money,
    received: Money,
    minimum_payment: Money,
    due_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> ReceivableStatus {
    if received >= amount {
        return ReceivableStatus::Paid;
    }
    if matches!(due_date, Some(due) if due < now) {
        return ReceivableStatus::Overdue;
    }
    if received.is_positive() {
        if !minimum_payment.is_positive() || received >= minimum_payment {
            ReceivableStatus::Partial
        } else {
            ReceivableStatus::Pending
        }
    } else {
        match kind {
            ReceivableKind::Order => ReceivableStatus::Pending,
            ReceivableKind::Manual => ReceivableStatus::Open,
        }
    }
}

/// Down payment plus shipping, or zero when no down payment applies.
pub fn minimum_payment(down_payment: Money, shipping: Money) -> Money {
    if down_payment.is_positive() {
        down_payment + shipping
    } else {
        Money::ZERO
    }
}

fn status_of(r: &accounts_receivable::Model, received: Money, now: DateTime<Utc>) -> ReceivableStatus {
    let kind = if r.order_id.is_some() {
        ReceivableKind::Order
    } else {
        ReceivableKind::Manual
    };
    derive_receivable_status(
        kind,
        Money::new(r.amount),
        received,
        Money::new(r.minimum_payment),
        r.due_date,
        now,
    )
}

/// Seeds the receivable of a freshly created order.
pub(crate) async fn seed_for_order<C: ConnectionTrait>(
    conn: &C,
    order: &order::Model,
) -> Result<accounts_receivable::Model, ServiceError> {
    let now = Utc::now();
    let amount = Money::new(order.total_value);
    let received = Money::new(order.paid_value);
    let minimum = minimum_payment(
        Money::new(order.down_payment),
        Money::new(order.shipping_cost),
    );

    Ok(accounts_receivable::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(Some(order.id)),
        client_id: Set(Some(order.client_id)),
        description: Set(format!("Order {}", order.order_number)),
        amount: Set(amount.to_stored()),
        received_amount: Set(received.to_stored()),
        minimum_payment: Set(minimum.to_stored()),
        due_date: Set(order.delivery_date),
        status: Set(derive_receivable_status(
            ReceivableKind::Order,
            amount,
            received,
            minimum,
            order.delivery_date,
            now,
        )),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?)
}

async fn confirmed_total<C: ConnectionTrait>(
    conn: &C,
    column: payment::Column,
    id: Uuid,
) -> Result<Money, ServiceError> {
    let payments = payment::Entity::find()
        .filter(column.eq(id))
        .filter(payment::Column::Status.eq(PaymentStatus::Confirmed))
        .all(conn)
        .await?;
    Ok(Money::sum(payments.into_iter().map(|p| Money::new(p.amount))).rounded())
}

/// Re-derives `paid_value` and the receivable of `order` from confirmed payments.
/// The order write is guarded by its `version`.
pub(crate) async fn resync_order<C: ConnectionTrait>(
    conn: &C,
    order: &order::Model,
) -> Result<(order::Model, accounts_receivable::Model), ServiceError> {
    let paid = confirmed_total(conn, payment::Column::OrderId, order.id).await?;

    let updated = order::Entity::update_many()
        .col_expr(
            order::Column::PaidValue,
            sea_orm::sea_query::Expr::value(paid.to_stored()),
        )
        .col_expr(
            order::Column::Version,
            sea_orm::sea_query::Expr::value(order.version + 1),
        )
        .col_expr(
            order::Column::UpdatedAt,
            sea_orm::sea_query::Expr::value(Utc::now()),
        )
        .filter(order::Column::Id.eq(order.id))
        .filter(order::Column::Version.eq(order.version))
        .exec(conn)
        .await?;
    if updated.rows_affected == 0 {
        return Err(ServiceError::ConcurrentModification(order.id));
    }

    let order = order::Entity::find_by_id(order.id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order.id)))?;

    let receivable = match find_for_order(conn, order.id).await? {
        Some(r) => r,
        None => seed_for_order(conn, &order).await?,
    };
    let receivable = sync_receivable(conn, receivable, &order, paid).await?;
    Ok((order, receivable))
}

async fn find_for_order<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<Option<accounts_receivable::Model>, ServiceError> {
    Ok(accounts_receivable::Entity::find()
        .filter(accounts_receivable::Column::OrderId.eq(order_id))
        .one(conn)
        .await?)
}

async fn sync_receivable<C: ConnectionTrait>(
    conn: &C,
    receivable: accounts_receivable::Model,
    order: &order::Model,
    received: Money,
) -> Result<accounts_receivable::Model, ServiceError> {
    let amount = Money::new(order.total_value);
    let minimum = minimum_payment(
        Money::new(order.down_payment),
        Money::new(order.shipping_cost),
    );

    let mut refreshed = receivable.clone();
    refreshed.amount = amount.to_stored();
    refreshed.minimum_payment = minimum.to_stored();
    let status = if order.status == OrderStatus::Cancelled {
        ReceivableStatus::Cancelled
    } else {
        status_of(&refreshed, received, Utc::now())
    };

    let mut active: accounts_receivable::ActiveModel = receivable.into();
    active.amount = Set(amount.to_stored());
    active.minimum_payment = Set(minimum.to_stored());
    active.received_amount = Set(received.to_stored());
    active.status = Set(status);
    active.updated_at = Set(Utc::now());
    Ok(active.update(conn).await?)
}

/// Refreshes the receivable after an order's value or status changed.
pub(crate) async fn refresh_for_order<C: ConnectionTrait>(
    conn: &C,
    order: &order::Model,
) -> Result<accounts_receivable::Model, ServiceError> {
    let received = confirmed_total(conn, payment::Column::OrderId, order.id).await?;
    match find_for_order(conn, order.id).await? {
        Some(r) => sync_receivable(conn, r, order, received).await,
        None => {
            let seeded = seed_for_order(conn, order).await?;
            sync_receivable(conn, seeded, order, received).await
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub method: PaymentMethod,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl RecordPaymentRequest {
    pub fn new(amount: Decimal, method: PaymentMethod) -> Self {
        Self {
            amount,
            method,
            notes: None,
            paid_at: None,
        }
    }

    fn check(&self) -> Result<(), ServiceError> {
        self.validate()?;
        if self.amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "Payment amount must be positive, got {}",
                self.amount
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateReceivableRequest {
    #[validate(length(min = 1, max = 255, message = "Description is required"))]
    pub description: String,
    pub client_id: Option<Uuid>,
    pub amount: Decimal,
    #[serde(default)]
    pub minimum_payment: Decimal,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentOutcome {
    pub payment: payment::Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<order::Model>,
    pub receivable: accounts_receivable::Model,
}

#[derive(Clone)]
pub struct LedgerService {
    db_pool: Arc<DbPool>,
    locks: LedgerLocks,
    event_sender: Option<Arc<EventSender>>,
}

impl LedgerService {
    pub fn new(
        db_pool: Arc<DbPool>,
        locks: LedgerLocks,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db_pool,
            locks,
            event_sender,
        }
    }

    /// Records a confirmed payment against an order.
    #[instrument(skip(self, request), fields(order_id = %order_id, amount = %request.amount))]
    pub async fn record_payment(
        &self,
        order_id: Uuid,
        request: RecordPaymentRequest,
    ) -> Result<PaymentOutcome, ServiceError> {
        request.check()?;

        let _guard = self.locks.acquire(order_id).await;
        let started = Instant::now();
        let txn = db::begin(&self.db_pool).await?;

        let order = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        if order.status == OrderStatus::Cancelled {
            return Err(ServiceError::InvalidStatus(format!(
                "Order {} is cancelled and accepts no payments",
                order.order_number
            )));
        }

        let receivable = match find_for_order(&txn, order_id).await? {
            Some(r) => r,
            None => seed_for_order(&txn, &order).await?,
        };

        let payment = insert_payment(&txn, Some(order_id), receivable.id, &request).await?;
        let (order, receivable) = resync_order(&txn, &order).await?;

        db::commit(txn, started).await?;
        metrics::PAYMENTS_RECORDED.inc();
        info!(payment_id = %payment.id, paid_value = %order.paid_value, "Payment recorded");

        self.publish_payment(&payment, &receivable).await;
        Ok(PaymentOutcome {
            payment,
            order: Some(order),
            receivable,
        })
    }

    /// Cancels a confirmed payment and re-derives the balances it fed.
    #[instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn cancel_payment(&self, payment_id: Uuid) -> Result<PaymentOutcome, ServiceError> {
        let existing = payment::Entity::find_by_id(payment_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Payment {} not found", payment_id)))?;
        let key = existing.order_id.unwrap_or(existing.receivable_id);

        let _guard = self.locks.acquire(key).await;
        let started = Instant::now();
        let txn = db::begin(&self.db_pool).await?;

        let current = payment::Entity::find_by_id(payment_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Payment {} not found", payment_id)))?;
        let next = current.status.transition_to(PaymentStatus::Cancelled)?;
        let mut active: payment::ActiveModel = current.into();
        active.status = Set(next);
        let cancelled = active.update(&txn).await?;

        let outcome = match cancelled.order_id {
            Some(order_id) => {
                let order = order::Entity::find_by_id(order_id)
                    .one(&txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Order {} not found", order_id))
                    })?;
                let (order, receivable) = resync_order(&txn, &order).await?;
                PaymentOutcome {
                    payment: cancelled,
                    order: Some(order),
                    receivable,
                }
            }
            None => {
                let receivable = resync_manual(&txn, cancelled.receivable_id).await?;
                PaymentOutcome {
                    payment: cancelled,
                    order: None,
                    receivable,
                }
            }
        };

        db::commit(txn, started).await?;
        info!("Payment cancelled");

        events::publish(
            self.event_sender.as_deref(),
            Event::PaymentCancelled {
                payment_id,
                order_id: outcome.payment.order_id,
            },
        )
        .await;
        self.publish_receivable(&outcome.receivable).await;
        Ok(outcome)
    }

    /// Creates a receivable that is not backed by an order.
    #[instrument(skip(self, request), fields(amount = %request.amount))]
    pub async fn create_manual(
        &self,
        request: CreateReceivableRequest,
    ) -> Result<accounts_receivable::Model, ServiceError> {
        request.validate()?;
        if request.amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "Receivable amount must be positive, got {}",
                request.amount
            )));
        }
        if request.minimum_payment < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Minimum payment cannot be negative".into(),
            ));
        }

        let now = Utc::now();
        let amount = Money::new(request.amount);
        let minimum = Money::new(request.minimum_payment);
        let receivable = accounts_receivable::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(None),
            client_id: Set(request.client_id),
            description: Set(request.description),
            amount: Set(amount.to_stored()),
            received_amount: Set(Money::ZERO.to_stored()),
            minimum_payment: Set(minimum.to_stored()),
            due_date: Set(request.due_date),
            status: Set(derive_receivable_status(
                ReceivableKind::Manual,
                amount,
                Money::ZERO,
                minimum,
                request.due_date,
                now,
            )),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await?;

        info!(receivable_id = %receivable.id, "Manual receivable created");
        Ok(receivable)
    }

    /// Records a receipt against any receivable; order-backed ones go through
    /// the order payment path.
    #[instrument(skip(self, request), fields(receivable_id = %receivable_id))]
    pub async fn record_receipt(
        &self,
        receivable_id: Uuid,
        request: RecordPaymentRequest,
    ) -> Result<PaymentOutcome, ServiceError> {
        request.check()?;

        let receivable = accounts_receivable::Entity::find_by_id(receivable_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Receivable {} not found", receivable_id))
            })?;
        if let Some(order_id) = receivable.order_id {
            return self.record_payment(order_id, request).await;
        }
        if receivable.status == ReceivableStatus::Cancelled {
            return Err(ServiceError::InvalidStatus(format!(
                "Receivable {} is cancelled",
                receivable_id
            )));
        }

        let _guard = self.locks.acquire(receivable_id).await;
        let started = Instant::now();
        let txn = db::begin(&self.db_pool).await?;

        let payment = insert_payment(&txn, None, receivable_id, &request).await?;
        let receivable = resync_manual(&txn, receivable_id).await?;

        db::commit(txn, started).await?;
        metrics::PAYMENTS_RECORDED.inc();

        self.publish_payment(&payment, &receivable).await;
        Ok(PaymentOutcome {
            payment,
            order: None,
            receivable,
        })
    }

    #[instrument(skip(self))]
    pub async fn payments_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<payment::Model>, ServiceError> {
        Ok(payment::Entity::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .order_by_asc(payment::Column::PaidAt)
            .all(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn receivable_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<accounts_receivable::Model>, ServiceError> {
        find_for_order(&*self.db_pool, order_id).await
    }

    async fn publish_payment(&self, payment: &payment::Model, receivable: &accounts_receivable::Model) {
        events::publish(
            self.event_sender.as_deref(),
            Event::PaymentRecorded {
                payment_id: payment.id,
                order_id: payment.order_id,
                amount: payment.amount,
            },
        )
        .await;
        self.publish_receivable(receivable).await;
    }

    async fn publish_receivable(&self, receivable: &accounts_receivable::Model) {
        events::publish(
            self.event_sender.as_deref(),
            Event::ReceivableUpdated {
                receivable_id: receivable.id,
                status: receivable.status.to_string(),
                at: receivable.updated_at,
            },
        )
        .await;
    }
}

async fn insert_payment<C: ConnectionTrait>(
    conn: &C,
    order_id: Option<Uuid>,
    receivable_id: Uuid,
    request: &RecordPaymentRequest,
) -> Result<payment::Model, ServiceError> {
    let now = Utc::now();
    Ok(payment::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        receivable_id: Set(receivable_id),
        amount: Set(Money::new(request.amount).to_stored()),
        method: Set(request.method),
        status: Set(PaymentStatus::Confirmed),
        notes: Set(request.notes.clone()),
        paid_at: Set(request.paid_at.unwrap_or(now)),
        created_at: Set(now),
    }
    .insert(conn)
    .await?)
}

async fn resync_manual<C: ConnectionTrait>(
    conn: &C,
    receivable_id: Uuid,
) -> Result<accounts_receivable::Model, ServiceError> {
    let receivable = accounts_receivable::Entity::find_by_id(receivable_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Receivable {} not found", receivable_id)))?;
    let received = confirmed_total(conn, payment::Column::ReceivableId, receivable_id).await?;
    let status = status_of(&receivable, received, Utc::now());
    if status == ReceivableStatus::Paid && receivable.status != ReceivableStatus::Paid {
        info!(%receivable_id, "Manual receivable settled");
    }

    let mut active: accounts_receivable::ActiveModel = receivable.into();
    active.received_amount = Set(received.to_stored());
    active.status = Set(status);
    active.updated_at = Set(Utc::now());
    Ok(active.update(conn).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn m(v: Decimal) -> Money {
        Money::new(v)
    }

    #[rstest]
    #[case(ReceivableKind::Order, dec!(0), dec!(0), ReceivableStatus::Pending)]
    #[case(ReceivableKind::Manual, dec!(0), dec!(0), ReceivableStatus::Open)]
    #[case(ReceivableKind::Order, dec!(100), dec!(550), ReceivableStatus::Pending)]
    #[case(ReceivableKind::Order, dec!(550), dec!(550), ReceivableStatus::Partial)]
    #[case(ReceivableKind::Order, dec!(10), dec!(0), ReceivableStatus::Partial)]
    #[case(ReceivableKind::Manual, dec!(999.99), dec!(0), ReceivableStatus::Partial)]
    #[case(ReceivableKind::Order, dec!(1000), dec!(550), ReceivableStatus::Paid)]
    #[case(ReceivableKind::Order, dec!(1200), dec!(550), ReceivableStatus::Paid)]
    fn status_follows_received_against_amount_and_minimum(
        #[case] kind: ReceivableKind,
        #[case] received: Decimal,
        #[case] minimum: Decimal,
        #[case] expected: ReceivableStatus,
    ) {
        let status =
            derive_receivable_status(kind, m(dec!(1000)), m(received), m(minimum), None, Utc::now());
        assert_eq!(status, expected);
    }

    #[test]
    fn past_due_unsettled_balance_is_overdue() {
        let now = Utc::now();
        let yesterday = Some(now - Duration::days(1));
        assert_eq!(
            derive_receivable_status(
                ReceivableKind::Manual,
                m(dec!(100)),
                m(dec!(40)),
                Money::ZERO,
                yesterday,
                now
            ),
            ReceivableStatus::Overdue
        );
        assert_eq!(
            derive_receivable_status(
                ReceivableKind::Manual,
                m(dec!(100)),
                m(dec!(100)),
                Money::ZERO,
                yesterday,
                now
            ),
            ReceivableStatus::Paid
        );
    }

    #[test]
    fn minimum_payment_only_with_down_payment() {
        assert_eq!(minimum_payment(m(dec!(500)), m(dec!(50))), m(dec!(550)));
        assert_eq!(minimum_payment(Money::ZERO, m(dec!(50))), Money::ZERO);
    }
}
