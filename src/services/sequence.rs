//! Human-readable `PREFIX-YYMM-xxxxxx` numbers with bounded collision retry.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction,
    EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, TransactionTrait,
};
use std::future::Future;
use tracing::{debug, warn};

use crate::db::is_unique_violation;
use crate::entities::{budget, order};
use crate::errors::ServiceError;
use crate::metrics;

pub const BUDGET_PREFIX: &str = "BUD";
pub const ORDER_PREFIX: &str = "PED";
const SUFFIX_WIDTH: usize = 6;

/// `BUD-2510-` for budgets numbered in October 2025.
pub fn month_prefix(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{}-{}-", prefix, at.format("%y%m"))
}

pub fn format_number(prefix: &str, at: DateTime<Utc>, sequence: u32) -> String {
    format!(
        "{}{:0width$}",
        month_prefix(prefix, at),
        sequence,
        width = SUFFIX_WIDTH
    )
}

/// Sequence part of `number` when it belongs to `month_prefix`.
pub fn parse_sequence(number: &str, month_prefix: &str) -> Option<u32> {
    number.strip_prefix(month_prefix)?.parse().ok()
}

/// Runs `attempt` until it stops reporting [`ServiceError::SequenceCollision`],
/// at most `max_attempts` times. Attempts are numbered from zero.
pub async fn retry_on_collision<T, F, Fut>(
    label: &str,
    max_attempts: u32,
    mut attempt: F,
) -> Result<T, ServiceError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut last = None;
    for n in 0..max_attempts {
        match attempt(n).await {
            Err(ServiceError::SequenceCollision(msg)) => {
                metrics::SEQUENCE_RETRIES.with_label_values(&[label]).inc();
                debug!(label, attempt = n, "Number collision, retrying");
                last = Some(msg);
            }
            other => return other,
        }
    }
    warn!(label, max_attempts, "Gave up allocating a unique number");
    Err(ServiceError::SequenceCollision(format!(
        "no unique {} number after {} attempts ({})",
        label,
        max_attempts,
        last.unwrap_or_default()
    )))
}

/// Next budget number for the month of `at`, skipping `offset` candidates.
pub async fn next_budget_number<C: ConnectionTrait>(
    conn: &C,
    at: DateTime<Utc>,
    offset: u32,
) -> Result<String, ServiceError> {
    let prefix = month_prefix(BUDGET_PREFIX, at);
    let latest = budget::Entity::find()
        .filter(budget::Column::BudgetNumber.starts_with(prefix.as_str()))
        .order_by_desc(budget::Column::BudgetNumber)
        .one(conn)
        .await?
        .and_then(|b| parse_sequence(&b.budget_number, &prefix))
        .unwrap_or(0);
    Ok(format_number(BUDGET_PREFIX, at, latest + 1 + offset))
}

/// Next order number for the month of `at`, skipping `offset` candidates.
pub async fn next_order_number<C: ConnectionTrait>(
    conn: &C,
    at: DateTime<Utc>,
    offset: u32,
) -> Result<String, ServiceError> {
    let prefix = month_prefix(ORDER_PREFIX, at);
    let latest = order::Entity::find()
        .filter(order::Column::OrderNumber.starts_with(prefix.as_str()))
        .order_by_desc(order::Column::OrderNumber)
        .one(conn)
        .await?
        .and_then(|o| parse_sequence(&o.order_number, &prefix))
        .unwrap_or(0);
    Ok(format_number(ORDER_PREFIX, at, latest + 1 + offset))
}

/// Inserts `model` inside a savepoint so a unique violation leaves the outer
/// transaction usable, and reports it as a collision.
pub async fn insert_numbered<A>(
    txn: &DatabaseTransaction,
    model: A,
) -> Result<<A::Entity as EntityTrait>::Model, ServiceError>
where
    A: ActiveModelTrait + ActiveModelBehavior + Send + 'static,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
{
    let savepoint = txn.begin().await?;
    match model.insert(&savepoint).await {
        Ok(inserted) => {
            savepoint.commit().await?;
            Ok(inserted)
        }
        Err(e) if is_unique_violation(&e) => {
            Err(ServiceError::SequenceCollision(e.to_string()))
        }
        Err(e) => Err(ServiceError::DatabaseError(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn october() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 17, 9, 30, 0).unwrap()
    }

    #[test]
    fn numbers_are_zero_padded_per_month() {
        assert_eq!(format_number(BUDGET_PREFIX, october(), 7), "BUD-2510-000007");
        assert_eq!(format_number(ORDER_PREFIX, october(), 123456), "PED-2510-123456");
    }

    #[test]
    fn sequence_parses_only_within_its_month() {
        let prefix = month_prefix(ORDER_PREFIX, october());
        assert_eq!(parse_sequence("PED-2510-000042", &prefix), Some(42));
        assert_eq!(parse_sequence("PED-2509-000042", &prefix), None);
        assert_eq!(parse_sequence("PED-2510-abc", &prefix), None);
    }

    #[tokio::test]
    async fn collisions_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_on_collision("order", 5, |n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ServiceError::SequenceCollision("taken".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn collisions_surface_after_bounded_attempts() {
        let result: Result<(), _> = retry_on_collision("budget", 3, |_| async {
            Err(ServiceError::SequenceCollision("taken".into()))
        })
        .await;
        assert_matches!(result, Err(ServiceError::SequenceCollision(msg)) if msg.contains("3 attempts"));
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_on_collision("budget", 5, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ServiceError::ValidationError("bad".into())) }
        })
        .await;
        assert_matches!(result, Err(ServiceError::ValidationError(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
