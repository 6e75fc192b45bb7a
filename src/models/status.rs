use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::errors::ServiceError;

/// Enumerated transition table shared by every entity status.
pub trait StatusMachine: Copy + PartialEq + Debug + std::fmt::Display + 'static {
    /// Entity name used in rejection messages.
    const ENTITY: &'static str;

    fn allowed_transitions(&self) -> &'static [Self];

    fn can_transition_to(&self, next: Self) -> bool {
        self.allowed_transitions().contains(&next)
    }

    fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Returns `next` when the table permits it, otherwise `InvalidStatus`.
    fn transition_to(self, next: Self) -> Result<Self, ServiceError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(ServiceError::InvalidStatus(format!(
                "{} cannot transition from '{}' to '{}'",
                Self::ENTITY,
                self,
                next
            )))
        }
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BudgetStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "sent")]
    Sent,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "awaiting_approval")]
    AwaitingApproval,
    #[sea_orm(string_value = "admin_approved")]
    AdminApproved,
    #[sea_orm(string_value = "not_approved")]
    NotApproved,
    #[sea_orm(string_value = "converted")]
    Converted,
}

impl BudgetStatus {
    /// States in which the vendor may still edit commercial content.
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Draft | Self::Sent | Self::NotApproved)
    }

    pub fn is_convertible(&self) -> bool {
        matches!(self, Self::Approved | Self::AdminApproved)
    }
}

impl StatusMachine for BudgetStatus {
    const ENTITY: &'static str = "Budget";

    fn allowed_transitions(&self) -> &'static [Self] {
        use BudgetStatus::*;
        match self {
            Draft => &[Sent, AwaitingApproval],
            Sent => &[Sent, Approved, Rejected, AwaitingApproval],
            AwaitingApproval => &[AdminApproved, NotApproved],
            NotApproved => &[Sent, AwaitingApproval],
            Approved => &[Converted],
            AdminApproved => &[Converted, Rejected],
            Rejected => &[],
            Converted => &[],
        }
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "production")]
    Production,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl OrderStatus {
    /// Delivered and cancelled orders no longer accept commercial changes.
    pub fn accepts_value_changes(&self) -> bool {
        !self.is_terminal()
    }
}

impl StatusMachine for OrderStatus {
    const ENTITY: &'static str = "Order";

    fn allowed_transitions(&self) -> &'static [Self] {
        use OrderStatus::*;
        match self {
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[Production, Cancelled],
            Production => &[Shipped, Cancelled],
            Shipped => &[Delivered, Cancelled],
            Delivered => &[],
            Cancelled => &[],
        }
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CommissionStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl StatusMachine for CommissionStatus {
    const ENTITY: &'static str = "Commission";

    fn allowed_transitions(&self) -> &'static [Self] {
        use CommissionStatus::*;
        match self {
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[Paid, Cancelled],
            // order cancellation claws back paid commissions
            Paid => &[Cancelled],
            Cancelled => &[],
        }
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReceivableStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "partial")]
    Partial,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "overdue")]
    Overdue,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl StatusMachine for PaymentStatus {
    const ENTITY: &'static str = "Payment";

    fn allowed_transitions(&self) -> &'static [Self] {
        use PaymentStatus::*;
        match self {
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[Cancelled],
            Cancelled => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn budget_becomes_immutable_once_converted() {
        assert!(BudgetStatus::Converted.is_terminal());
        assert!(!BudgetStatus::Converted.is_editable());
        assert_matches!(
            BudgetStatus::Converted.transition_to(BudgetStatus::Draft),
            Err(ServiceError::InvalidStatus(_))
        );
    }

    #[test]
    fn only_approved_budgets_convert() {
        for status in [BudgetStatus::Approved, BudgetStatus::AdminApproved] {
            assert!(status.is_convertible());
            assert!(status.can_transition_to(BudgetStatus::Converted));
        }
        for status in [
            BudgetStatus::Draft,
            BudgetStatus::Sent,
            BudgetStatus::AwaitingApproval,
            BudgetStatus::NotApproved,
            BudgetStatus::Rejected,
        ] {
            assert!(!status.can_transition_to(BudgetStatus::Converted));
        }
    }

    #[test]
    fn order_can_be_cancelled_until_delivered() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Production,
            OrderStatus::Shipped,
        ] {
            assert!(status.can_transition_to(OrderStatus::Cancelled));
            assert!(status.accepts_value_changes());
        }
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.accepts_value_changes());
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
    }

    #[test]
    fn rejection_message_names_both_states() {
        let err = OrderStatus::Delivered
            .transition_to(OrderStatus::Pending)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid status: Order cannot transition from 'delivered' to 'pending'"
        );
    }

    #[test]
    fn commissions_never_leave_cancelled() {
        assert!(CommissionStatus::Cancelled.is_terminal());
        assert!(CommissionStatus::Pending.can_transition_to(CommissionStatus::Confirmed));
        assert!(!CommissionStatus::Pending.can_transition_to(CommissionStatus::Paid));
    }
}
