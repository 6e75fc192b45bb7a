use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::metrics;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Domain events emitted after a unit of work commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // Budget events
    BudgetCreated(Uuid),
    BudgetStatusChanged {
        budget_id: Uuid,
        old_status: String,
        new_status: String,
    },
    BudgetConverted {
        budget_id: Uuid,
        order_id: Uuid,
        production_orders: usize,
    },

    // Order events
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    OrderValueChanged {
        order_id: Uuid,
        old_total: Decimal,
        new_total: Decimal,
    },

    // Settlement events
    PaymentRecorded {
        payment_id: Uuid,
        order_id: Option<Uuid>,
        amount: Decimal,
    },
    PaymentCancelled {
        payment_id: Uuid,
        order_id: Option<Uuid>,
    },
    CommissionsRecalculated {
        order_id: Uuid,
        order_value: Decimal,
    },
    ReceivableUpdated {
        receivable_id: Uuid,
        status: String,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Stable name used for logging and counters.
    pub fn name(&self) -> &'static str {
        match self {
            Self::BudgetCreated(_) => "budget_created",
            Self::BudgetStatusChanged { .. } => "budget_status_changed",
            Self::BudgetConverted { .. } => "budget_converted",
            Self::OrderCreated(_) => "order_created",
            Self::OrderStatusChanged { .. } => "order_status_changed",
            Self::OrderValueChanged { .. } => "order_value_changed",
            Self::PaymentRecorded { .. } => "payment_recorded",
            Self::PaymentCancelled { .. } => "payment_cancelled",
            Self::CommissionsRecalculated { .. } => "commissions_recalculated",
            Self::ReceivableUpdated { .. } => "receivable_updated",
        }
    }
}

/// Best-effort publish; a closed channel never fails the caller's operation.
pub(crate) async fn publish(sender: Option<&EventSender>, event: Event) {
    if let Some(sender) = sender {
        let name = event.name();
        if let Err(e) = sender.send(event).await {
            warn!(error = %e, event = name, "Failed to send event");
        }
    }
}

pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        metrics::EVENTS_PROCESSED
            .with_label_values(&[event.name()])
            .inc();

        match &event {
            Event::BudgetConverted {
                budget_id,
                order_id,
                production_orders,
            } => {
                info!(
                    %budget_id,
                    %order_id,
                    production_orders,
                    "Budget converted into order"
                );
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(%order_id, old_status, new_status, "Order status changed");
            }
            Event::PaymentRecorded {
                payment_id,
                order_id,
                amount,
            } => {
                info!(%payment_id, ?order_id, %amount, "Payment recorded");
            }
            other => debug!(event = ?other, "Received event"),
        }
    }

    info!("Event processing loop stopped");
}
