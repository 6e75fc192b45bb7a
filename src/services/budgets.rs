//! Budget lifecycle: draft, edit, send, client decision and administrator review.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::config::AppConfig;
use crate::db::{self, DbPool};
use crate::directory::{Catalog, Directory};
use crate::entities::{budget, budget_item, budget_payment, product};
use crate::errors::ServiceError;
use crate::events::{self, Event, EventSender};
use crate::metrics;
use crate::models::{
    BudgetStatus, DeliveryType, Discount, PaymentMethod, PriceSource, ProducerRef, StatusMachine,
    UserRole,
};
use crate::money::Money;
use crate::services::aggregation::{aggregate_budget_total, AggregationInput, BudgetTotals};
use crate::services::discount::DiscountLine;
use crate::services::line_items::{price_line_items, LineItemDraft, PricedLine};
use crate::services::pricing::{effective_settings, PricingSettingsService};
use crate::services::sequence;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BudgetItemRequest {
    pub product_id: Uuid,
    #[serde(default)]
    pub producer: Option<ProducerRef>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    /// Per-unit customization cost.
    #[serde(default)]
    pub customization_value: Decimal,
    #[validate(length(max = 500))]
    pub customization_description: Option<String>,
    #[serde(default)]
    pub price_source: PriceSource,
    pub manual_unit_price: Option<Decimal>,
    #[serde(default)]
    pub discount: Discount,
    pub width: Option<Decimal>,
    pub height: Option<Decimal>,
    pub depth: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PaymentTermsRequest {
    #[serde(default)]
    pub method: PaymentMethod,
    #[serde(default = "default_installments")]
    #[validate(range(min = 1, max = 48, message = "Installments must be between 1 and 48"))]
    pub installments: u32,
    /// Defaults to half of the total.
    pub down_payment: Option<Decimal>,
}

impl Default for PaymentTermsRequest {
    fn default() -> Self {
        Self {
            method: PaymentMethod::default(),
            installments: default_installments(),
            down_payment: None,
        }
    }
}

fn default_installments() -> u32 {
    1
}

/// The commercial content of a budget, shared by creation and edits.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BudgetContent {
    pub client_id: Option<Uuid>,
    #[validate(length(min = 1, max = 255, message = "Contact name is required"))]
    pub contact_name: String,
    pub contact_phone: Option<String>,
    #[validate(email)]
    pub contact_email: Option<String>,
    pub contact_address: Option<String>,
    #[validate(length(min = 1, message = "A budget needs at least one item"))]
    pub items: Vec<BudgetItemRequest>,
    #[serde(default)]
    pub discount: Discount,
    /// Per-unit customization cost applied to every line.
    #[serde(default)]
    pub general_customization_value: Decimal,
    #[serde(default)]
    pub delivery_type: DeliveryType,
    #[serde(default)]
    pub shipping_cost: Decimal,
    #[serde(default)]
    pub payment: PaymentTermsRequest,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBudgetRequest {
    pub vendor_id: Uuid,
    #[serde(flatten)]
    pub content: BudgetContent,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReviewRequest {
    pub admin_id: Uuid,
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetDetails {
    pub budget: budget::Model,
    pub items: Vec<budget_item::Model>,
    pub payment: budget_payment::Model,
    pub totals: BudgetTotals,
}

struct PreparedLine {
    request: BudgetItemRequest,
    product: product::Model,
    priced: PricedLine,
}

struct PreparedBudget {
    lines: Vec<PreparedLine>,
    totals: BudgetTotals,
    monthly_interest_rate: Decimal,
}

/// Rebuilds the aggregation input from persisted rows.
pub fn stored_aggregation_input(
    budget: &budget::Model,
    items: &[budget_item::Model],
    payment: &budget_payment::Model,
) -> AggregationInput {
    AggregationInput {
        items: items
            .iter()
            .map(|i| DiscountLine {
                quantity: i.quantity,
                unit_price: Money::new(i.unit_price),
                minimum_price: Money::new(i.minimum_price),
                base_price_with_margin: Money::new(i.base_price_with_margin),
                customization_per_unit: Money::new(
                    i.customization_value + i.general_customization_value,
                ),
                total_price: Money::new(i.total_price),
            })
            .collect(),
        discount: Discount {
            kind: budget.discount_type,
            value: budget.discount_value,
        },
        discount_authorized: budget.discount_authorized,
        delivery_type: budget.delivery_type,
        shipping_cost: budget.shipping_cost,
        payment_method: payment.payment_method,
        installments: payment.installments.max(1) as u32,
        monthly_interest_rate: payment.monthly_interest_rate,
        down_payment: payment.down_payment_custom.then_some(payment.down_payment),
    }
}

fn apply_totals(active: &mut budget::ActiveModel, totals: &BudgetTotals) {
    active.items_subtotal = Set(totals.subtotal.to_stored());
    active.minimum_total = Set(totals.minimum_total.to_stored());
    active.discount_amount = Set(totals.discount_amount.to_stored());
    active.interest_amount = Set(totals.interest.to_stored());
    active.total = Set(totals.total.to_stored());
}

pub(crate) async fn load_details<C: ConnectionTrait>(
    conn: &C,
    budget_id: Uuid,
) -> Result<(budget::Model, Vec<budget_item::Model>, budget_payment::Model), ServiceError> {
    let budget = budget::Entity::find_by_id(budget_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Budget {} not found", budget_id)))?;
    let items = budget_item::Entity::find()
        .filter(budget_item::Column::BudgetId.eq(budget_id))
        .order_by_asc(budget_item::Column::Position)
        .all(conn)
        .await?;
    let payment = budget_payment::Entity::find()
        .filter(budget_payment::Column::BudgetId.eq(budget_id))
        .one(conn)
        .await?
        .ok_or_else(|| {
            ServiceError::InternalError(format!("Budget {} has no payment terms", budget_id))
        })?;
    Ok((budget, items, payment))
}

#[derive(Clone)]
pub struct BudgetService {
    db_pool: Arc<DbPool>,
    catalog: Arc<dyn Catalog>,
    directory: Arc<dyn Directory>,
    settings: PricingSettingsService,
    config: Arc<AppConfig>,
    event_sender: Option<Arc<EventSender>>,
}

impl BudgetService {
    pub fn new(
        db_pool: Arc<DbPool>,
        catalog: Arc<dyn Catalog>,
        directory: Arc<dyn Directory>,
        config: Arc<AppConfig>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            settings: PricingSettingsService::new(db_pool.clone()),
            db_pool,
            catalog,
            directory,
            config,
            event_sender,
        }
    }

    /// Creates a draft budget with priced lines and aggregated totals.
    #[instrument(skip(self, request), fields(vendor_id = %request.vendor_id, items = request.content.items.len()))]
    pub async fn create(&self, request: CreateBudgetRequest) -> Result<BudgetDetails, ServiceError> {
        if self.directory.get_user(request.vendor_id).await?.is_none() {
            return Err(ServiceError::ValidationError(format!(
                "Unknown vendor {}",
                request.vendor_id
            )));
        }
        let prepared = self.prepare(&request.content, false).await?;

        let started = Instant::now();
        let txn = db::begin(&self.db_pool).await?;

        let now = Utc::now();
        let budget_id = Uuid::new_v4();
        let vendor_id = request.vendor_id;
        let content = &request.content;
        let totals = &prepared.totals;
        let txn_ref = &txn;

        let budget = sequence::retry_on_collision(
            "budget",
            self.config.sequence_max_attempts,
            |attempt| async move {
                let number = sequence::next_budget_number(txn_ref, now, attempt).await?;
                let mut active = budget::ActiveModel {
                    id: Set(budget_id),
                    budget_number: Set(number),
                    vendor_id: Set(vendor_id),
                    client_id: Set(content.client_id),
                    contact_name: Set(content.contact_name.trim().to_string()),
                    contact_phone: Set(content.contact_phone.clone()),
                    contact_email: Set(content.contact_email.clone()),
                    contact_address: Set(content.contact_address.clone()),
                    status: Set(BudgetStatus::Draft),
                    discount_type: Set(content.discount.kind),
                    discount_value: Set(content.discount.value),
                    discount_authorized: Set(false),
                    authorized_by: Set(None),
                    authorized_at: Set(None),
                    rejection_reason: Set(None),
                    delivery_type: Set(content.delivery_type),
                    shipping_cost: Set(Money::new(content.shipping_cost).to_stored()),
                    notes: Set(content.notes.clone()),
                    converted_order_id: Set(None),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                };
                apply_totals(&mut active, totals);
                sequence::insert_numbered(txn_ref, active).await
            },
        )
        .await?;

        let (items, payment) = self
            .insert_lines_and_terms(&txn, budget_id, &request.content, &prepared)
            .await?;

        db::commit(txn, started).await?;
        metrics::BUDGETS_CREATED.inc();
        info!(budget_id = %budget.id, budget_number = %budget.budget_number, "Budget created");

        events::publish(self.event_sender.as_deref(), Event::BudgetCreated(budget.id)).await;

        Ok(BudgetDetails {
            budget,
            items,
            payment,
            totals: prepared.totals,
        })
    }

    #[instrument(skip(self), fields(budget_id = %budget_id))]
    pub async fn get(&self, budget_id: Uuid) -> Result<BudgetDetails, ServiceError> {
        let (budget, items, payment) = load_details(&*self.db_pool, budget_id).await?;
        let totals = aggregate_budget_total(&stored_aggregation_input(&budget, &items, &payment))?;
        Ok(BudgetDetails {
            budget,
            items,
            payment,
            totals,
        })
    }

    /// Replaces the commercial content of an editable budget. Any earlier
    /// discount authorization is void after an edit.
    #[instrument(skip(self, content), fields(budget_id = %budget_id))]
    pub async fn update(
        &self,
        budget_id: Uuid,
        content: BudgetContent,
    ) -> Result<BudgetDetails, ServiceError> {
        let prepared = self.prepare(&content, false).await?;

        let started = Instant::now();
        let txn = db::begin(&self.db_pool).await?;

        let (current, _, _) = load_details(&txn, budget_id).await?;
        if !current.status.is_editable() {
            return Err(ServiceError::InvalidStatus(format!(
                "Budget {} cannot be edited while '{}'",
                current.budget_number, current.status
            )));
        }

        let old_status = current.status;
        let status = if old_status == BudgetStatus::Sent && prepared.totals.requires_approval {
            old_status.transition_to(BudgetStatus::AwaitingApproval)?
        } else {
            old_status
        };

        budget_item::Entity::delete_many()
            .filter(budget_item::Column::BudgetId.eq(budget_id))
            .exec(&txn)
            .await?;
        budget_payment::Entity::delete_many()
            .filter(budget_payment::Column::BudgetId.eq(budget_id))
            .exec(&txn)
            .await?;

        let mut active: budget::ActiveModel = current.into();
        active.client_id = Set(content.client_id);
        active.contact_name = Set(content.contact_name.trim().to_string());
        active.contact_phone = Set(content.contact_phone.clone());
        active.contact_email = Set(content.contact_email.clone());
        active.contact_address = Set(content.contact_address.clone());
        active.status = Set(status);
        active.discount_type = Set(content.discount.kind);
        active.discount_value = Set(content.discount.value);
        active.discount_authorized = Set(false);
        active.authorized_by = Set(None);
        active.authorized_at = Set(None);
        active.delivery_type = Set(content.delivery_type);
        active.shipping_cost = Set(Money::new(content.shipping_cost).to_stored());
        active.notes = Set(content.notes.clone());
        apply_totals(&mut active, &prepared.totals);
        let budget = active.update(&txn).await?;

        let (items, payment) = self
            .insert_lines_and_terms(&txn, budget_id, &content, &prepared)
            .await?;

        db::commit(txn, started).await?;
        info!("Budget updated");

        if status != old_status {
            self.publish_status(budget_id, old_status, status).await;
        }

        Ok(BudgetDetails {
            budget,
            items,
            payment,
            totals: prepared.totals,
        })
    }

    /// Sends the budget to the client, or to an administrator when the
    /// discount or a line falls below its floor.
    #[instrument(skip(self), fields(budget_id = %budget_id))]
    pub async fn send(&self, budget_id: Uuid) -> Result<BudgetDetails, ServiceError> {
        self.transition(budget_id, |budget, totals| {
            let next = if totals.requires_approval && !budget.discount_authorized {
                BudgetStatus::AwaitingApproval
            } else {
                BudgetStatus::Sent
            };
            Ok(Decision::status(next))
        })
        .await
    }

    /// Client acceptance.
    #[instrument(skip(self), fields(budget_id = %budget_id))]
    pub async fn approve(&self, budget_id: Uuid) -> Result<BudgetDetails, ServiceError> {
        self.transition(budget_id, |budget, _| {
            if budget.status != BudgetStatus::Sent {
                return Err(ServiceError::InvalidStatus(format!(
                    "Budget {} cannot be approved while '{}'",
                    budget.budget_number, budget.status
                )));
            }
            Ok(Decision::status(BudgetStatus::Approved))
        })
        .await
    }

    #[instrument(skip(self, reason), fields(budget_id = %budget_id))]
    pub async fn reject(
        &self,
        budget_id: Uuid,
        reason: Option<String>,
    ) -> Result<BudgetDetails, ServiceError> {
        self.transition(budget_id, move |_, _| {
            Ok(Decision {
                status: BudgetStatus::Rejected,
                reason,
                authorized_by: None,
            })
        })
        .await
    }

    /// Administrator override: the budget may be sold below its floor.
    #[instrument(skip(self, review), fields(budget_id = %budget_id, admin_id = %review.admin_id))]
    pub async fn authorize(
        &self,
        budget_id: Uuid,
        review: ReviewRequest,
    ) -> Result<BudgetDetails, ServiceError> {
        review.validate()?;
        self.require_admin(review.admin_id).await?;
        self.transition(budget_id, move |_, _| {
            Ok(Decision {
                status: BudgetStatus::AdminApproved,
                reason: None,
                authorized_by: Some(review.admin_id),
            })
        })
        .await
    }

    #[instrument(skip(self, review), fields(budget_id = %budget_id, admin_id = %review.admin_id))]
    pub async fn deny(
        &self,
        budget_id: Uuid,
        review: ReviewRequest,
    ) -> Result<BudgetDetails, ServiceError> {
        review.validate()?;
        self.require_admin(review.admin_id).await?;
        self.transition(budget_id, move |_, _| {
            Ok(Decision {
                status: BudgetStatus::NotApproved,
                reason: review.reason,
                authorized_by: None,
            })
        })
        .await
    }

    async fn require_admin(&self, admin_id: Uuid) -> Result<(), ServiceError> {
        match self.directory.get_user(admin_id).await? {
            Some(user) if user.active && user.role == UserRole::Admin => Ok(()),
            _ => {
                warn!(%admin_id, "Budget review attempted by a non-administrator");
                Err(ServiceError::ValidationError(format!(
                    "User {} is not an active administrator",
                    admin_id
                )))
            }
        }
    }

    async fn transition<F>(&self, budget_id: Uuid, decide: F) -> Result<BudgetDetails, ServiceError>
    where
        F: FnOnce(&budget::Model, &BudgetTotals) -> Result<Decision, ServiceError>,
    {
        let started = Instant::now();
        let txn = db::begin(&self.db_pool).await?;

        let (current, items, payment) = load_details(&txn, budget_id).await?;
        let totals = aggregate_budget_total(&stored_aggregation_input(&current, &items, &payment))?;
        let decision = decide(&current, &totals)?;

        let old_status = current.status;
        let status = old_status.transition_to(decision.status)?;

        let mut active: budget::ActiveModel = current.clone().into();
        active.status = Set(status);
        if let Some(reason) = decision.reason {
            active.rejection_reason = Set(Some(reason));
        }

        let mut payment = payment;
        let totals = if let Some(admin_id) = decision.authorized_by {
            let mut authorized = current.clone();
            authorized.discount_authorized = true;
            let totals =
                aggregate_budget_total(&stored_aggregation_input(&authorized, &items, &payment))?;

            active.discount_authorized = Set(true);
            active.authorized_by = Set(Some(admin_id));
            active.authorized_at = Set(Some(Utc::now()));

            let mut terms: budget_payment::ActiveModel = payment.into();
            terms.down_payment = Set(totals.down_payment.to_stored());
            terms.remaining_amount = Set(totals.remaining.to_stored());
            payment = terms.update(&txn).await?;
            totals
        } else {
            totals
        };
        apply_totals(&mut active, &totals);
        let budget = active.update(&txn).await?;

        db::commit(txn, started).await?;
        info!(from = %old_status, to = %status, "Budget status changed");
        self.publish_status(budget_id, old_status, status).await;

        Ok(BudgetDetails {
            budget,
            items,
            payment,
            totals,
        })
    }

    async fn publish_status(&self, budget_id: Uuid, old: BudgetStatus, new: BudgetStatus) {
        if new == BudgetStatus::AwaitingApproval {
            metrics::BUDGETS_HELD.inc();
            warn!(%budget_id, "Budget held for administrator approval");
        }
        events::publish(
            self.event_sender.as_deref(),
            Event::BudgetStatusChanged {
                budget_id,
                old_status: old.to_string(),
                new_status: new.to_string(),
            },
        )
        .await;
    }

    /// Validates the content and prices it. Reads only, and must run before
    /// the write transaction opens.
    async fn prepare(
        &self,
        content: &BudgetContent,
        authorized: bool,
    ) -> Result<PreparedBudget, ServiceError> {
        content.validate()?;
        content.payment.validate()?;
        for item in &content.items {
            item.validate()?;
        }
        content.discount.validate_bounds()?;
        if content.general_customization_value < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "General customization value cannot be negative".into(),
            ));
        }
        let max_installments = self.config.financing.max_installments;
        if content.payment.installments > max_installments {
            return Err(ServiceError::ValidationError(format!(
                "At most {} installments are allowed",
                max_installments
            )));
        }

        if let Some(client_id) = content.client_id {
            if self.directory.get_client(client_id).await?.is_none() {
                return Err(ServiceError::ValidationError(format!(
                    "Unknown client {}",
                    client_id
                )));
            }
        }

        let mut products = Vec::with_capacity(content.items.len());
        for item in &content.items {
            let product = self.catalog.get_product(item.product_id).await?.ok_or_else(|| {
                ServiceError::ValidationError(format!("Unknown product {}", item.product_id))
            })?;
            products.push(product);
        }

        let settings = effective_settings(
            self.settings.get().await?,
            self.config.pricing.unmanaged_fallback,
        )?;

        let drafts: Vec<LineItemDraft> = content
            .items
            .iter()
            .zip(&products)
            .map(|(item, product)| LineItemDraft {
                unit_cost: product.cost,
                quantity: item.quantity,
                customization_value: item.customization_value,
                general_customization_value: content.general_customization_value,
                price_source: item.price_source,
                manual_unit_price: item.manual_unit_price,
                discount: item.discount,
            })
            .collect();
        let priced = price_line_items(&drafts, settings.as_ref())?;

        let monthly_interest_rate = self.config.financing.monthly_interest_rate;
        let totals = aggregate_budget_total(&AggregationInput {
            items: priced.iter().map(PricedLine::to_discount_line).collect(),
            discount: content.discount,
            discount_authorized: authorized,
            delivery_type: content.delivery_type,
            shipping_cost: content.shipping_cost,
            payment_method: content.payment.method,
            installments: content.payment.installments,
            monthly_interest_rate,
            down_payment: content.payment.down_payment,
        })?;

        let lines = content
            .items
            .iter()
            .cloned()
            .zip(products)
            .zip(priced)
            .map(|((request, product), priced)| PreparedLine {
                request,
                product,
                priced,
            })
            .collect();

        Ok(PreparedBudget {
            lines,
            totals,
            monthly_interest_rate,
        })
    }

    async fn insert_lines_and_terms<C: ConnectionTrait>(
        &self,
        conn: &C,
        budget_id: Uuid,
        content: &BudgetContent,
        prepared: &PreparedBudget,
    ) -> Result<(Vec<budget_item::Model>, budget_payment::Model), ServiceError> {
        let now = Utc::now();
        let mut items = Vec::with_capacity(prepared.lines.len());
        for (position, line) in prepared.lines.iter().enumerate() {
            let request = &line.request;
            let priced = &line.priced;
            let item = budget_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                budget_id: Set(budget_id),
                position: Set(position as i32),
                product_id: Set(line.product.id),
                product_name: Set(line.product.name.clone()),
                producer_ref: Set(ProducerRef::to_column(request.producer)),
                quantity: Set(request.quantity),
                unit_cost: Set(Money::new(line.product.cost).to_stored()),
                customization_value: Set(Money::new(request.customization_value).to_stored()),
                customization_description: Set(request.customization_description.clone()),
                general_customization_value: Set(
                    Money::new(content.general_customization_value).to_stored()
                ),
                price_source: Set(request.price_source),
                unit_price: Set(priced.unit_price.to_stored()),
                minimum_price: Set(priced.minimum_price.to_stored()),
                base_price_with_margin: Set(priced.base_price_with_margin.to_stored()),
                below_minimum: Set(priced.below_minimum),
                discount_type: Set(request.discount.kind),
                discount_value: Set(request.discount.value),
                discount_amount: Set(priced.discount_amount.to_stored()),
                total_price: Set(priced.total_price.to_stored()),
                width: Set(request.width.or(line.product.width)),
                height: Set(request.height.or(line.product.height)),
                depth: Set(request.depth.or(line.product.depth)),
                created_at: Set(now),
            }
            .insert(conn)
            .await?;
            items.push(item);
        }

        let totals = &prepared.totals;
        let payment = budget_payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            budget_id: Set(budget_id),
            payment_method: Set(content.payment.method),
            installments: Set(content.payment.installments as i32),
            monthly_interest_rate: Set(prepared.monthly_interest_rate),
            down_payment: Set(totals.down_payment.to_stored()),
            down_payment_custom: Set(totals.down_payment_custom),
            remaining_amount: Set(totals.remaining.to_stored()),
        }
        .insert(conn)
        .await?;

        Ok((items, payment))
    }
}

/// Outcome of a lifecycle decision.
struct Decision {
    status: BudgetStatus,
    reason: Option<String>,
    authorized_by: Option<Uuid>,
}

impl Decision {
    fn status(status: BudgetStatus) -> Self {
        Self {
            status,
            reason: None,
            authorized_by: None,
        }
    }
}
