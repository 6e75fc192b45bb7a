#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use budget_engine::{
    config::AppConfig,
    db::{self, DbPool},
    entities::{client, product, user},
    events::{self, EventSender},
    models::{
        DeliveryType, Discount, PaymentMethod, PriceSource, ProducerRef, UserRole,
    },
    services::{
        budgets::{BudgetContent, BudgetDetails, BudgetItemRequest, CreateBudgetRequest,
            PaymentTermsRequest},
        conversion::{ConvertBudgetRequest, ConvertedOrder},
        pricing::{MarginTier, PricingSettings},
    },
    AppState,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

/// People and products seeded into every test database.
pub struct Seed {
    pub vendor: Uuid,
    pub admin: Uuid,
    pub partners: Vec<Uuid>,
    pub client: Uuid,
    /// Costs 100.00; the default tiers price it at 142.86 with a 111.11 floor.
    pub product: Uuid,
    /// Costs 700.00; prices at exactly 1000.00.
    pub premium_product: Uuid,
}

/// Application state backed by a fresh in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub seed: Seed,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_database("sqlite::memory:".to_string(), 1).await
    }

    /// Same as [`TestApp::new`] against any database url and pool size.
    pub async fn with_database(url: String, max_connections: u32) -> Self {
        let mut cfg = AppConfig::new(url, "127.0.0.1".to_string(), 18_080, "test".to_string());
        cfg.auto_migrate = true;
        cfg.db_max_connections = max_connections;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        budget_engine::metrics::register_metrics();

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(db_arc, Arc::new(cfg), Some(event_sender));
        let seed = seed_directory(&state.db).await;
        state
            .services
            .pricing_settings
            .replace(default_pricing())
            .await
            .expect("seed pricing settings");

        let router = Router::new()
            .nest("/api/v1", budget_engine::api_v1_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            seed,
            _event_task: event_task,
        }
    }

    pub fn db(&self) -> &DbPool {
        &self.state.db
    }

    /// Sends a JSON request through the router and decodes the body.
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response body is json")
        };
        (status, json)
    }

    pub fn item(&self, product_id: Uuid, quantity: i32) -> BudgetItemRequest {
        BudgetItemRequest {
            product_id,
            producer: None,
            quantity,
            customization_value: Decimal::ZERO,
            customization_description: None,
            price_source: PriceSource::Computed,
            manual_unit_price: None,
            discount: Discount::NONE,
            width: None,
            height: None,
            depth: None,
        }
    }

    pub fn content(&self, items: Vec<BudgetItemRequest>) -> BudgetContent {
        BudgetContent {
            client_id: None,
            contact_name: "Marina Alves".to_string(),
            contact_phone: Some("+55 11 90000-0000".to_string()),
            contact_email: Some("marina@example.com".to_string()),
            contact_address: None,
            items,
            discount: Discount::NONE,
            general_customization_value: Decimal::ZERO,
            delivery_type: DeliveryType::Pickup,
            shipping_cost: Decimal::ZERO,
            payment: PaymentTermsRequest {
                method: PaymentMethod::Pix,
                installments: 1,
                down_payment: None,
            },
            notes: None,
        }
    }

    pub async fn create_budget(&self, content: BudgetContent) -> BudgetDetails {
        self.state
            .services
            .budgets
            .create(CreateBudgetRequest {
                vendor_id: self.seed.vendor,
                content,
            })
            .await
            .expect("create budget")
    }

    /// A budget the client has accepted, ready for conversion.
    pub async fn approved_budget(&self, content: BudgetContent) -> BudgetDetails {
        let budget = self.create_budget(content).await;
        let budgets = &self.state.services.budgets;
        budgets.send(budget.budget.id).await.expect("send budget");
        budgets.approve(budget.budget.id).await.expect("approve budget")
    }

    pub async fn convert(&self, budget_id: Uuid) -> ConvertedOrder {
        self.state
            .services
            .conversion
            .convert(
                budget_id,
                ConvertBudgetRequest {
                    client_id: Some(self.seed.client),
                    delivery_date: None,
                },
            )
            .await
            .expect("convert budget")
    }

    /// Converts a single-line budget of the premium product: a 1000.00 order.
    pub async fn thousand_order(&self) -> ConvertedOrder {
        let budget = self
            .approved_budget(self.content(vec![self.item(self.seed.premium_product, 1)]))
            .await;
        self.convert(budget.budget.id).await
    }

    pub async fn add_user(&self, role: UserRole, active: bool, commissionable: bool) -> Uuid {
        insert_user(&self.state.db, role, active, commissionable, None).await
    }

    pub async fn add_product(&self, cost: Decimal) -> Uuid {
        insert_product(&self.state.db, cost).await
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// One 30% tier from zero revenue, a 40% tier from 5000, 10% minimum margin.
pub fn default_pricing() -> PricingSettings {
    PricingSettings {
        tiers: vec![
            MarginTier {
                revenue_threshold: dec!(0),
                margin_percent: dec!(30),
            },
            MarginTier {
                revenue_threshold: dec!(5000),
                margin_percent: dec!(40),
            },
        ],
        minimum_margin_percent: dec!(10),
    }
}

pub fn external(producer: Uuid) -> Option<ProducerRef> {
    Some(ProducerRef::External(producer))
}

async fn seed_directory(db: &DbPool) -> Seed {
    let vendor = insert_user(db, UserRole::Vendor, true, true, Some(dec!(10))).await;
    let admin = insert_user(db, UserRole::Admin, true, false, None).await;
    let mut partners = vec![
        insert_user(db, UserRole::Partner, true, true, None).await,
        insert_user(db, UserRole::Partner, true, true, None).await,
    ];
    partners.sort();
    // inactive partners never share the pool
    insert_user(db, UserRole::Partner, false, true, None).await;

    let client = client::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set("Casa Verde Ltda".to_string()),
        phone: Set(Some("+55 11 3333-4444".to_string())),
        email: Set(Some("compras@casaverde.example".to_string())),
        address: Set(Some("Rua das Flores, 100".to_string())),
    }
    .insert(db)
    .await
    .expect("seed client")
    .id;

    Seed {
        vendor,
        admin,
        partners,
        client,
        product: insert_product(db, dec!(100)).await,
        premium_product: insert_product(db, dec!(700)).await,
    }
}

async fn insert_user(
    db: &DbPool,
    role: UserRole,
    active: bool,
    commissionable: bool,
    commission_rate: Option<Decimal>,
) -> Uuid {
    let id = Uuid::new_v4();
    user::ActiveModel {
        id: Set(id),
        name: Set(format!("{} {}", role, &id.to_string()[..8])),
        email: Set(format!("{}@example.com", id)),
        role: Set(role),
        active: Set(active),
        commissionable: Set(commissionable),
        commission_rate: Set(commission_rate),
    }
    .insert(db)
    .await
    .expect("seed user");
    id
}

async fn insert_product(db: &DbPool, cost: Decimal) -> Uuid {
    product::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(format!("Product {}", cost)),
        category: Set(Some("furniture".to_string())),
        cost: Set(cost),
        width: Set(Some(dec!(1.20))),
        height: Set(Some(dec!(0.75))),
        depth: Set(Some(dec!(0.60))),
    }
    .insert(db)
    .await
    .expect("seed product")
    .id
}
