mod common;

use assert_matches::assert_matches;
use budget_engine::{
    entities::{budget, order, production_order},
    errors::ServiceError,
    models::{
        BudgetStatus, CommissionStatus, CommissionType, OrderStatus, ProducerRef,
        ReceivableStatus,
    },
    services::conversion::ConvertBudgetRequest,
};
use chrono::{Duration, Utc};
use common::{external, TestApp};
use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, PaginatorTrait};
use uuid::Uuid;

#[tokio::test]
async fn two_producers_yield_two_production_orders() {
    let app = TestApp::new().await;
    let producer_a = Uuid::new_v4();
    let producer_b = Uuid::new_v4();

    let mut first = app.item(app.seed.product, 2);
    first.producer = external(producer_a);
    first.customization_value = dec!(5);
    first.customization_description = Some("Engraved logo".to_string());
    first.width = Some(dec!(1.50));
    let mut second = app.item(app.seed.product, 1);
    second.producer = external(producer_b);

    let budget = app.approved_budget(app.content(vec![first, second])).await;
    let converted = app.convert(budget.budget.id).await;

    assert_eq!(converted.production_orders.len(), 2);
    for po in &converted.production_orders {
        assert_eq!(po.items.len(), 1);
        assert_eq!(po.production_order.status, "pending");
    }

    let for_a = converted
        .production_orders
        .iter()
        .find(|po| po.production_order.producer_id == producer_a)
        .expect("production order for producer A");
    let line = &for_a.items[0];
    assert_eq!(line.quantity, 2);
    assert_eq!(line.customization_value, dec!(5.00));
    assert_eq!(line.customization_description.as_deref(), Some("Engraved logo"));
    assert_eq!(line.width, Some(dec!(1.50)));

    assert_eq!(converted.items.len(), 2);
    assert_eq!(
        production_order::Entity::find().count(app.db()).await.unwrap(),
        2
    );
}

#[tokio::test]
async fn internal_and_unassigned_lines_stay_in_house() {
    let app = TestApp::new().await;
    let producer = Uuid::new_v4();

    let mut internal = app.item(app.seed.product, 1);
    internal.producer = Some(ProducerRef::Internal);
    let unassigned = app.item(app.seed.product, 1);
    let mut outsourced = app.item(app.seed.product, 3);
    outsourced.producer = external(producer);

    let budget = app
        .approved_budget(app.content(vec![internal, unassigned, outsourced]))
        .await;
    let converted = app.convert(budget.budget.id).await;

    assert_eq!(converted.items.len(), 3);
    assert_eq!(converted.production_orders.len(), 1);
    assert_eq!(converted.production_orders[0].production_order.producer_id, producer);
    assert_eq!(converted.production_orders[0].items[0].quantity, 3);
}

#[tokio::test]
async fn order_copies_terms_and_snapshots_the_client_record() {
    let app = TestApp::new().await;
    let budget = app
        .approved_budget(app.content(vec![app.item(app.seed.product, 1)]))
        .await;
    let delivery = Utc::now() + Duration::days(20);

    let converted = app
        .state
        .services
        .conversion
        .convert(
            budget.budget.id,
            ConvertBudgetRequest {
                client_id: Some(app.seed.client),
                delivery_date: Some(delivery),
            },
        )
        .await
        .unwrap();

    let order = &converted.order;
    assert!(order.order_number.starts_with("PED-"));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.client_id, app.seed.client);
    // the client record wins over the contact captured on the budget
    assert_eq!(order.client_name, "Casa Verde Ltda");
    assert_eq!(order.client_email.as_deref(), Some("compras@casaverde.example"));
    assert_eq!(order.total_value, budget.budget.total);
    assert_eq!(order.total_value, dec!(142.86));
    assert_eq!(order.down_payment, budget.payment.down_payment);
    assert_eq!(order.payment_method, budget.payment.payment_method);
    assert_eq!(order.paid_value, dec!(0));
    assert_eq!(
        order.delivery_date.map(|d| d.timestamp()),
        Some(delivery.timestamp())
    );

    let receivable = &converted.receivable;
    assert_eq!(receivable.order_id, Some(order.id));
    assert_eq!(receivable.amount, dec!(142.86));
    assert_eq!(receivable.minimum_payment, dec!(71.43));
    assert_eq!(receivable.status, ReceivableStatus::Pending);

    let stored = budget::Entity::find_by_id(budget.budget.id)
        .one(app.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, BudgetStatus::Converted);
    assert_eq!(stored.converted_order_id, Some(order.id));
    assert_eq!(stored.client_id, Some(app.seed.client));
}

#[tokio::test]
async fn conversion_creates_vendor_and_partner_commissions() {
    let app = TestApp::new().await;
    let converted = app.thousand_order().await;

    assert_eq!(converted.order.total_value, dec!(1000.00));
    assert_eq!(converted.commissions.len(), 3);

    let vendor: Vec<_> = converted
        .commissions
        .iter()
        .filter(|c| c.commission_type == CommissionType::Vendor)
        .collect();
    assert_eq!(vendor.len(), 1);
    assert_eq!(vendor[0].payee_id, app.seed.vendor);
    assert_eq!(vendor[0].amount, dec!(100.00));
    assert_eq!(vendor[0].status, CommissionStatus::Pending);

    for partner in converted
        .commissions
        .iter()
        .filter(|c| c.commission_type == CommissionType::Partner)
    {
        assert!(app.seed.partners.contains(&partner.payee_id));
        assert_eq!(partner.amount, dec!(75.00));
        assert_eq!(partner.status, CommissionStatus::Confirmed);
    }
}

#[tokio::test]
async fn converting_twice_is_a_conflict() {
    let app = TestApp::new().await;
    let budget = app
        .approved_budget(app.content(vec![app.item(app.seed.product, 1)]))
        .await;
    app.convert(budget.budget.id).await;

    let again = app
        .state
        .services
        .conversion
        .convert(budget.budget.id, ConvertBudgetRequest::default())
        .await;
    assert_matches!(again, Err(ServiceError::ConversionConflict(_)));
    assert_eq!(order::Entity::find().count(app.db()).await.unwrap(), 1);
}

#[tokio::test]
async fn unapproved_budgets_are_refused() {
    let app = TestApp::new().await;
    let draft = app
        .create_budget(app.content(vec![app.item(app.seed.product, 1)]))
        .await;

    let result = app
        .state
        .services
        .conversion
        .convert(
            draft.budget.id,
            ConvertBudgetRequest {
                client_id: Some(app.seed.client),
                delivery_date: None,
            },
        )
        .await;
    assert_matches!(result, Err(ServiceError::NotApproved(_)));
    assert_eq!(order::Entity::find().count(app.db()).await.unwrap(), 0);
}

#[tokio::test]
async fn a_client_is_required() {
    let app = TestApp::new().await;
    let budget = app
        .approved_budget(app.content(vec![app.item(app.seed.product, 1)]))
        .await;

    let result = app
        .state
        .services
        .conversion
        .convert(budget.budget.id, ConvertBudgetRequest::default())
        .await;
    assert_matches!(result, Err(ServiceError::ClientRequired(id)) if id == budget.budget.id);

    let stored = budget::Entity::find_by_id(budget.budget.id)
        .one(app.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, BudgetStatus::Approved);
}

#[tokio::test]
async fn budget_client_is_used_when_none_is_supplied() {
    let app = TestApp::new().await;
    let mut content = app.content(vec![app.item(app.seed.product, 1)]);
    content.client_id = Some(app.seed.client);
    let budget = app.approved_budget(content).await;

    let converted = app
        .state
        .services
        .conversion
        .convert(budget.budget.id, ConvertBudgetRequest::default())
        .await
        .unwrap();
    assert_eq!(converted.order.client_id, app.seed.client);
}

#[tokio::test]
async fn unknown_client_leaves_nothing_behind() {
    let app = TestApp::new().await;
    let budget = app
        .approved_budget(app.content(vec![app.item(app.seed.product, 1)]))
        .await;

    let result = app
        .state
        .services
        .conversion
        .convert(
            budget.budget.id,
            ConvertBudgetRequest {
                client_id: Some(Uuid::new_v4()),
                delivery_date: None,
            },
        )
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
    assert_eq!(order::Entity::find().count(app.db()).await.unwrap(), 0);
    assert_eq!(
        production_order::Entity::find().count(app.db()).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn concurrent_conversions_create_one_order() {
    let app = TestApp::new().await;
    let producer = Uuid::new_v4();
    let mut line = app.item(app.seed.product, 1);
    line.producer = external(producer);
    let budget = app.approved_budget(app.content(vec![line])).await;

    let request = || ConvertBudgetRequest {
        client_id: Some(app.seed.client),
        delivery_date: None,
    };
    let conversion = &app.state.services.conversion;
    let (first, second) = futures::join!(
        conversion.convert(budget.budget.id, request()),
        conversion.convert(budget.budget.id, request()),
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(ServiceError::ConversionConflict(_)))));
    assert_eq!(order::Entity::find().count(app.db()).await.unwrap(), 1);
    assert_eq!(
        production_order::Entity::find().count(app.db()).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn concurrent_conversions_on_a_shared_file_database() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("engine.db").display()
    );
    let app = TestApp::with_database(url, 4).await;
    let budget = app
        .approved_budget(app.content(vec![app.item(app.seed.product, 2)]))
        .await;

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let conversion = app.state.services.conversion.clone();
        let client_id = app.seed.client;
        let budget_id = budget.budget.id;
        tasks.push(tokio::spawn(async move {
            conversion
                .convert(
                    budget_id,
                    ConvertBudgetRequest {
                        client_id: Some(client_id),
                        delivery_date: None,
                    },
                )
                .await
        }));
    }

    let mut converted = 0;
    for task in futures::future::join_all(tasks).await {
        if task.expect("conversion task").is_ok() {
            converted += 1;
        }
    }
    assert_eq!(converted, 1);
    assert_eq!(
        order::Entity::find().count(app.db()).await.unwrap(),
        converted
    );
}

#[tokio::test]
async fn order_numbers_are_sequential() {
    let app = TestApp::new().await;
    let mut numbers = Vec::new();
    for _ in 0..3 {
        let budget = app
            .approved_budget(app.content(vec![app.item(app.seed.product, 1)]))
            .await;
        numbers.push(app.convert(budget.budget.id).await.order.order_number);
    }

    let prefix = &numbers[0][..numbers[0].len() - 6];
    assert!(numbers[0].ends_with("000001"));
    assert_eq!(numbers[1], format!("{}000002", prefix));
    assert_eq!(numbers[2], format!("{}000003", prefix));
}
