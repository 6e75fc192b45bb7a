//! Budget Engine Library
//!
//! Pricing, discount guarding, budget-to-order conversion and settlement
//! (commissions, receivables, payments) for a sales/production ERP.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod directory;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod metrics;
pub mod migrator;
pub mod models;
pub mod money;
pub mod services;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::db::DbPool;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: Arc<config::AppConfig>,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<DbPool>,
        config: Arc<config::AppConfig>,
        event_sender: Option<Arc<events::EventSender>>,
    ) -> Self {
        let services = handlers::AppServices::new(db.clone(), config.clone(), event_sender);
        Self {
            db,
            config,
            services,
        }
    }
}

/// Response envelope shared by every JSON endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

pub fn api_v1_routes() -> Router<AppState> {
    let pricing = Router::new()
        .route("/pricing/line-items", post(handlers::pricing::price_lines))
        .route(
            "/pricing/settings",
            get(handlers::pricing::get_settings).put(handlers::pricing::replace_settings),
        );

    let budgets = Router::new()
        .route(
            "/budgets/discount-evaluation",
            post(handlers::pricing::evaluate_discount),
        )
        .route("/budgets", post(handlers::budgets::create_budget))
        .route(
            "/budgets/:id",
            get(handlers::budgets::get_budget).put(handlers::budgets::update_budget),
        )
        .route("/budgets/:id/send", post(handlers::budgets::send_budget))
        .route(
            "/budgets/:id/approve",
            post(handlers::budgets::approve_budget),
        )
        .route("/budgets/:id/reject", post(handlers::budgets::reject_budget))
        .route(
            "/budgets/:id/authorize",
            post(handlers::budgets::authorize_budget),
        )
        .route("/budgets/:id/deny", post(handlers::budgets::deny_budget))
        .route(
            "/budgets/:id/convert",
            post(handlers::budgets::convert_budget),
        );

    let orders = Router::new()
        .route("/orders/:id", get(handlers::orders::get_order))
        .route(
            "/orders/:id/status",
            put(handlers::orders::update_order_status),
        )
        .route("/orders/:id/value", put(handlers::orders::update_order_value))
        .route(
            "/orders/:id/payments",
            post(handlers::receivables::record_payment),
        )
        .route(
            "/orders/:id/commissions/recalculate",
            post(handlers::orders::recalculate_commissions),
        );

    let settlement = Router::new()
        .route(
            "/payments/:id/cancel",
            post(handlers::receivables::cancel_payment),
        )
        .route(
            "/commissions/totals",
            get(handlers::orders::commission_totals),
        )
        .route(
            "/commissions/:id/pay",
            post(handlers::orders::pay_commission),
        )
        .route(
            "/receivables",
            post(handlers::receivables::create_receivable),
        )
        .route(
            "/receivables/:id/receipts",
            post(handlers::receivables::record_receipt),
        );

    Router::new()
        .route("/health", get(health))
        .merge(pricing)
        .merge(budgets)
        .merge(orders)
        .merge(settlement)
}

/// Liveness plus a database ping.
pub async fn health(State(state): State<AppState>) -> Response {
    match db::check_connection(&state.db).await {
        Ok(()) => Json(json!({
            "status": "ok",
            "database": "up",
            "timestamp": Utc::now().to_rfc3339(),
        }))
        .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "degraded",
                "database": "down",
                "error": e.response_message(),
                "timestamp": Utc::now().to_rfc3339(),
            })),
        )
            .into_response(),
    }
}

/// Prometheus text exposition.
pub async fn metrics_text() -> Response {
    match metrics::gather_text() {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            String::from("metrics error"),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_omits_absent_message() {
        let json = serde_json::to_value(ApiResponse::success(1)).unwrap();
        assert_eq!(json, json!({"success": true, "data": 1}));

        let json = serde_json::to_value(ApiResponse::<()>::error("nope".into())).unwrap();
        assert_eq!(
            json,
            json!({"success": false, "data": null, "message": "nope"})
        );
    }
}
