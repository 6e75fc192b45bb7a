use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::{commission, order};
use crate::services::commissions::PayeeTotal;
use crate::services::orders::{OrderDetails, UpdateOrderStatusRequest, UpdateOrderValueRequest};
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct CommissionTotalsQuery {
    pub payee_id: Option<Uuid>,
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderDetails> {
    Ok(Json(ApiResponse::success(state.services.orders.get(id).await?)))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> ApiResult<order::Model> {
    Ok(Json(ApiResponse::success(
        state.services.orders.update_status(id, request).await?,
    )))
}

pub async fn update_order_value(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateOrderValueRequest>,
) -> ApiResult<order::Model> {
    Ok(Json(ApiResponse::success(
        state
            .services
            .orders
            .update_value(id, request.total_value)
            .await?,
    )))
}

pub async fn recalculate_commissions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<commission::Model>> {
    Ok(Json(ApiResponse::success(
        state.services.commissions.recalculate(id).await?,
    )))
}

pub async fn commission_totals(
    State(state): State<AppState>,
    Query(query): Query<CommissionTotalsQuery>,
) -> ApiResult<Vec<PayeeTotal>> {
    Ok(Json(ApiResponse::success(
        state.services.commissions.totals(query.payee_id).await?,
    )))
}

pub async fn pay_commission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<commission::Model> {
    Ok(Json(ApiResponse::success(
        state.services.commissions.mark_paid(id).await?,
    )))
}
