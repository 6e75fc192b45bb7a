use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::entities::accounts_receivable;
use crate::services::receivables::{CreateReceivableRequest, PaymentOutcome, RecordPaymentRequest};
use crate::{errors::ServiceError, ApiResponse, ApiResult, AppState};

pub async fn record_payment(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentOutcome>>), ServiceError> {
    let outcome = state.services.ledger.record_payment(order_id, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(outcome))))
}

pub async fn cancel_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> ApiResult<PaymentOutcome> {
    Ok(Json(ApiResponse::success(
        state.services.ledger.cancel_payment(payment_id).await?,
    )))
}

pub async fn create_receivable(
    State(state): State<AppState>,
    Json(request): Json<CreateReceivableRequest>,
) -> Result<(StatusCode, Json<ApiResponse<accounts_receivable::Model>>), ServiceError> {
    let receivable = state.services.ledger.create_manual(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(receivable))))
}

pub async fn record_receipt(
    State(state): State<AppState>,
    Path(receivable_id): Path<Uuid>,
    Json(request): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentOutcome>>), ServiceError> {
    let outcome = state
        .services
        .ledger
        .record_receipt(receivable_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(outcome))))
}
