use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::services::budgets::{BudgetContent, BudgetDetails, CreateBudgetRequest, ReviewRequest};
use crate::services::conversion::{ConvertBudgetRequest, ConvertedOrder};
use crate::{errors::ServiceError, ApiResponse, ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct RejectBudgetRequest {
    pub reason: Option<String>,
}

pub async fn create_budget(
    State(state): State<AppState>,
    Json(request): Json<CreateBudgetRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BudgetDetails>>), ServiceError> {
    let details = state.services.budgets.create(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(details, "Budget created")),
    ))
}

pub async fn get_budget(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<BudgetDetails> {
    Ok(Json(ApiResponse::success(state.services.budgets.get(id).await?)))
}

pub async fn update_budget(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(content): Json<BudgetContent>,
) -> ApiResult<BudgetDetails> {
    Ok(Json(ApiResponse::success(
        state.services.budgets.update(id, content).await?,
    )))
}

pub async fn send_budget(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<BudgetDetails> {
    Ok(Json(ApiResponse::success(state.services.budgets.send(id).await?)))
}

pub async fn approve_budget(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<BudgetDetails> {
    Ok(Json(ApiResponse::success(
        state.services.budgets.approve(id).await?,
    )))
}

pub async fn reject_budget(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RejectBudgetRequest>,
) -> ApiResult<BudgetDetails> {
    Ok(Json(ApiResponse::success(
        state.services.budgets.reject(id, request.reason).await?,
    )))
}

pub async fn authorize_budget(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(review): Json<ReviewRequest>,
) -> ApiResult<BudgetDetails> {
    Ok(Json(ApiResponse::success(
        state.services.budgets.authorize(id, review).await?,
    )))
}

pub async fn deny_budget(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(review): Json<ReviewRequest>,
) -> ApiResult<BudgetDetails> {
    Ok(Json(ApiResponse::success(
        state.services.budgets.deny(id, review).await?,
    )))
}

pub async fn convert_budget(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ConvertBudgetRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ConvertedOrder>>), ServiceError> {
    let converted = state.services.conversion.convert(id, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(
            converted,
            "Budget converted to order",
        )),
    ))
}
