use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::models::Discount;
use crate::services::discount::{evaluate_budget_discount, DiscountEvaluation, DiscountLine};
use crate::services::line_items::{price_line_items, LineItemDraft, PricedLine};
use crate::services::pricing::{effective_settings, PricingSettings};
use crate::{errors::ServiceError, ApiResponse, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct PriceLinesRequest {
    pub items: Vec<LineItemDraft>,
    /// Prices against these settings instead of the stored ones.
    #[serde(default)]
    pub settings: Option<PricingSettings>,
}

#[derive(Debug, Serialize)]
pub struct PriceLinesResponse {
    pub items: Vec<PricedLine>,
    pub managed: bool,
}

#[derive(Debug, Deserialize)]
pub struct DiscountEvaluationRequest {
    pub items: Vec<DiscountLine>,
    #[serde(default)]
    pub discount: Discount,
    #[serde(default)]
    pub authorized: bool,
}

/// Prices lines in order, threading running revenue across them.
pub async fn price_lines(
    State(state): State<AppState>,
    Json(request): Json<PriceLinesRequest>,
) -> ApiResult<PriceLinesResponse> {
    if request.items.is_empty() {
        return Err(ServiceError::ValidationError(
            "At least one line is required".to_string(),
        ));
    }
    let settings = match request.settings {
        Some(settings) => {
            settings.check()?;
            Some(settings)
        }
        None => effective_settings(
            state.services.pricing_settings.get().await?,
            state.config.pricing.unmanaged_fallback,
        )?,
    };

    let items = price_line_items(&request.items, settings.as_ref())?;
    Ok(Json(ApiResponse::success(PriceLinesResponse {
        items,
        managed: settings.is_some(),
    })))
}

pub async fn get_settings(State(state): State<AppState>) -> ApiResult<Option<PricingSettings>> {
    let settings = state.services.pricing_settings.get().await?;
    Ok(Json(ApiResponse::success(settings)))
}

pub async fn replace_settings(
    State(state): State<AppState>,
    Json(settings): Json<PricingSettings>,
) -> ApiResult<PricingSettings> {
    let stored = state.services.pricing_settings.replace(settings).await?;
    Ok(Json(ApiResponse::success_with_message(
        stored,
        "Pricing settings replaced",
    )))
}

pub async fn evaluate_discount(
    Json(request): Json<DiscountEvaluationRequest>,
) -> ApiResult<DiscountEvaluation> {
    let evaluation =
        evaluate_budget_discount(&request.items, request.discount, request.authorized)?;
    Ok(Json(ApiResponse::success(evaluation)))
}
