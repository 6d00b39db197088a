//! Admin review handlers
//!
//! Manual payment review and operator cancellation. Every route requires the
//! `X-Admin-Token` header.

use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use ledgerly_billing_core::crypto::constant_time_str_eq;
use ledgerly_billing_core::AccountSubscription;

use crate::error::{ApiError, ApiResult};
use crate::handlers::shared::{
    parse_account_id, record_activation, record_op_duration, validate_text,
};
use crate::handlers::subscription::{subscription_response, SubscriptionResponse};
use crate::state::AppState;

/// Header carrying the admin token
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

const DEFAULT_REVIEW_LIMIT: i64 = 50;
const MAX_REVIEW_LIMIT: i64 = 200;

/// Extractor that requires the configured admin token.
///
/// Returns 401 Unauthorized when the header is missing or wrong.
#[derive(Debug, Clone, Copy)]
pub struct AdminToken;

impl FromRequestParts<AppState> for AdminToken {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        if constant_time_str_eq(provided, state.admin_token()) {
            Ok(Self)
        } else {
            tracing::warn!(path = %parts.uri.path(), "Rejected admin request with bad token");
            Err(ApiError::Unauthorized)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReviewQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PendingReviewsResponse {
    pub pending: Vec<AccountSubscription>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

/// GET /api/v1/admin/manual-payments
pub async fn list_pending_reviews(
    _admin: AdminToken,
    State(state): State<AppState>,
    Query(query): Query<ReviewQuery>,
) -> ApiResult<Json<PendingReviewsResponse>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_REVIEW_LIMIT)
        .clamp(1, MAX_REVIEW_LIMIT);

    let pending = state.billing.pending_reviews(limit).await?;
    Ok(Json(PendingReviewsResponse { pending }))
}

/// POST /api/v1/admin/manual-payments/{id}/approve
pub async fn approve_manual_payment(
    _admin: AdminToken,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SubscriptionResponse>> {
    let start = Instant::now();
    let account_id = parse_account_id(&id)?;

    let result = state.billing.approve_manual_payment(account_id).await;
    record_op_duration("approve_manual_payment", start, result.is_ok());
    let update = result?;

    if update.changed {
        record_activation("manual_approval");
    }
    tracing::info!(account_id = %account_id, "Manual payment approved");

    Ok(Json(subscription_response(&state, update)))
}

/// POST /api/v1/admin/manual-payments/{id}/reject
pub async fn reject_manual_payment(
    _admin: AdminToken,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RejectRequest>,
) -> ApiResult<Json<SubscriptionResponse>> {
    let start = Instant::now();
    let account_id = parse_account_id(&id)?;
    validate_text(&req.reason, "reason")?;

    let result = state
        .billing
        .reject_manual_payment(account_id, req.reason.trim())
        .await;
    record_op_duration("reject_manual_payment", start, result.is_ok());

    Ok(Json(subscription_response(&state, result?)))
}

/// POST /api/v1/admin/accounts/{id}/cancel
pub async fn cancel_subscription(
    _admin: AdminToken,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SubscriptionResponse>> {
    let start = Instant::now();
    let account_id = parse_account_id(&id)?;

    let result = state.billing.cancel_subscription(account_id).await;
    record_op_duration("cancel_subscription", start, result.is_ok());
    let update = result?;

    if update.changed {
        metrics::counter!("billing_subscriptions_canceled_total").increment(1);
    }

    Ok(Json(subscription_response(&state, update)))
}
