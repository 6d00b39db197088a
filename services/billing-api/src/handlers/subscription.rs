//! Subscription handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use ledgerly_billing_core::{
    AccountSubscription, CheckoutSession, PaymentConfirmation, SnapshotUpdate,
};
use ledgerly_types::Plan;

use crate::error::ApiResult;
use crate::handlers::shared::{
    normalize_utr, parse_account_id, parse_plan_id, record_activation, record_op_duration,
    validate_id,
};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    pub account_id: String,
    pub plan_id: String,
    #[serde(default)]
    pub renewal: bool,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub account_id: String,
    pub plan_id: String,
    pub payment_id: String,
    pub subscription_id: String,
    pub signature: String,
    #[serde(default)]
    pub renewal: bool,
}

#[derive(Debug, Deserialize)]
pub struct ManualPaymentRequest {
    pub account_id: String,
    pub plan_id: String,
    pub utr: String,
    #[serde(default)]
    pub renewal: bool,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    #[serde(flatten)]
    pub subscription: AccountSubscription,
    /// False when the request had already been applied
    pub changed: bool,
}

#[derive(Debug, Serialize)]
pub struct PlansResponse {
    pub plans: Vec<Plan>,
}

/// Snapshot update as returned to clients
pub fn subscription_response(state: &AppState, update: SnapshotUpdate) -> SubscriptionResponse {
    SubscriptionResponse {
        subscription: state.billing.view(update.account_id, update.snapshot),
        changed: update.changed,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/billing/accounts/{id}/subscription
pub async fn get_subscription(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AccountSubscription>> {
    let start = Instant::now();
    let account_id = parse_account_id(&id)?;

    let result = state.billing.get_subscription(account_id).await;
    record_op_duration("get_subscription", start, result.is_ok());

    Ok(Json(result?))
}

/// GET /api/v1/billing/plans
pub async fn list_plans(State(state): State<AppState>) -> ApiResult<Json<PlansResponse>> {
    let plans = state.billing.list_plans().await?;
    Ok(Json(PlansResponse { plans }))
}

/// POST /api/v1/billing/checkout
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(req): Json<CreateCheckoutRequest>,
) -> ApiResult<Json<CheckoutSession>> {
    let start = Instant::now();

    let account_id = parse_account_id(&req.account_id)?;
    let plan_id = parse_plan_id(&req.plan_id)?;

    let result = state
        .billing
        .start_checkout(account_id, &plan_id, req.renewal)
        .await;
    record_op_duration("create_checkout", start, result.is_ok());
    let session = result?;

    metrics::counter!("billing_checkouts_created_total").increment(1);
    tracing::info!(
        account_id = %account_id,
        plan_id = %plan_id,
        renewal = req.renewal,
        "Checkout session created"
    );

    Ok(Json(session))
}

/// POST /api/v1/billing/confirm
///
/// Client-side confirmation from the payment widget. The signature covers
/// `payment_id|subscription_id` and is checked before any state is read.
pub async fn confirm_payment(
    State(state): State<AppState>,
    Json(req): Json<ConfirmPaymentRequest>,
) -> ApiResult<Json<SubscriptionResponse>> {
    let start = Instant::now();

    let account_id = parse_account_id(&req.account_id)?;
    let plan_id = parse_plan_id(&req.plan_id)?;
    validate_id(&req.payment_id, "payment_id")?;
    validate_id(&req.subscription_id, "subscription_id")?;

    let confirmation = PaymentConfirmation {
        payment_id: req.payment_id,
        subscription_id: req.subscription_id,
        signature: req.signature,
        is_renewal: req.renewal,
    };

    let result = state
        .billing
        .confirm_payment(account_id, &confirmation, &plan_id)
        .await;
    record_op_duration("confirm_payment", start, result.is_ok());
    let update = result?;

    if update.changed {
        record_activation("client_confirmation");
    }

    Ok(Json(subscription_response(&state, update)))
}

/// POST /api/v1/billing/manual-payments
pub async fn submit_manual_payment(
    State(state): State<AppState>,
    Json(req): Json<ManualPaymentRequest>,
) -> ApiResult<(StatusCode, Json<SubscriptionResponse>)> {
    let start = Instant::now();

    let account_id = parse_account_id(&req.account_id)?;
    let plan_id = parse_plan_id(&req.plan_id)?;
    let utr = normalize_utr(&req.utr)?;

    let result = state
        .billing
        .submit_manual_payment(account_id, &plan_id, &utr, req.renewal)
        .await;
    record_op_duration("submit_manual_payment", start, result.is_ok());

    Ok((
        StatusCode::ACCEPTED,
        Json(subscription_response(&state, result?)),
    ))
}
