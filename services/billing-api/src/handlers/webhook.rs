//! Payment gateway webhook handler

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use std::time::Instant;

use ledgerly_billing_core::{BillingError, WebhookOutcome};

use crate::handlers::shared::{record_activation, record_op_duration};
use crate::state::AppState;

/// Header carrying the hex HMAC of the raw body
pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// POST /webhooks/payments
///
/// Rejects only a missing or invalid signature. Every verified delivery is
/// acknowledged, except transient failures that the gateway should retry.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let start = Instant::now();

    let Some(sig_header) = headers.get(SIGNATURE_HEADER) else {
        tracing::warn!("Missing X-Razorpay-Signature header");
        metrics::counter!("billing_webhooks_processed_total", "status" => "rejected").increment(1);
        return StatusCode::BAD_REQUEST;
    };

    let Ok(signature) = sig_header.to_str() else {
        tracing::warn!("Invalid X-Razorpay-Signature header encoding");
        metrics::counter!("billing_webhooks_processed_total", "status" => "rejected").increment(1);
        return StatusCode::BAD_REQUEST;
    };

    let result = state.billing.process_webhook(&body, signature).await;
    record_op_duration("process_webhook", start, result.is_ok());

    match result {
        Ok(outcome) => {
            if outcome == WebhookOutcome::Activated {
                record_activation("webhook");
            }
            metrics::counter!("billing_webhooks_processed_total", "status" => outcome.as_str())
                .increment(1);
            StatusCode::OK
        }
        Err(BillingError::InvalidSignature) => {
            metrics::counter!("billing_webhooks_processed_total", "status" => "rejected")
                .increment(1);
            StatusCode::BAD_REQUEST
        }
        Err(e) => {
            tracing::error!(error = ?e, "Webhook processing failed, gateway will redeliver");
            metrics::counter!("billing_webhooks_processed_total", "status" => "error").increment(1);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
