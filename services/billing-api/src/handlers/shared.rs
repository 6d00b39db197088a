//! Shared handler utilities
//!
//! Common validation, metrics, and helper functions used across handlers.

use std::time::Instant;

use ledgerly_types::{AccountId, PlanId};

use crate::error::ApiError;

// ============================================================================
// Input Validation
// ============================================================================

/// Maximum length for gateway-issued IDs (payment, subscription, plan)
pub const MAX_ID_LEN: usize = 64;

/// Bank transfer references are 6 to 32 alphanumeric characters
pub const MIN_UTR_LEN: usize = 6;
pub const MAX_UTR_LEN: usize = 32;

/// Maximum length for free-form strings (shop name, rejection reason)
pub const MAX_STRING_LEN: usize = 256;

/// Parse an account ID from a path or body field
pub fn parse_account_id(raw: &str) -> Result<AccountId, ApiError> {
    AccountId::parse(raw.trim()).map_err(|_| ApiError::BadRequest("Invalid account_id".into()))
}

/// Validate an opaque identifier issued by the gateway or catalog.
///
/// Allows alphanumeric, underscore and hyphen. These values end up in log
/// fields and SQL parameters, never in markup.
pub fn validate_id(value: &str, field_name: &str) -> Result<(), ApiError> {
    if value.is_empty() {
        return Err(ApiError::BadRequest(format!("{field_name} cannot be empty")));
    }

    if value.len() > MAX_ID_LEN {
        return Err(ApiError::BadRequest(format!(
            "{field_name} too long (max {MAX_ID_LEN} chars)"
        )));
    }

    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ApiError::BadRequest(format!(
            "{field_name} contains invalid characters (use alphanumeric, _, -)"
        )));
    }

    Ok(())
}

/// Validate and wrap a plan ID
pub fn parse_plan_id(raw: &str) -> Result<PlanId, ApiError> {
    validate_id(raw, "plan_id")?;
    Ok(PlanId::new(raw))
}

/// Validate a bank transfer reference (UTR) and normalise it to uppercase
pub fn normalize_utr(raw: &str) -> Result<String, ApiError> {
    let utr = raw.trim();

    if utr.len() < MIN_UTR_LEN || utr.len() > MAX_UTR_LEN {
        return Err(ApiError::BadRequest(format!(
            "utr must be {MIN_UTR_LEN}-{MAX_UTR_LEN} characters"
        )));
    }

    if !utr.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ApiError::BadRequest("utr must be alphanumeric".into()));
    }

    Ok(utr.to_ascii_uppercase())
}

/// Validate a user-provided string is present and within safe bounds.
pub fn validate_text(value: &str, field_name: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{field_name} cannot be empty")));
    }
    if value.len() > MAX_STRING_LEN {
        return Err(ApiError::BadRequest(format!(
            "{field_name} too long (max {MAX_STRING_LEN} chars)"
        )));
    }
    if value.chars().any(char::is_control) {
        return Err(ApiError::BadRequest(format!(
            "{field_name} contains control characters"
        )));
    }
    Ok(())
}

/// Minimal shape check for a contact email
pub fn validate_email(value: &str) -> Result<(), ApiError> {
    validate_text(value, "email")?;
    match value.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && domain.contains('.') && !value.contains(char::is_whitespace) =>
        {
            Ok(())
        }
        _ => Err(ApiError::BadRequest("Invalid email".into())),
    }
}

// ============================================================================
// Metrics Helpers
// ============================================================================

/// Record HTTP operation duration with result label.
///
/// Labels: operation, result (ok/err)
#[inline]
pub fn record_op_duration(operation: &'static str, start: Instant, success: bool) {
    let result = if success { "ok" } else { "err" };
    metrics::histogram!(
        "billing_operation_duration_seconds",
        "operation" => operation,
        "result" => result
    )
    .record(start.elapsed().as_secs_f64());
}

/// Count an applied activation by the path that confirmed the payment
#[inline]
pub fn record_activation(path: &'static str) {
    metrics::counter!("billing_activations_total", "path" => path).increment(1);
}

// ============================================================================
// Tests
// ============================================================================
