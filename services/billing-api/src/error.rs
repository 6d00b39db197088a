//! Error types for the Billing API service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ledgerly_billing_core::BillingError;
use ledgerly_db::DbError;
use serde::Serialize;

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Billing(#[from] BillingError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Billing(e) => match e {
                BillingError::InvalidSignature | BillingError::MalformedEvent(_) => {
                    StatusCode::BAD_REQUEST
                }
                BillingError::AccountNotFound | BillingError::PlanNotFound => {
                    StatusCode::NOT_FOUND
                }
                BillingError::InvalidPlanPrice | BillingError::InvalidPlanDuration => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                BillingError::InvalidTransition { .. }
                | BillingError::CheckoutMismatch { .. }
                | BillingError::ConcurrentModification
                | BillingError::Database(DbError::Conflict(_)) => StatusCode::CONFLICT,
                BillingError::Configuration(_)
                | BillingError::ProviderError(_)
                | BillingError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Billing(e) => match e {
                BillingError::InvalidSignature => "INVALID_SIGNATURE",
                BillingError::MalformedEvent(_) => "MALFORMED_EVENT",
                BillingError::AccountNotFound => "ACCOUNT_NOT_FOUND",
                BillingError::PlanNotFound => "PLAN_NOT_FOUND",
                BillingError::InvalidPlanPrice => "INVALID_PLAN_PRICE",
                BillingError::InvalidPlanDuration => "INVALID_PLAN_DURATION",
                BillingError::InvalidTransition { .. } => "INVALID_TRANSITION",
                BillingError::CheckoutMismatch { .. } => "CHECKOUT_MISMATCH",
                BillingError::ConcurrentModification => "CONCURRENT_MODIFICATION",
                BillingError::Database(DbError::Conflict(_)) => "CONFLICT",
                BillingError::Configuration(_)
                | BillingError::ProviderError(_)
                | BillingError::Database(_) => "INTERNAL_ERROR",
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        // Log server-side failures, keep their details out of the body
        let message = if status.is_server_error() {
            tracing::error!(error = ?self, "Internal API error");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
