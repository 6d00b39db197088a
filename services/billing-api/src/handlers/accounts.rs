//! Account registration handler

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use ledgerly_types::AccountId;

use crate::error::ApiResult;
use crate::handlers::shared::{record_op_duration, validate_email, validate_text};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OpenAccountRequest {
    pub shop_name: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub account_id: AccountId,
}

/// POST /api/v1/billing/accounts
pub async fn open_account(
    State(state): State<AppState>,
    Json(req): Json<OpenAccountRequest>,
) -> ApiResult<(StatusCode, Json<AccountResponse>)> {
    let start = Instant::now();

    validate_text(&req.shop_name, "shop_name")?;
    validate_email(&req.email)?;

    let result = state
        .billing
        .open_account(req.shop_name.trim(), req.email.trim())
        .await;
    record_op_duration("open_account", start, result.is_ok());

    Ok((
        StatusCode::CREATED,
        Json(AccountResponse {
            account_id: result?,
        }),
    ))
}
