//! Liveness and readiness for load balancers and the deploy pipeline

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Readiness report: the account store answers and the catalog is readable
#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub database: &'static str,
    /// Plans a shop owner can check out right now
    pub plans_on_sale: usize,
}

/// The process is up. Touches no storage.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Ready to take checkouts and webhooks.
///
/// Answers 503 when the account store or the plan catalog cannot be read,
/// since every billing route needs both.
pub async fn ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, StatusCode> {
    if let Err(e) = state.billing.ping().await {
        tracing::error!(error = %e, "Account store unreachable");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    let plans = state.billing.list_plans().await.map_err(|e| {
        tracing::error!(error = %e, "Plan catalog unreadable");
        StatusCode::SERVICE_UNAVAILABLE
    })?;
    if plans.is_empty() {
        tracing::warn!("No plans on sale; checkouts will fail");
    }

    Ok(Json(ReadyResponse {
        status: "ready",
        database: "connected",
        plans_on_sale: plans.len(),
    }))
}
