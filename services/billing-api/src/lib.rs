//! Ledgerly Billing API
//!
//! HTTP surface of the subscription activation engine.
//!
//! ## REST Endpoints
//!
//! - `POST /api/v1/billing/accounts` - Register a shop account
//! - `GET /api/v1/billing/accounts/{id}/subscription` - Subscription with expiry flags
//! - `GET /api/v1/billing/plans` - Active plan catalog
//! - `POST /api/v1/billing/checkout` - Create a gateway subscription
//! - `POST /api/v1/billing/confirm` - Client-side payment confirmation
//! - `POST /api/v1/billing/manual-payments` - Submit a bank transfer reference
//! - `GET /api/v1/admin/manual-payments` - Pending reviews (admin)
//! - `POST /api/v1/admin/manual-payments/{id}/approve` - Approve (admin)
//! - `POST /api/v1/admin/manual-payments/{id}/reject` - Reject (admin)
//! - `POST /api/v1/admin/accounts/{id}/cancel` - Cancel a subscription (admin)
//! - `POST /webhooks/payments` - Gateway webhook handler
//!
//! ## Health Endpoints
//!
//! - `GET /health` - Liveness
//! - `GET /ready` - Readiness (account store and plan catalog)
//! - `GET /metrics` - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub use crate::config::{Config, ConfigError};
pub use crate::error::{ApiError, ApiResult};
pub use crate::state::AppState;

/// Build the HTTP router with all routes and middleware
pub fn build_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let request_timeout = state.request_timeout();

    // API v1 billing routes
    let billing_routes = Router::new()
        .route("/billing/accounts", post(handlers::open_account))
        .route(
            "/billing/accounts/{id}/subscription",
            get(handlers::get_subscription),
        )
        .route("/billing/plans", get(handlers::list_plans))
        .route("/billing/checkout", post(handlers::create_checkout))
        .route("/billing/confirm", post(handlers::confirm_payment))
        .route(
            "/billing/manual-payments",
            post(handlers::submit_manual_payment),
        );

    // Admin routes (token checked by the AdminToken extractor)
    let admin_routes = Router::new()
        .route(
            "/admin/manual-payments",
            get(handlers::list_pending_reviews),
        )
        .route(
            "/admin/manual-payments/{id}/approve",
            post(handlers::approve_manual_payment),
        )
        .route(
            "/admin/manual-payments/{id}/reject",
            post(handlers::reject_manual_payment),
        )
        .route(
            "/admin/accounts/{id}/cancel",
            post(handlers::cancel_subscription),
        );

    // Webhook route (separate - uses raw body, no JSON parsing)
    let webhook_routes =
        Router::new().route("/webhooks/payments", post(handlers::payment_webhook));

    // Health routes (no timeout - must always respond quickly)
    let health_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready));

    // Metrics route (no timeout)
    let metrics_route = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    // Build middleware stack (order matters - outermost first)
    let middleware = ServiceBuilder::new()
        // Request ID propagation (outermost)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        // Tracing with request details
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // CORS
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        // Request timeout (innermost - closest to handler)
        .layer(TimeoutLayer::new(request_timeout));

    // Combine all routes
    Router::new()
        .nest("/api/v1", billing_routes.merge(admin_routes))
        .merge(webhook_routes)
        .layer(middleware)
        .merge(health_routes) // Health routes without timeout
        .merge(metrics_route) // Metrics route without timeout
        .with_state(state)
}
