//! Ledgerly Billing API server binary

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use billing_api::{build_router, AppState, Config};
use ledgerly_billing_core::{BillingService, RazorpayProvider, SystemClock};
use ledgerly_db::Repositories;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use tokio::signal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("billing_api=debug".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Ledgerly Billing API");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        http_port = config.http_port,
        max_conflict_retries = config.billing.max_conflict_retries,
        "Configuration loaded"
    );

    // Initialize metrics
    let metrics_handle = if config.metrics_enabled {
        Some(setup_metrics()?)
    } else {
        None
    };

    // Create database pool
    let pool = ledgerly_db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    if config.run_migrations {
        ledgerly_db::run_migrations(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    // Create repositories
    let repos = Repositories::new(pool);

    // Create billing service
    let billing = BillingService::new(
        &config.billing,
        Arc::new(repos.accounts),
        Arc::new(repos.plans),
        Arc::new(RazorpayProvider::new(config.billing.clone())),
        Arc::new(SystemClock),
    )?;

    // Create application state
    let http_addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let state = AppState::new(billing, config);

    // Build HTTP router
    let app = build_router(state, metrics_handle);

    run_http_server(app, http_addr).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn run_http_server(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("HTTP server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn setup_metrics() -> anyhow::Result<PrometheusHandle> {
    // Most ops are one read and one conditional write
    let billing_latency_buckets = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.2, 0.5, 1.0, 2.5];

    let builder = PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full("billing_operation_duration_seconds".to_string()),
        billing_latency_buckets,
    )?;

    let handle = builder.install_recorder()?;

    // Register metrics with descriptions
    metrics::describe_counter!(
        "billing_webhooks_processed_total",
        "Total webhooks processed by outcome"
    );
    metrics::describe_counter!(
        "billing_activations_total",
        "Total subscription activations by confirmation path"
    );
    metrics::describe_counter!(
        "billing_checkouts_created_total",
        "Total gateway checkouts created"
    );
    metrics::describe_counter!(
        "billing_subscriptions_canceled_total",
        "Total subscriptions cancelled by operators"
    );
    metrics::describe_histogram!(
        "billing_operation_duration_seconds",
        "Billing operation latency in seconds by operation type"
    );

    Ok(handle)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
