//! Configuration for the Billing API service.

use ledgerly_billing_core::BillingConfig;
use std::time::Duration;

/// Billing API configuration
#[derive(Clone)]
pub struct Config {
    /// HTTP server port
    pub http_port: u16,
    /// Database URL
    pub database_url: String,
    /// Billing core configuration
    pub billing: BillingConfig,
    /// Shared token for the admin review routes
    pub admin_token: String,
    /// Request timeout
    pub request_timeout: Duration,
    /// Metrics enabled
    pub metrics_enabled: bool,
    /// Apply embedded migrations at startup
    pub run_migrations: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        // Database
        let database_url = required("DATABASE_URL")?;

        // Server port
        let http_port = lookup("HTTP_PORT")
            .unwrap_or_else(|| "8081".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("HTTP_PORT"))?;

        // Gateway and signing secrets
        let gateway_key_id = required("GATEWAY_KEY_ID")?;
        let gateway_key_secret = required("GATEWAY_KEY_SECRET")?;
        let confirmation_secret = required("PAYMENT_CONFIRMATION_SECRET")?;
        let webhook_secret = required("PAYMENT_WEBHOOK_SECRET")?;
        let admin_token = required("ADMIN_API_TOKEN")?;

        // Request timeout
        let request_timeout_secs: u64 = lookup("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|| "30".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("REQUEST_TIMEOUT_SECS"))?;

        let max_conflict_retries: u32 = lookup("CAS_MAX_RETRIES")
            .unwrap_or_else(|| "1".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("CAS_MAX_RETRIES"))?;

        // Flags
        let metrics_enabled = lookup("METRICS_ENABLED")
            .unwrap_or_else(|| "true".to_string())
            .parse()
            .unwrap_or(true);

        let run_migrations = lookup("RUN_MIGRATIONS")
            .unwrap_or_else(|| "true".to_string())
            .parse()
            .unwrap_or(true);

        // Build billing config
        let mut billing = BillingConfig::new(
            gateway_key_id,
            gateway_key_secret,
            confirmation_secret,
            webhook_secret,
        )
        .with_max_conflict_retries(max_conflict_retries);
        if let Some(api_base) = lookup("GATEWAY_API_BASE") {
            billing = billing.with_api_base(api_base);
        }

        if billing.confirmation_secret == billing.webhook_secret {
            return Err(ConfigError::Invalid("PAYMENT_WEBHOOK_SECRET"));
        }

        Ok(Self {
            http_port,
            database_url,
            billing,
            admin_token,
            request_timeout: Duration::from_secs(request_timeout_secs),
            metrics_enabled,
            run_migrations,
        })
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("http_port", &self.http_port)
            .field("billing", &self.billing)
            .field("request_timeout", &self.request_timeout)
            .field("metrics_enabled", &self.metrics_enabled)
            .field("run_migrations", &self.run_migrations)
            .finish_non_exhaustive()
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
