//! Handler state: the billing service plus the settings routes read per request

use std::sync::Arc;
use std::time::Duration;

use ledgerly_billing_core::BillingService;

use crate::config::Config;

/// Cloned into every handler; both fields are shared, not copied
#[derive(Clone)]
pub struct AppState {
    /// Subscription engine, gateway client and webhook verifier
    pub billing: Arc<BillingService>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(billing: BillingService, config: Config) -> Self {
        Self {
            billing: Arc::new(billing),
            config: Arc::new(config),
        }
    }

    /// Upper bound on a request, gateway round trips included
    pub fn request_timeout(&self) -> Duration {
        self.config.request_timeout
    }

    /// Shared secret the `/admin` routes expect in their header
    pub fn admin_token(&self) -> &str {
        &self.config.admin_token
    }
}

// Config redacts its secrets; the service holds keys and is left out
impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
