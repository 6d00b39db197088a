//! Billing configuration

use crate::error::BillingError;

/// Default gateway REST endpoint
pub const DEFAULT_GATEWAY_API_BASE: &str = "https://api.razorpay.com/v1";

/// Billing service configuration
#[derive(Clone)]
pub struct BillingConfig {
    /// Gateway API key ID
    pub gateway_key_id: String,
    /// Gateway API key secret
    pub gateway_key_secret: String,
    /// Gateway REST endpoint
    pub gateway_api_base: String,
    /// Secret for client-side payment confirmation signatures
    pub confirmation_secret: String,
    /// Secret for webhook body signatures
    pub webhook_secret: String,
    /// How many times a compare-and-swap conflict is retried from a fresh read
    pub max_conflict_retries: u32,
    /// Billing cycles requested when creating a gateway subscription
    pub subscription_cycles: u32,
}

impl BillingConfig {
    /// Create a new billing config
    pub fn new(
        gateway_key_id: impl Into<String>,
        gateway_key_secret: impl Into<String>,
        confirmation_secret: impl Into<String>,
        webhook_secret: impl Into<String>,
    ) -> Self {
        Self {
            gateway_key_id: gateway_key_id.into(),
            gateway_key_secret: gateway_key_secret.into(),
            gateway_api_base: DEFAULT_GATEWAY_API_BASE.to_string(),
            confirmation_secret: confirmation_secret.into(),
            webhook_secret: webhook_secret.into(),
            max_conflict_retries: 1,
            subscription_cycles: 12,
        }
    }

    /// Set the gateway REST endpoint
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.gateway_api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the compare-and-swap retry bound
    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    /// Set the number of billing cycles for new gateway subscriptions
    pub fn with_subscription_cycles(mut self, cycles: u32) -> Self {
        self.subscription_cycles = cycles;
        self
    }

    /// Check that every secret is present and the two signing secrets differ
    pub fn validate(&self) -> Result<(), BillingError> {
        let required = [
            ("gateway key id", &self.gateway_key_id),
            ("gateway key secret", &self.gateway_key_secret),
            ("confirmation secret", &self.confirmation_secret),
            ("webhook secret", &self.webhook_secret),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(BillingError::Configuration(format!("{name} is empty")));
            }
        }

        if self.confirmation_secret == self.webhook_secret {
            return Err(BillingError::Configuration(
                "confirmation and webhook secrets must differ".to_string(),
            ));
        }

        if self.subscription_cycles == 0 {
            return Err(BillingError::Configuration(
                "subscription cycles must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

impl std::fmt::Debug for BillingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingConfig")
            .field("gateway_key_id", &self.gateway_key_id)
            .field("gateway_api_base", &self.gateway_api_base)
            .field("max_conflict_retries", &self.max_conflict_retries)
            .field("subscription_cycles", &self.subscription_cycles)
            .finish_non_exhaustive()
    }
}
