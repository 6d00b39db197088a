//! Payment gateway abstraction

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ledgerly_types::AccountId;

use crate::BillingError;

/// Subscription created on the gateway side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySubscription {
    /// Gateway subscription ID
    pub id: String,
    /// Hosted payment page, when the gateway returns one
    pub short_url: Option<String>,
    /// Gateway-side status, e.g. `created`
    pub status: String,
}

/// Payment gateway trait
///
/// Abstracts the recurring-payment gateway so the service can run against
/// a mock in tests.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a recurring subscription for a gateway plan
    async fn create_subscription(
        &self,
        gateway_plan_id: &str,
        account_id: AccountId,
        total_count: u32,
    ) -> Result<GatewaySubscription, BillingError>;

    /// Cancel a subscription immediately
    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), BillingError>;
}
