//! Recording payment gateway double

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use ledgerly_billing_core::{BillingError, GatewaySubscription, PaymentProvider};
use ledgerly_types::AccountId;

#[derive(Default)]
pub struct MockProvider {
    next_id: AtomicUsize,
    fail_create: AtomicBool,
    pub created: Mutex<Vec<(String, AccountId, u32)>>,
    pub cancelled: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subscription creation fail like a gateway outage
    pub fn fail_creates(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentProvider for MockProvider {
    async fn create_subscription(
        &self,
        gateway_plan_id: &str,
        account_id: AccountId,
        total_count: u32,
    ) -> Result<GatewaySubscription, BillingError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(BillingError::ProviderError("gateway unavailable".to_string()));
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.created
            .lock()
            .unwrap()
            .push((gateway_plan_id.to_string(), account_id, total_count));

        Ok(GatewaySubscription {
            id: format!("sub_mock_{n}"),
            short_url: Some(format!("https://rzp.io/i/mock{n}")),
            status: "created".to_string(),
        })
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), BillingError> {
        self.cancelled
            .lock()
            .unwrap()
            .push(subscription_id.to_string());
        Ok(())
    }
}
