//! Razorpay payment provider implementation

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use ledgerly_types::AccountId;

use crate::config::BillingConfig;
use crate::error::BillingError;
use crate::provider::{GatewaySubscription, PaymentProvider};

/// Razorpay subscriptions API client
#[derive(Clone)]
pub struct RazorpayProvider {
    client: Client,
    config: BillingConfig,
}

impl RazorpayProvider {
    /// Create a new Razorpay provider
    pub fn new(config: BillingConfig) -> Self {
        let client = Client::new();
        Self { client, config }
    }

    /// Make an authenticated request to Razorpay
    async fn razorpay_request<B: Serialize + ?Sized, T: for<'de> Deserialize<'de>>(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<T, BillingError> {
        let url = format!("{}{endpoint}", self.config.gateway_api_base);

        let mut request = self.client.request(method, &url).basic_auth(
            &self.config.gateway_key_id,
            Some(&self.config.gateway_key_secret),
        );

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, "Razorpay API request failed");
            BillingError::ProviderError(e.to_string())
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Razorpay API error");
            return Err(BillingError::ProviderError(format!(
                "Razorpay API error: {status}"
            )));
        }

        response.json::<T>().await.map_err(|e| {
            error!(error = %e, "Failed to parse Razorpay response");
            BillingError::ProviderError(e.to_string())
        })
    }
}

#[async_trait]
impl PaymentProvider for RazorpayProvider {
    #[instrument(skip(self))]
    async fn create_subscription(
        &self,
        gateway_plan_id: &str,
        account_id: AccountId,
        total_count: u32,
    ) -> Result<GatewaySubscription, BillingError> {
        debug!(gateway_plan_id, "Creating Razorpay subscription");

        let account_ref = account_id.to_string();
        let body = CreateSubscriptionRequest {
            plan_id: gateway_plan_id,
            total_count,
            customer_notify: 1,
            notes: SubscriptionNotes {
                account_id: &account_ref,
            },
        };

        let sub: RazorpaySubscription = self
            .razorpay_request(reqwest::Method::POST, "/subscriptions", Some(&body))
            .await?;

        Ok(GatewaySubscription {
            id: sub.id,
            short_url: sub.short_url,
            status: sub.status,
        })
    }

    #[instrument(skip(self))]
    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), BillingError> {
        debug!(subscription_id, "Cancelling Razorpay subscription");

        let body = CancelSubscriptionRequest {
            cancel_at_cycle_end: 0,
        };
        let _: RazorpaySubscription = self
            .razorpay_request(
                reqwest::Method::POST,
                &format!("/subscriptions/{subscription_id}/cancel"),
                Some(&body),
            )
            .await?;

        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct CreateSubscriptionRequest<'a> {
    plan_id: &'a str,
    total_count: u32,
    customer_notify: u8,
    notes: SubscriptionNotes<'a>,
}

#[derive(Debug, Serialize)]
struct SubscriptionNotes<'a> {
    account_id: &'a str,
}

#[derive(Debug, Serialize)]
struct CancelSubscriptionRequest {
    cancel_at_cycle_end: u8,
}

/// Razorpay subscription entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RazorpaySubscription {
    /// Subscription ID
    pub id: String,
    /// Gateway plan ID
    #[serde(default)]
    pub plan_id: Option<String>,
    /// Subscription status
    pub status: String,
    /// Hosted authorization link
    #[serde(default)]
    pub short_url: Option<String>,
}
