//! Payment gateway webhook handling

use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::crypto::SigningKey;
use crate::error::BillingError;

/// Event names the gateway sends
pub const SUBSCRIPTION_CHARGED: &str = "subscription.charged";
pub const SUBSCRIPTION_CANCELLED: &str = "subscription.cancelled";
pub const PAYMENT_FAILED: &str = "payment.failed";

/// Verified webhook event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    /// A subscription payment was captured
    SubscriptionCharged {
        subscription_id: String,
        payment_id: String,
    },
    /// The gateway cancelled a subscription
    SubscriptionCancelled { subscription_id: String },
    /// A payment attempt failed
    PaymentFailed {
        payment_id: Option<String>,
        subscription_id: Option<String>,
        reason: Option<String>,
    },
    /// Any other event name
    Unrecognized(String),
}

impl WebhookEvent {
    /// Event name as sent by the gateway
    pub fn name(&self) -> &str {
        match self {
            Self::SubscriptionCharged { .. } => SUBSCRIPTION_CHARGED,
            Self::SubscriptionCancelled { .. } => SUBSCRIPTION_CANCELLED,
            Self::PaymentFailed { .. } => PAYMENT_FAILED,
            Self::Unrecognized(name) => name,
        }
    }
}

/// Verifies and parses gateway webhooks
#[derive(Clone)]
pub struct WebhookHandler {
    key: SigningKey,
}

impl WebhookHandler {
    /// Create a handler for the webhook secret
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Verify the signature over the raw body, then parse it.
    ///
    /// The signature is checked before the body is looked at.
    #[instrument(skip_all)]
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, BillingError> {
        if !self.key.verify_hex(payload, signature) {
            warn!(body_len = payload.len(), "Webhook signature verification failed");
            return Err(BillingError::InvalidSignature);
        }

        let raw: RawEvent = serde_json::from_slice(payload)
            .map_err(|e| BillingError::MalformedEvent(e.to_string()))?;

        debug!(event = %raw.event, "Parsed webhook event");
        Self::parse_event(raw)
    }

    fn parse_event(raw: RawEvent) -> Result<WebhookEvent, BillingError> {
        let payload = raw.payload.unwrap_or_default();

        match raw.event.as_str() {
            SUBSCRIPTION_CHARGED => {
                let subscription_id = payload
                    .subscription
                    .map(|s| s.entity.id)
                    .ok_or_else(|| missing(SUBSCRIPTION_CHARGED, "subscription"))?;
                let payment_id = payload
                    .payment
                    .map(|p| p.entity.id)
                    .ok_or_else(|| missing(SUBSCRIPTION_CHARGED, "payment"))?;
                Ok(WebhookEvent::SubscriptionCharged {
                    subscription_id,
                    payment_id,
                })
            }
            SUBSCRIPTION_CANCELLED => {
                let subscription_id = payload
                    .subscription
                    .map(|s| s.entity.id)
                    .ok_or_else(|| missing(SUBSCRIPTION_CANCELLED, "subscription"))?;
                Ok(WebhookEvent::SubscriptionCancelled { subscription_id })
            }
            PAYMENT_FAILED => {
                let entity = payload.payment.map(|p| p.entity);
                Ok(WebhookEvent::PaymentFailed {
                    payment_id: entity.as_ref().map(|e| e.id.clone()),
                    subscription_id: payload.subscription.map(|s| s.entity.id),
                    reason: entity.and_then(|e| e.error_description),
                })
            }
            other => Ok(WebhookEvent::Unrecognized(other.to_string())),
        }
    }
}

fn missing(event: &str, entity: &str) -> BillingError {
    BillingError::MalformedEvent(format!("{event} without {entity} entity"))
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    event: String,
    payload: Option<RawPayload>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPayload {
    subscription: Option<RawWrapper<RawSubscription>>,
    payment: Option<RawWrapper<RawPayment>>,
}

#[derive(Debug, Deserialize)]
struct RawWrapper<T> {
    entity: T,
}

#[derive(Debug, Deserialize)]
struct RawSubscription {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RawPayment {
    id: String,
    error_description: Option<String>,
}
