//! Billing service

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use ledgerly_db::{AccountRepository, PlanRepository};
use ledgerly_types::{AccountId, Plan, PlanId, SubscriptionSnapshot, SubscriptionStatus};

use crate::clock::Clock;
use crate::config::BillingConfig;
use crate::crypto::SigningKey;
use crate::engine::{PaymentConfirmation, SnapshotUpdate, SubscriptionEngine};
use crate::provider::PaymentProvider;
use crate::webhook::{WebhookEvent, WebhookHandler};
use crate::BillingError;

/// What a verified webhook delivery did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// A charge activated or extended a subscription
    Activated,
    /// A subscription was set inactive
    Cancelled,
    /// A failed payment was recorded in the logs only
    PaymentFailedLogged,
    /// Unknown event or unusable payload
    Ignored,
    /// No single account holds the subscription
    AccountUnresolved,
    /// The event had already been applied
    Duplicate,
}

impl WebhookOutcome {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activated => "activated",
            Self::Cancelled => "cancelled",
            Self::PaymentFailedLogged => "payment_failed",
            Self::Ignored => "ignored",
            Self::AccountUnresolved => "account_unresolved",
            Self::Duplicate => "duplicate",
        }
    }
}

/// Gateway checkout handed to the client widget
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    /// Gateway subscription ID the widget authorizes
    pub subscription_id: String,
    /// Hosted payment page
    pub short_url: Option<String>,
    /// Public gateway key for the widget
    pub key_id: String,
    pub plan_id: PlanId,
    pub renewal: bool,
}

/// Snapshot plus the expiry flags derived at read time
#[derive(Debug, Clone, Serialize)]
pub struct AccountSubscription {
    pub account_id: AccountId,
    #[serde(flatten)]
    pub snapshot: SubscriptionSnapshot,
    pub expired: bool,
    pub entitled: bool,
}

/// Billing service
pub struct BillingService {
    engine: SubscriptionEngine,
    webhooks: WebhookHandler,
    provider: Arc<dyn PaymentProvider>,
    gateway_key_id: String,
    subscription_cycles: u32,
}

impl BillingService {
    /// Create a new billing service.
    ///
    /// Fails with `Configuration` when a secret is missing or the two
    /// signing secrets are the same.
    pub fn new(
        config: &BillingConfig,
        accounts: Arc<dyn AccountRepository>,
        plans: Arc<dyn PlanRepository>,
        provider: Arc<dyn PaymentProvider>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, BillingError> {
        config.validate()?;

        let engine = SubscriptionEngine::new(
            accounts,
            plans,
            clock,
            SigningKey::new(&config.confirmation_secret)?,
            config.max_conflict_retries,
        );
        let webhooks = WebhookHandler::new(SigningKey::new(&config.webhook_secret)?);

        Ok(Self {
            engine,
            webhooks,
            provider,
            gateway_key_id: config.gateway_key_id.clone(),
            subscription_cycles: config.subscription_cycles,
        })
    }

    /// Underlying engine
    pub fn engine(&self) -> &SubscriptionEngine {
        &self.engine
    }

    /// Register a new account
    pub async fn open_account(&self, shop_name: &str, email: &str) -> Result<AccountId, BillingError> {
        self.engine.open_account(shop_name, email).await
    }

    /// Create a gateway subscription and record it on the account
    #[instrument(skip(self), fields(account_id = %account_id, plan_id = %plan_id))]
    pub async fn start_checkout(
        &self,
        account_id: AccountId,
        plan_id: &PlanId,
        renewal: bool,
    ) -> Result<CheckoutSession, BillingError> {
        // Fail before talking to the gateway
        self.engine.snapshot(account_id).await?;
        let plan = self.engine.plan_for_sale(plan_id).await?;
        let gateway_plan_id = plan.gateway_plan_id.as_deref().ok_or_else(|| {
            BillingError::Configuration(format!("plan {} has no gateway plan", plan.id))
        })?;

        let subscription = self
            .provider
            .create_subscription(gateway_plan_id, account_id, self.subscription_cycles)
            .await?;

        if let Err(e) = self
            .engine
            .begin_checkout(account_id, &plan, renewal, &subscription.id)
            .await
        {
            error!(error = %e, subscription_id = %subscription.id, "Failed to record checkout");
            if let Err(cancel_err) = self.provider.cancel_subscription(&subscription.id).await {
                error!(
                    error = %cancel_err,
                    subscription_id = %subscription.id,
                    "Failed to cancel orphaned gateway subscription"
                );
            }
            return Err(e);
        }

        info!(subscription_id = %subscription.id, "Checkout started");
        Ok(CheckoutSession {
            subscription_id: subscription.id,
            short_url: subscription.short_url,
            key_id: self.gateway_key_id.clone(),
            plan_id: plan.id,
            renewal,
        })
    }

    /// Apply a client-side payment confirmation
    pub async fn confirm_payment(
        &self,
        account_id: AccountId,
        confirmation: &PaymentConfirmation,
        plan_id: &PlanId,
    ) -> Result<SnapshotUpdate, BillingError> {
        self.engine
            .activate_or_renew(account_id, confirmation, plan_id)
            .await
    }

    /// Verify and dispatch a webhook delivery.
    ///
    /// Only a bad signature or a transient failure is an error; everything
    /// else is acknowledged with an outcome.
    #[instrument(skip_all)]
    pub async fn process_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookOutcome, BillingError> {
        let event = match self.webhooks.verify_and_parse(payload, signature) {
            Ok(event) => event,
            Err(BillingError::MalformedEvent(reason)) => {
                warn!(reason = %reason, "Ignoring malformed webhook payload");
                return Ok(WebhookOutcome::Ignored);
            }
            Err(e) => return Err(e),
        };

        let name = event.name().to_string();
        let outcome = match event {
            WebhookEvent::SubscriptionCharged {
                subscription_id,
                payment_id,
            } => {
                let result = self
                    .engine
                    .apply_webhook_charge(&subscription_id, &payment_id)
                    .await;
                settle(result, WebhookOutcome::Activated, &subscription_id)?
            }
            WebhookEvent::SubscriptionCancelled { subscription_id } => {
                let result = self.engine.cancel_by_subscription_id(&subscription_id).await;
                settle(result, WebhookOutcome::Cancelled, &subscription_id)?
            }
            WebhookEvent::PaymentFailed {
                payment_id,
                subscription_id,
                reason,
            } => {
                warn!(
                    payment_id = ?payment_id,
                    subscription_id = ?subscription_id,
                    reason = ?reason,
                    "Gateway reported a failed payment"
                );
                WebhookOutcome::PaymentFailedLogged
            }
            WebhookEvent::Unrecognized(_) => WebhookOutcome::Ignored,
        };

        info!(event = %name, outcome = outcome.as_str(), "Webhook processed");
        Ok(outcome)
    }

    /// Cancel the gateway subscription, then the local one
    #[instrument(skip(self), fields(account_id = %account_id))]
    pub async fn cancel_subscription(
        &self,
        account_id: AccountId,
    ) -> Result<SnapshotUpdate, BillingError> {
        let snapshot = self.engine.snapshot(account_id).await?;
        if snapshot.status != SubscriptionStatus::Inactive {
            if let Some(subscription_id) = snapshot.external_subscription_id.as_deref() {
                self.provider.cancel_subscription(subscription_id).await?;
            }
        }
        self.engine.cancel(account_id).await
    }

    /// Record a manual bank payment for review
    pub async fn submit_manual_payment(
        &self,
        account_id: AccountId,
        plan_id: &PlanId,
        utr: &str,
        renewal: bool,
    ) -> Result<SnapshotUpdate, BillingError> {
        let plan = self.engine.plan_for_sale(plan_id).await?;
        self.engine
            .submit_manual_payment(account_id, &plan, utr, renewal)
            .await
    }

    /// Approve a pending manual payment
    pub async fn approve_manual_payment(
        &self,
        account_id: AccountId,
    ) -> Result<SnapshotUpdate, BillingError> {
        self.engine.approve_manual_payment(account_id).await
    }

    /// Reject a pending manual payment
    pub async fn reject_manual_payment(
        &self,
        account_id: AccountId,
        reason: &str,
    ) -> Result<SnapshotUpdate, BillingError> {
        self.engine.reject_manual_payment(account_id, reason).await
    }

    /// Current subscription with derived expiry flags
    pub async fn get_subscription(
        &self,
        account_id: AccountId,
    ) -> Result<AccountSubscription, BillingError> {
        let snapshot = self.engine.snapshot(account_id).await?;
        Ok(self.view(account_id, snapshot))
    }

    /// Accounts waiting for manual review
    pub async fn pending_reviews(&self, limit: i64) -> Result<Vec<AccountSubscription>, BillingError> {
        let pending = self.engine.pending_reviews(limit).await?;
        Ok(pending
            .into_iter()
            .map(|(account_id, snapshot)| self.view(account_id, snapshot))
            .collect())
    }

    /// Plans currently offered
    pub async fn list_plans(&self) -> Result<Vec<Plan>, BillingError> {
        self.engine.list_plans().await
    }

    /// Check store connectivity
    pub async fn ping(&self) -> Result<(), BillingError> {
        self.engine.ping().await
    }

    /// Wrap a snapshot with its derived flags
    pub fn view(&self, account_id: AccountId, snapshot: SubscriptionSnapshot) -> AccountSubscription {
        let now = self.engine.now();
        AccountSubscription {
            account_id,
            expired: snapshot.is_expired(now),
            entitled: snapshot.is_entitled(now),
            snapshot,
        }
    }
}

/// Turn a webhook-driven engine result into an outcome.
///
/// Transient failures stay errors so the gateway redelivers; anything a
/// redelivery cannot fix is acknowledged.
fn settle(
    result: Result<SnapshotUpdate, BillingError>,
    applied: WebhookOutcome,
    subscription_id: &str,
) -> Result<WebhookOutcome, BillingError> {
    match result {
        Ok(update) if update.changed => Ok(applied),
        Ok(_) => Ok(WebhookOutcome::Duplicate),
        Err(BillingError::AccountNotFound) => {
            warn!(subscription_id, "Webhook for unknown gateway subscription");
            Ok(WebhookOutcome::AccountUnresolved)
        }
        Err(e) if e.is_retryable() => Err(e),
        Err(e) if e.is_client_error() => {
            warn!(error = %e, subscription_id, "Webhook rejected for this account");
            Ok(WebhookOutcome::Ignored)
        }
        Err(e) => {
            error!(error = %e, subscription_id, "Webhook could not be applied");
            Ok(WebhookOutcome::Ignored)
        }
    }
}
