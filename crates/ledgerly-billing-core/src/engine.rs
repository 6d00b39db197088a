//! Subscription activation engine
//!
//! Owns every transition of an account's subscription snapshot. Each
//! operation is a read, a pure recomputation from the stored state, and one
//! compare-and-swap write; a lost race re-reads and recomputes instead of
//! applying a stale delta.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use ledgerly_db::{AccountRepository, AccountRow, CreateAccount, PlanRepository};
use ledgerly_types::{
    AccountId, Plan, PlanId, RequestKind, SubscriptionSnapshot, SubscriptionStatus,
};

use crate::clock::Clock;
use crate::crypto::{confirmation_payload, SigningKey};
use crate::error::BillingError;
use crate::schedule;

/// Confirmation handed back by the payment widget after a successful payment
#[derive(Debug, Clone)]
pub struct PaymentConfirmation {
    /// Gateway payment ID
    pub payment_id: String,
    /// Gateway subscription ID
    pub subscription_id: String,
    /// Hex HMAC-SHA256 over `payment_id|subscription_id`
    pub signature: String,
    /// Whether the payment extends an existing term
    pub is_renewal: bool,
}

/// Outcome of a snapshot operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotUpdate {
    pub account_id: AccountId,
    /// Snapshot as stored after the operation
    pub snapshot: SubscriptionSnapshot,
    /// False when the stored snapshot already reflected the operation
    pub changed: bool,
}

enum Decision {
    Write(SubscriptionSnapshot),
    Unchanged,
}

/// Subscription activation engine
pub struct SubscriptionEngine {
    accounts: Arc<dyn AccountRepository>,
    plans: Arc<dyn PlanRepository>,
    clock: Arc<dyn Clock>,
    confirmation_key: SigningKey,
    max_conflict_retries: u32,
}

impl SubscriptionEngine {
    /// Create a new engine
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        plans: Arc<dyn PlanRepository>,
        clock: Arc<dyn Clock>,
        confirmation_key: SigningKey,
        max_conflict_retries: u32,
    ) -> Self {
        Self {
            accounts,
            plans,
            clock,
            confirmation_key,
            max_conflict_retries,
        }
    }

    /// Register a shop-owner account with an inactive snapshot
    #[instrument(skip(self))]
    pub async fn open_account(
        &self,
        shop_name: &str,
        email: &str,
    ) -> Result<AccountId, BillingError> {
        let row = self
            .accounts
            .create(CreateAccount {
                id: Uuid::new_v4(),
                shop_name: shop_name.to_string(),
                email: email.to_string(),
            })
            .await?;

        info!(account_id = %row.id, "Account opened");
        Ok(row.account_id())
    }

    /// Apply a client-confirmed payment.
    ///
    /// The signature is checked before anything is read or written. The
    /// signed subscription and the requested plan must be the ones recorded
    /// by this account's checkout, and a payment ID already credited to the
    /// account is a no-op.
    #[instrument(
        skip(self, confirmation),
        fields(account_id = %account_id, payment_id = %confirmation.payment_id)
    )]
    pub async fn activate_or_renew(
        &self,
        account_id: AccountId,
        confirmation: &PaymentConfirmation,
        plan_id: &PlanId,
    ) -> Result<SnapshotUpdate, BillingError> {
        let payload = confirmation_payload(&confirmation.payment_id, &confirmation.subscription_id);
        if !self
            .confirmation_key
            .verify_hex(payload.as_bytes(), &confirmation.signature)
        {
            warn!(
                subscription_id = %confirmation.subscription_id,
                "Payment confirmation signature mismatch"
            );
            return Err(BillingError::InvalidSignature);
        }

        let plan = self.plan(plan_id).await?;
        let renewal = confirmation.is_renewal;

        let update = self
            .update_snapshot(account_id, |snapshot, now| {
                if already_applied(snapshot, &confirmation.payment_id) {
                    return Ok(Decision::Unchanged);
                }
                ensure_checkout(snapshot, &confirmation.subscription_id, &plan.id)?;
                activated(snapshot, &plan, now, renewal, Some(&confirmation.payment_id))
                    .map(Decision::Write)
            })
            .await?;

        log_activation(&update, "client_confirmation");
        Ok(update)
    }

    /// Apply a `subscription.charged` webhook.
    ///
    /// The branch between fresh start and extension comes from the stored
    /// request kind: `Renew` extends, `New` starts now, and a cleared kind
    /// extends only when the account is active (recurring charges).
    #[instrument(skip(self))]
    pub async fn apply_webhook_charge(
        &self,
        subscription_id: &str,
        payment_id: &str,
    ) -> Result<SnapshotUpdate, BillingError> {
        let account_id = self.resolve_account_by_subscription_id(subscription_id).await?;
        let plan = self.stored_plan(account_id).await?;

        let update = self
            .update_snapshot(account_id, |snapshot, now| {
                if already_applied(snapshot, payment_id) {
                    return Ok(Decision::Unchanged);
                }
                if snapshot.external_subscription_id.as_deref() != Some(subscription_id) {
                    return Err(BillingError::AccountNotFound);
                }
                if snapshot.plan_id.as_ref() != Some(&plan.id) {
                    return Err(BillingError::ConcurrentModification);
                }
                let renewal = webhook_is_renewal(snapshot);
                activated(snapshot, &plan, now, renewal, Some(payment_id))
                    .map(Decision::Write)
            })
            .await?;

        log_activation(&update, "webhook");
        Ok(update)
    }

    /// Set the account inactive. Dates are left as they are.
    #[instrument(skip(self))]
    pub async fn cancel(&self, account_id: AccountId) -> Result<SnapshotUpdate, BillingError> {
        self.cancel_matching(account_id, None).await
    }

    /// Cancel the account currently holding a gateway subscription
    #[instrument(skip(self))]
    pub async fn cancel_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<SnapshotUpdate, BillingError> {
        let account_id = self.resolve_account_by_subscription_id(subscription_id).await?;
        self.cancel_matching(account_id, Some(subscription_id)).await
    }

    async fn cancel_matching(
        &self,
        account_id: AccountId,
        subscription_id: Option<&str>,
    ) -> Result<SnapshotUpdate, BillingError> {
        let update = self
            .update_snapshot(account_id, |snapshot, _| {
                // The account moved on to another gateway subscription
                if subscription_id.is_some()
                    && snapshot.external_subscription_id.as_deref() != subscription_id
                {
                    return Ok(Decision::Unchanged);
                }
                if snapshot.status == SubscriptionStatus::Inactive {
                    return Ok(Decision::Unchanged);
                }
                let mut next = snapshot.clone();
                next.status = SubscriptionStatus::Inactive;
                Ok(Decision::Write(next))
            })
            .await?;

        if update.changed {
            info!(account_id = %account_id, "Subscription cancelled");
        }
        Ok(update)
    }

    /// Exact-match lookup of the account holding a gateway subscription.
    ///
    /// Zero or several matches both resolve to `AccountNotFound`.
    pub async fn resolve_account_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<AccountId, BillingError> {
        let rows = self
            .accounts
            .find_by_external_subscription_id(subscription_id)
            .await?;

        match rows.as_slice() {
            [row] => Ok(row.account_id()),
            [] => {
                debug!(subscription_id, "No account holds gateway subscription");
                Err(BillingError::AccountNotFound)
            }
            _ => {
                error!(
                    subscription_id,
                    matches = rows.len(),
                    "Gateway subscription ID is held by more than one account"
                );
                Err(BillingError::AccountNotFound)
            }
        }
    }

    /// Record a gateway subscription created for this account.
    ///
    /// Accounts without a running term move to `pending_verification`;
    /// active accounts stay active until the renewal is charged.
    #[instrument(skip(self, plan), fields(plan_id = %plan.id))]
    pub async fn begin_checkout(
        &self,
        account_id: AccountId,
        plan: &Plan,
        renewal: bool,
        gateway_subscription_id: &str,
    ) -> Result<SnapshotUpdate, BillingError> {
        self.update_snapshot(account_id, |snapshot, _| {
            let mut next = snapshot.clone();
            if snapshot.status != SubscriptionStatus::Active {
                next.status = SubscriptionStatus::PendingVerification;
                next.rejection_reason = None;
            }
            next.plan_id = Some(plan.id.clone());
            next.external_subscription_id = Some(gateway_subscription_id.to_string());
            next.request_kind = Some(RequestKind::from_renewal(renewal));
            Ok(Decision::Write(next))
        })
        .await
    }

    /// Record a manual bank payment for admin review.
    ///
    /// Allowed from `inactive`, `rejected` and from an `active` account whose
    /// term has already run out. Running terms renew through the gateway.
    #[instrument(skip(self, plan, utr), fields(plan_id = %plan.id))]
    pub async fn submit_manual_payment(
        &self,
        account_id: AccountId,
        plan: &Plan,
        utr: &str,
        renewal: bool,
    ) -> Result<SnapshotUpdate, BillingError> {
        let update = self
            .update_snapshot(account_id, |snapshot, now| {
                let allowed = match snapshot.status {
                    SubscriptionStatus::Inactive | SubscriptionStatus::Rejected => true,
                    SubscriptionStatus::Active => snapshot.is_expired(now),
                    SubscriptionStatus::PendingVerification => false,
                };
                if !allowed {
                    return Err(BillingError::InvalidTransition {
                        from: snapshot.status,
                        action: "submit a manual payment",
                    });
                }

                let mut next = snapshot.clone();
                next.status = SubscriptionStatus::PendingVerification;
                next.plan_id = Some(plan.id.clone());
                next.utr = Some(utr.to_string());
                next.request_kind = Some(RequestKind::from_renewal(renewal));
                next.rejection_reason = None;
                Ok(Decision::Write(next))
            })
            .await?;

        info!(account_id = %account_id, "Manual payment submitted for review");
        Ok(update)
    }

    /// Admin approval of a pending payment
    #[instrument(skip(self))]
    pub async fn approve_manual_payment(
        &self,
        account_id: AccountId,
    ) -> Result<SnapshotUpdate, BillingError> {
        let stored = self.snapshot(account_id).await?;
        ensure_pending(&stored, "approve a payment")?;
        let plan = self.stored_plan(account_id).await?;

        let update = self
            .update_snapshot(account_id, |snapshot, now| {
                ensure_pending(snapshot, "approve a payment")?;
                if snapshot.plan_id.as_ref() != Some(&plan.id) {
                    return Err(BillingError::ConcurrentModification);
                }
                let renewal = snapshot.request_kind == Some(RequestKind::Renew);
                activated(snapshot, &plan, now, renewal, None).map(Decision::Write)
            })
            .await?;

        log_activation(&update, "manual_approval");
        Ok(update)
    }

    /// Admin rejection of a pending payment
    #[instrument(skip(self, reason))]
    pub async fn reject_manual_payment(
        &self,
        account_id: AccountId,
        reason: &str,
    ) -> Result<SnapshotUpdate, BillingError> {
        let update = self
            .update_snapshot(account_id, |snapshot, _| {
                ensure_pending(snapshot, "reject a payment")?;
                let mut next = snapshot.clone();
                next.status = SubscriptionStatus::Rejected;
                next.rejection_reason = Some(reason.to_string());
                next.request_kind = None;
                Ok(Decision::Write(next))
            })
            .await?;

        info!(account_id = %account_id, "Manual payment rejected");
        Ok(update)
    }

    /// Current snapshot of an account
    pub async fn snapshot(&self, account_id: AccountId) -> Result<SubscriptionSnapshot, BillingError> {
        Ok(self.load_account(account_id).await?.snapshot()?)
    }

    /// Accounts waiting for review, oldest first
    pub async fn pending_reviews(
        &self,
        limit: i64,
    ) -> Result<Vec<(AccountId, SubscriptionSnapshot)>, BillingError> {
        let rows = self
            .accounts
            .find_by_status(SubscriptionStatus::PendingVerification.as_str(), limit)
            .await?;

        rows.into_iter()
            .map(|row| Ok((row.account_id(), row.snapshot()?)))
            .collect()
    }

    /// Catalog plan, validated for use in an activation
    pub async fn plan(&self, plan_id: &PlanId) -> Result<Plan, BillingError> {
        let row = self
            .plans
            .find_by_id(plan_id.as_str())
            .await?
            .ok_or(BillingError::PlanNotFound)?;
        let plan = row.to_plan()?;
        validate_plan(&plan)?;
        Ok(plan)
    }

    /// Catalog plan that is still offered for new purchases
    pub async fn plan_for_sale(&self, plan_id: &PlanId) -> Result<Plan, BillingError> {
        let plan = self.plan(plan_id).await?;
        if !plan.active {
            debug!(plan_id = %plan_id, "Plan is no longer offered");
            return Err(BillingError::PlanNotFound);
        }
        Ok(plan)
    }

    /// Plans currently offered
    pub async fn list_plans(&self) -> Result<Vec<Plan>, BillingError> {
        let rows = self.plans.list_active().await?;
        rows.iter()
            .map(|row| row.to_plan().map_err(BillingError::from))
            .collect()
    }

    /// Current time as seen by the engine
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Check store connectivity
    pub async fn ping(&self) -> Result<(), BillingError> {
        Ok(self.accounts.ping().await?)
    }

    async fn load_account(&self, account_id: AccountId) -> Result<AccountRow, BillingError> {
        self.accounts
            .find_by_id(account_id.0)
            .await?
            .ok_or(BillingError::AccountNotFound)
    }

    async fn stored_plan(&self, account_id: AccountId) -> Result<Plan, BillingError> {
        let stored = self.snapshot(account_id).await?;
        let Some(plan_id) = stored.plan_id else {
            warn!(account_id = %account_id, "No plan recorded for pending payment");
            return Err(BillingError::PlanNotFound);
        };
        self.plan(&plan_id).await
    }

    /// Read, decide, compare-and-swap; on conflict start over from a fresh
    /// read, at most `max_conflict_retries` more times.
    async fn update_snapshot<F>(
        &self,
        account_id: AccountId,
        mut decide: F,
    ) -> Result<SnapshotUpdate, BillingError>
    where
        F: FnMut(&SubscriptionSnapshot, DateTime<Utc>) -> Result<Decision, BillingError> + Send,
    {
        for attempt in 0..=self.max_conflict_retries {
            let row = self.load_account(account_id).await?;
            let current = row.snapshot()?;

            let next = match decide(&current, self.clock.now())? {
                Decision::Write(next) if next != current => next,
                _ => {
                    return Ok(SnapshotUpdate {
                        account_id,
                        snapshot: current,
                        changed: false,
                    })
                }
            };

            if self
                .accounts
                .compare_and_swap_snapshot(row.id, row.version, &next)
                .await?
            {
                return Ok(SnapshotUpdate {
                    account_id,
                    snapshot: next,
                    changed: true,
                });
            }

            warn!(
                account_id = %account_id,
                attempt,
                version = row.version,
                "Snapshot changed concurrently, recomputing"
            );
        }

        error!(account_id = %account_id, "Gave up after repeated snapshot conflicts");
        Err(BillingError::ConcurrentModification)
    }
}

fn validate_plan(plan: &Plan) -> Result<(), BillingError> {
    if plan.price <= 0 {
        error!(plan_id = %plan.id, price = plan.price, "Plan has a non-positive price");
        return Err(BillingError::InvalidPlanPrice);
    }
    if !plan.duration.is_positive() {
        error!(plan_id = %plan.id, "Plan has a zero duration");
        return Err(BillingError::InvalidPlanDuration);
    }
    Ok(())
}

fn ensure_pending(snapshot: &SubscriptionSnapshot, action: &'static str) -> Result<(), BillingError> {
    if snapshot.status == SubscriptionStatus::PendingVerification {
        Ok(())
    } else {
        Err(BillingError::InvalidTransition {
            from: snapshot.status,
            action,
        })
    }
}

/// The payment has already bought a term on this account
fn already_applied(snapshot: &SubscriptionSnapshot, payment_id: &str) -> bool {
    snapshot.external_payment_id.as_deref() == Some(payment_id)
        || snapshot.applied_payment_ids.iter().any(|id| id == payment_id)
}

/// A client confirmation must settle the checkout recorded on the account
fn ensure_checkout(
    snapshot: &SubscriptionSnapshot,
    subscription_id: &str,
    plan_id: &PlanId,
) -> Result<(), BillingError> {
    let field = if snapshot.external_subscription_id.as_deref() != Some(subscription_id) {
        "subscription_id"
    } else if snapshot.plan_id.as_ref() != Some(plan_id) {
        "plan_id"
    } else {
        return Ok(());
    };
    warn!(
        subscription_id,
        recorded = ?snapshot.external_subscription_id,
        field,
        "Confirmation does not match the recorded checkout"
    );
    Err(BillingError::CheckoutMismatch { field })
}

fn webhook_is_renewal(snapshot: &SubscriptionSnapshot) -> bool {
    match snapshot.request_kind {
        Some(RequestKind::Renew) => true,
        Some(RequestKind::New) => false,
        None => snapshot.status == SubscriptionStatus::Active,
    }
}

/// Snapshot after a confirmed payment for `plan`
fn activated(
    current: &SubscriptionSnapshot,
    plan: &Plan,
    now: DateTime<Utc>,
    renewal: bool,
    payment_id: Option<&str>,
) -> Result<SubscriptionSnapshot, BillingError> {
    let window = schedule::compute_window(now, current.end_date, renewal, plan.duration)
        .ok_or(BillingError::InvalidPlanDuration)?;

    let mut next = current.clone();
    next.status = SubscriptionStatus::Active;
    next.copy_plan(plan);
    next.start_date = Some(window.start);
    next.end_date = Some(window.end);
    next.rejection_reason = None;
    next.request_kind = None;
    if let Some(id) = payment_id {
        next.external_payment_id = Some(id.to_string());
        if !next.applied_payment_ids.iter().any(|applied| applied == id) {
            next.applied_payment_ids.push(id.to_string());
        }
    }
    Ok(next)
}

fn log_activation(update: &SnapshotUpdate, path: &'static str) {
    if update.changed {
        info!(
            account_id = %update.account_id,
            path,
            start = ?update.snapshot.start_date,
            end = ?update.snapshot.end_date,
            "Subscription activated"
        );
    } else {
        debug!(account_id = %update.account_id, path, "Payment already applied");
    }
}
