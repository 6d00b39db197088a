//! Shared fixtures: secrets, plans and an engine over in-memory stores

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use ledgerly_billing_core::{
    confirmation_payload, BillingConfig, FixedClock, PaymentConfirmation, SigningKey,
    SubscriptionEngine,
};
use ledgerly_db::{AccountRepository, MemoryAccountRepository, MemoryPlanRepository};
use ledgerly_types::{
    AccountId, Plan, PlanDuration, PlanId, RequestKind, SubscriptionSnapshot, SubscriptionStatus,
};

pub const GATEWAY_KEY_ID: &str = "rzp_test_key";
pub const GATEWAY_KEY_SECRET: &str = "gw-secret-1";
pub const CONFIRM_SECRET: &str = "confirm-secret-2";
pub const WEBHOOK_SECRET: &str = "hook-secret-3";

/// Fixed "now" for deterministic windows
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap()
}

/// One-month plan sold through the gateway
pub fn basic_plan() -> Plan {
    Plan {
        id: PlanId::new("basic-monthly"),
        name: "Basic".to_string(),
        price: 49_900,
        duration: PlanDuration::months(1),
        gateway_plan_id: Some("plan_basic".to_string()),
        active: true,
    }
}

/// Client confirmation signed with the confirmation secret
pub fn confirmation(payment_id: &str, subscription_id: &str, is_renewal: bool) -> PaymentConfirmation {
    let key = SigningKey::new(CONFIRM_SECRET).unwrap();
    PaymentConfirmation {
        payment_id: payment_id.to_string(),
        subscription_id: subscription_id.to_string(),
        signature: key.sign_hex(confirmation_payload(payment_id, subscription_id).as_bytes()),
        is_renewal,
    }
}

/// Snapshot left behind by a new-purchase checkout on the basic plan
pub fn checkout_snapshot(subscription_id: &str) -> SubscriptionSnapshot {
    SubscriptionSnapshot {
        status: SubscriptionStatus::PendingVerification,
        plan_id: Some(basic_plan().id),
        external_subscription_id: Some(subscription_id.to_string()),
        request_kind: Some(RequestKind::New),
        ..SubscriptionSnapshot::inactive()
    }
}

#[allow(dead_code)]
pub fn config() -> BillingConfig {
    BillingConfig::new(GATEWAY_KEY_ID, GATEWAY_KEY_SECRET, CONFIRM_SECRET, WEBHOOK_SECRET)
}

/// Engine wired to in-memory stores and a fixed clock
pub struct Harness {
    pub accounts: MemoryAccountRepository,
    pub plans: MemoryPlanRepository,
    pub clock: Arc<FixedClock>,
    pub engine: SubscriptionEngine,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        let accounts = MemoryAccountRepository::new();
        Self::with_store(accounts.clone(), Arc::new(accounts), 1)
    }

    /// Engine over an arbitrary account store; `accounts` is the backing
    /// in-memory store used for seeding and inspection
    pub fn with_store(
        accounts: MemoryAccountRepository,
        store: Arc<dyn AccountRepository>,
        max_conflict_retries: u32,
    ) -> Self {
        let plans = MemoryPlanRepository::new();
        plans.insert_plan(&basic_plan());
        let clock = Arc::new(FixedClock::new(t0()));

        let engine = SubscriptionEngine::new(
            store,
            Arc::new(plans.clone()),
            clock.clone(),
            SigningKey::new(CONFIRM_SECRET).unwrap(),
            max_conflict_retries,
        );

        Self {
            accounts,
            plans,
            clock,
            engine,
        }
    }

    /// Seed an inactive account
    pub fn account(&self) -> AccountId {
        let id = Uuid::new_v4();
        self.accounts
            .insert_account(MemoryAccountRepository::new_account_row(
                id,
                "Corner Store",
                "owner@example.com",
            ));
        AccountId(id)
    }

    /// Seed an account holding the given snapshot
    pub fn account_with(&self, snapshot: &SubscriptionSnapshot) -> AccountId {
        let id = Uuid::new_v4();
        let mut row =
            MemoryAccountRepository::new_account_row(id, "Corner Store", "owner@example.com");
        row.set_snapshot(snapshot);
        self.accounts.insert_account(row);
        AccountId(id)
    }

    /// Seed an account waiting on the gateway for `subscription_id` on the
    /// basic plan
    pub fn account_in_checkout(&self, subscription_id: &str) -> AccountId {
        self.account_with(&checkout_snapshot(subscription_id))
    }

    pub fn version(&self, account_id: AccountId) -> i64 {
        self.accounts.version_of(account_id.0).unwrap()
    }
}
