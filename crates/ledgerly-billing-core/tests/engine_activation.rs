//! Activation engine tests
//!
//! Window rules, signature checks, idempotency, webhook branching and
//! compare-and-swap retries against in-memory stores.

mod common;

use std::sync::Arc;

use chrono::{Duration, Months};
use common::{
    basic_plan, checkout_snapshot, confirmation, t0, Harness, RacingAccountRepository,
};
use ledgerly_billing_core::{BillingError, PaymentConfirmation};
use ledgerly_db::MemoryAccountRepository;
use ledgerly_types::{
    AccountId, Plan, PlanDuration, PlanId, RequestKind, SubscriptionSnapshot, SubscriptionStatus,
};

fn active_until(end: chrono::DateTime<chrono::Utc>) -> SubscriptionSnapshot {
    let mut snap = SubscriptionSnapshot::inactive();
    snap.status = SubscriptionStatus::Active;
    snap.copy_plan(&basic_plan());
    snap.start_date = Some(end - Duration::days(30));
    snap.end_date = Some(end);
    snap.external_subscription_id = Some("sub_A".to_string());
    snap
}

fn plan_id() -> PlanId {
    basic_plan().id
}

// ============================================================================
// activate_or_renew
// ============================================================================

#[tokio::test]
async fn test_new_activation_starts_now() {
    let h = Harness::new();
    let account = h.account_in_checkout("sub_A");

    let update = h
        .engine
        .activate_or_renew(account, &confirmation("pay_1", "sub_A", false), &plan_id())
        .await
        .unwrap();

    assert!(update.changed);
    let snap = h.engine.snapshot(account).await.unwrap();
    assert_eq!(snap.status, SubscriptionStatus::Active);
    assert_eq!(snap.start_date, Some(t0()));
    assert_eq!(snap.end_date, t0().checked_add_months(Months::new(1)));
    assert_eq!(snap.plan_name.as_deref(), Some("Basic"));
    assert_eq!(snap.plan_price, Some(49_900));
    assert_eq!(snap.external_payment_id.as_deref(), Some("pay_1"));
    assert_eq!(snap.external_subscription_id.as_deref(), Some("sub_A"));
    assert_eq!(snap.applied_payment_ids, vec!["pay_1".to_string()]);
}

#[tokio::test]
async fn test_renewal_of_running_term_extends_from_current_end() {
    let h = Harness::new();
    let end = t0() + Duration::days(10);
    let account = h.account_with(&active_until(end));

    h.engine
        .activate_or_renew(account, &confirmation("pay_2", "sub_A", true), &plan_id())
        .await
        .unwrap();

    let snap = h.engine.snapshot(account).await.unwrap();
    assert_eq!(snap.start_date, Some(end));
    assert_eq!(snap.end_date, end.checked_add_months(Months::new(1)));
}

#[tokio::test]
async fn test_renewal_of_lapsed_term_starts_now() {
    let h = Harness::new();
    let account = h.account_with(&active_until(t0() - Duration::days(3)));

    h.engine
        .activate_or_renew(account, &confirmation("pay_2", "sub_A", true), &plan_id())
        .await
        .unwrap();

    let snap = h.engine.snapshot(account).await.unwrap();
    assert_eq!(snap.start_date, Some(t0()));
    assert_eq!(snap.end_date, t0().checked_add_months(Months::new(1)));
}

#[tokio::test]
async fn test_renewal_ending_exactly_now_starts_now() {
    let h = Harness::new();
    let account = h.account_with(&active_until(t0()));

    h.engine
        .activate_or_renew(account, &confirmation("pay_2", "sub_A", true), &plan_id())
        .await
        .unwrap();

    assert_eq!(h.engine.snapshot(account).await.unwrap().start_date, Some(t0()));
}

#[tokio::test]
async fn test_new_purchase_over_running_term_does_not_extend() {
    let h = Harness::new();
    let account = h.account_with(&active_until(t0() + Duration::days(20)));
    h.engine
        .begin_checkout(account, &basic_plan(), false, "sub_B")
        .await
        .unwrap();

    h.engine
        .activate_or_renew(account, &confirmation("pay_2", "sub_B", false), &plan_id())
        .await
        .unwrap();

    let snap = h.engine.snapshot(account).await.unwrap();
    assert_eq!(snap.start_date, Some(t0()));
    assert_eq!(snap.external_subscription_id.as_deref(), Some("sub_B"));
}

#[tokio::test]
async fn test_invalid_signature_writes_nothing() {
    let h = Harness::new();
    let account = h.account_in_checkout("sub_A");

    let mut forged = confirmation("pay_1", "sub_A", false);
    forged.signature = "00".repeat(32);

    let err = h
        .engine
        .activate_or_renew(account, &forged, &plan_id())
        .await
        .unwrap_err();

    assert!(matches!(err, BillingError::InvalidSignature));
    assert_eq!(h.version(account), 0);
    assert_eq!(
        h.engine.snapshot(account).await.unwrap(),
        checkout_snapshot("sub_A")
    );
}

#[tokio::test]
async fn test_signature_is_bound_to_both_ids() {
    let h = Harness::new();
    let account = h.account();

    // Valid signature for pay_1|sub_A replayed against another subscription
    let original = confirmation("pay_1", "sub_A", false);
    let swapped = PaymentConfirmation {
        subscription_id: "sub_B".to_string(),
        ..original
    };

    let err = h
        .engine
        .activate_or_renew(account, &swapped, &plan_id())
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::InvalidSignature));
}

#[tokio::test]
async fn test_invalid_signature_wins_over_missing_account() {
    let h = Harness::new();

    let mut forged = confirmation("pay_1", "sub_A", false);
    forged.signature = "not-hex".to_string();

    let err = h
        .engine
        .activate_or_renew(AccountId::new(), &forged, &plan_id())
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::InvalidSignature));
}

#[tokio::test]
async fn test_unknown_account() {
    let h = Harness::new();

    let err = h
        .engine
        .activate_or_renew(
            AccountId::new(),
            &confirmation("pay_1", "sub_A", false),
            &plan_id(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::AccountNotFound));
}

#[tokio::test]
async fn test_plan_errors_leave_snapshot_untouched() {
    let h = Harness::new();
    let account = h.account_in_checkout("sub_A");

    let free = Plan {
        id: PlanId::new("free"),
        price: 0,
        ..basic_plan()
    };
    let empty = Plan {
        id: PlanId::new("empty"),
        duration: PlanDuration::months(0),
        ..basic_plan()
    };
    h.plans.insert_plan(&free);
    h.plans.insert_plan(&empty);

    let confirm = confirmation("pay_1", "sub_A", false);

    let err = h
        .engine
        .activate_or_renew(account, &confirm, &PlanId::new("missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::PlanNotFound));

    let err = h
        .engine
        .activate_or_renew(account, &confirm, &free.id)
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::InvalidPlanPrice));

    let err = h
        .engine
        .activate_or_renew(account, &confirm, &empty.id)
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::InvalidPlanDuration));

    assert_eq!(h.version(account), 0);
}

#[tokio::test]
async fn test_same_payment_applied_once() {
    let h = Harness::new();
    let account = h.account_with(&active_until(t0() + Duration::days(10)));
    let confirm = confirmation("pay_2", "sub_A", true);

    let first = h
        .engine
        .activate_or_renew(account, &confirm, &plan_id())
        .await
        .unwrap();
    let second = h
        .engine
        .activate_or_renew(account, &confirm, &plan_id())
        .await
        .unwrap();

    assert!(first.changed);
    assert!(!second.changed);
    assert_eq!(first.snapshot, second.snapshot);
    assert_eq!(h.version(account), 1);
}

#[tokio::test]
async fn test_one_payment_cannot_activate_another_account() {
    let h = Harness::new();
    let paid = h.account_in_checkout("sub_A");
    let other = h.account_in_checkout("sub_B");

    // Correctly signed for sub_A, submitted against the other shop
    let err = h
        .engine
        .activate_or_renew(other, &confirmation("pay_1", "sub_A", false), &plan_id())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BillingError::CheckoutMismatch {
            field: "subscription_id"
        }
    ));
    assert_eq!(h.version(other), 0);
    assert_eq!(h.engine.snapshot(other).await.unwrap(), checkout_snapshot("sub_B"));

    // An account that never checked out cannot claim it either
    let fresh = h.account();
    let err = h
        .engine
        .activate_or_renew(fresh, &confirmation("pay_1", "sub_A", false), &plan_id())
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::CheckoutMismatch { .. }));

    assert_eq!(
        h.engine.resolve_account_by_subscription_id("sub_A").await.unwrap(),
        paid
    );
}

#[tokio::test]
async fn test_confirmation_cannot_switch_plan() {
    let h = Harness::new();
    let account = h.account_in_checkout("sub_A");
    let pro = Plan {
        id: PlanId::new("pro-yearly"),
        name: "Pro".to_string(),
        price: 499_900,
        duration: PlanDuration::months(12),
        ..basic_plan()
    };
    h.plans.insert_plan(&pro);

    let err = h
        .engine
        .activate_or_renew(account, &confirmation("pay_1", "sub_A", false), &pro.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BillingError::CheckoutMismatch { field: "plan_id" }
    ));
    assert_eq!(h.version(account), 0);

    // The plan that was checked out still goes through
    let update = h
        .engine
        .activate_or_renew(account, &confirmation("pay_1", "sub_A", false), &plan_id())
        .await
        .unwrap();
    assert_eq!(update.snapshot.plan_name.as_deref(), Some("Basic"));
}

#[tokio::test]
async fn test_old_payment_replayed_after_newer_charge_is_a_noop() {
    let h = Harness::new();
    let account = h.account_in_checkout("sub_A");

    h.engine
        .activate_or_renew(account, &confirmation("pay_1", "sub_A", false), &plan_id())
        .await
        .unwrap();
    let renewed = h
        .engine
        .apply_webhook_charge("sub_A", "pay_2")
        .await
        .unwrap()
        .snapshot;
    assert_eq!(
        renewed.applied_payment_ids,
        vec!["pay_1".to_string(), "pay_2".to_string()]
    );
    let version = h.version(account);

    let replay = h
        .engine
        .activate_or_renew(account, &confirmation("pay_1", "sub_A", true), &plan_id())
        .await
        .unwrap();
    assert!(!replay.changed);
    assert_eq!(replay.snapshot.end_date, renewed.end_date);
    assert_eq!(h.version(account), version);

    let webhook_replay = h.engine.apply_webhook_charge("sub_A", "pay_1").await.unwrap();
    assert!(!webhook_replay.changed);
    assert_eq!(h.version(account), version);
}

// ============================================================================
// Webhook charges and cancellation
// ============================================================================

#[tokio::test]
async fn test_webhook_charge_after_checkout_starts_fresh_term() {
    let h = Harness::new();
    let account = h.account();
    h.engine
        .begin_checkout(account, &basic_plan(), false, "sub_A")
        .await
        .unwrap();

    h.clock.advance(Duration::minutes(5));
    let update = h.engine.apply_webhook_charge("sub_A", "pay_1").await.unwrap();

    assert!(update.changed);
    let snap = update.snapshot;
    assert_eq!(snap.status, SubscriptionStatus::Active);
    assert_eq!(snap.start_date, Some(t0() + Duration::minutes(5)));
    assert_eq!(snap.request_kind, None);
    assert_eq!(snap.external_payment_id.as_deref(), Some("pay_1"));
}

#[tokio::test]
async fn test_webhook_renewal_checkout_extends_running_term() {
    let h = Harness::new();
    let end = t0() + Duration::days(5);
    let account = h.account_with(&active_until(end));
    h.engine
        .begin_checkout(account, &basic_plan(), true, "sub_B")
        .await
        .unwrap();

    let snap = h
        .engine
        .apply_webhook_charge("sub_B", "pay_9")
        .await
        .unwrap()
        .snapshot;
    assert_eq!(snap.start_date, Some(end));
}

#[tokio::test]
async fn test_webhook_new_checkout_over_running_term_starts_now() {
    let h = Harness::new();
    let account = h.account_with(&active_until(t0() + Duration::days(5)));
    h.engine
        .begin_checkout(account, &basic_plan(), false, "sub_B")
        .await
        .unwrap();

    let snap = h
        .engine
        .apply_webhook_charge("sub_B", "pay_9")
        .await
        .unwrap()
        .snapshot;
    assert_eq!(snap.start_date, Some(t0()));
}

#[tokio::test]
async fn test_recurring_charge_on_active_account_extends() {
    let h = Harness::new();
    let end = t0() + Duration::days(1);
    let mut snap = active_until(end);
    snap.external_payment_id = Some("pay_1".to_string());
    let account = h.account_with(&snap);

    let next = h
        .engine
        .apply_webhook_charge("sub_A", "pay_2")
        .await
        .unwrap()
        .snapshot;
    assert_eq!(next.start_date, Some(end));
    assert_eq!(next.external_payment_id.as_deref(), Some("pay_2"));
    assert_eq!(h.version(account), 1);
}

#[tokio::test]
async fn test_client_then_webhook_for_same_payment_applies_once() {
    let h = Harness::new();
    let account = h.account();
    h.engine
        .begin_checkout(account, &basic_plan(), false, "sub_A")
        .await
        .unwrap();

    h.engine
        .activate_or_renew(account, &confirmation("pay_1", "sub_A", false), &plan_id())
        .await
        .unwrap();
    let version = h.version(account);

    let dup = h.engine.apply_webhook_charge("sub_A", "pay_1").await.unwrap();
    assert!(!dup.changed);
    assert_eq!(h.version(account), version);
}

#[tokio::test]
async fn test_webhook_for_unknown_subscription() {
    let h = Harness::new();
    h.account();

    let err = h
        .engine
        .apply_webhook_charge("sub_nobody", "pay_1")
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::AccountNotFound));
}

#[tokio::test]
async fn test_ambiguous_subscription_id_resolves_to_nothing() {
    let h = Harness::new();
    h.account_with(&active_until(t0()));
    h.account_with(&active_until(t0()));

    let err = h
        .engine
        .resolve_account_by_subscription_id("sub_A")
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::AccountNotFound));
}

#[tokio::test]
async fn test_resolve_is_exact_match() {
    let h = Harness::new();
    let account = h.account_with(&active_until(t0()));

    assert_eq!(
        h.engine.resolve_account_by_subscription_id("sub_A").await.unwrap(),
        account
    );
    assert!(h
        .engine
        .resolve_account_by_subscription_id("sub_a")
        .await
        .is_err());
    assert!(h.engine.resolve_account_by_subscription_id("sub_").await.is_err());
}

#[tokio::test]
async fn test_cancel_keeps_dates() {
    let h = Harness::new();
    let end = t0() + Duration::days(12);
    let account = h.account_with(&active_until(end));

    let update = h.engine.cancel_by_subscription_id("sub_A").await.unwrap();
    assert!(update.changed);
    assert_eq!(update.snapshot.status, SubscriptionStatus::Inactive);
    assert_eq!(update.snapshot.end_date, Some(end));

    let again = h.engine.cancel(account).await.unwrap();
    assert!(!again.changed);
}

#[tokio::test]
async fn test_status_is_not_expired_in_storage() {
    let h = Harness::new();
    let account = h.account_in_checkout("sub_A");
    h.engine
        .activate_or_renew(account, &confirmation("pay_1", "sub_A", false), &plan_id())
        .await
        .unwrap();

    h.clock.advance(Duration::days(40));
    let snap = h.engine.snapshot(account).await.unwrap();

    assert_eq!(snap.status, SubscriptionStatus::Active);
    assert!(snap.is_expired(h.engine.now()));
    assert!(!snap.is_entitled(h.engine.now()));
}

// ============================================================================
// Compare-and-swap retries
// ============================================================================

#[tokio::test]
async fn test_conflict_recomputes_from_concurrent_result() {
    let memory = MemoryAccountRepository::new();
    let racing = Arc::new(RacingAccountRepository::new(memory.clone()));
    let h = Harness::with_store(memory, racing.clone(), 1);

    let account = h.account_with(&active_until(t0() + Duration::days(2)));

    // Another renewal lands between our read and our write
    let concurrent_end = t0() + Duration::days(33);
    let mut concurrent = active_until(concurrent_end);
    concurrent.external_payment_id = Some("pay_other".to_string());
    racing.interfere_with(concurrent);

    let update = h
        .engine
        .activate_or_renew(account, &confirmation("pay_mine", "sub_A", true), &plan_id())
        .await
        .unwrap();

    assert_eq!(racing.cas_calls(), 2);
    assert_eq!(update.snapshot.start_date, Some(concurrent_end));
    assert_eq!(
        update.snapshot.end_date,
        concurrent_end.checked_add_months(Months::new(1))
    );
    assert_eq!(h.engine.snapshot(account).await.unwrap(), update.snapshot);
}

#[tokio::test]
async fn test_conflict_that_already_applied_the_payment_is_a_noop() {
    let memory = MemoryAccountRepository::new();
    let racing = Arc::new(RacingAccountRepository::new(memory.clone()));
    let h = Harness::with_store(memory, racing.clone(), 1);
    let account = h.account_in_checkout("sub_A");

    // The webhook for the same payment wins the race
    let mut winner = active_until(t0().checked_add_months(Months::new(1)).unwrap());
    winner.start_date = Some(t0());
    winner.external_payment_id = Some("pay_1".to_string());
    racing.interfere_with(winner.clone());

    let update = h
        .engine
        .activate_or_renew(account, &confirmation("pay_1", "sub_A", false), &plan_id())
        .await
        .unwrap();

    assert!(!update.changed);
    assert_eq!(update.snapshot, winner);
}

#[tokio::test]
async fn test_persistent_conflict_gives_up() {
    let memory = MemoryAccountRepository::new();
    let racing = Arc::new(RacingAccountRepository::new(memory.clone()));
    let h = Harness::with_store(memory, racing.clone(), 2);
    let account = h.account_in_checkout("sub_A");
    racing.conflict_forever();

    let err = h
        .engine
        .activate_or_renew(account, &confirmation("pay_1", "sub_A", false), &plan_id())
        .await
        .unwrap_err();

    assert!(matches!(err, BillingError::ConcurrentModification));
    assert_eq!(racing.cas_calls(), 3);
    assert_eq!(
        h.engine.snapshot(account).await.unwrap().status,
        SubscriptionStatus::PendingVerification
    );
}

#[tokio::test]
async fn test_zero_retries_fails_on_first_conflict() {
    let memory = MemoryAccountRepository::new();
    let racing = Arc::new(RacingAccountRepository::new(memory.clone()));
    let h = Harness::with_store(memory, racing.clone(), 0);
    let account = h.account();
    racing.interfere_with(SubscriptionSnapshot {
        request_kind: Some(RequestKind::New),
        ..SubscriptionSnapshot::inactive()
    });

    // Cancelling an inactive account needs no write and never races
    let noop = h.engine.cancel(account).await.unwrap();
    assert!(!noop.changed);
    assert_eq!(racing.cas_calls(), 0);

    let err = h
        .engine
        .begin_checkout(account, &basic_plan(), false, "sub_A")
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::ConcurrentModification));
    assert_eq!(racing.cas_calls(), 1);
}
