//! Router wired to in-memory stores, a recording gateway and a fixed clock

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use billing_api::{build_router, AppState, Config};
use ledgerly_billing_core::{
    confirmation_payload, BillingError, BillingService, FixedClock, GatewaySubscription,
    PaymentProvider, SigningKey,
};
use ledgerly_db::{MemoryAccountRepository, MemoryPlanRepository};
use ledgerly_types::{
    AccountId, Plan, PlanDuration, PlanId, RequestKind, SubscriptionSnapshot, SubscriptionStatus,
};

pub const CONFIRM_SECRET: &str = "confirm-secret-2";
pub const WEBHOOK_SECRET: &str = "hook-secret-3";
pub const ADMIN_TOKEN: &str = "admin-token-4";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap()
}

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

pub fn test_config() -> Config {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("DATABASE_URL", "postgres://unused"),
        ("GATEWAY_KEY_ID", "rzp_test_key"),
        ("GATEWAY_KEY_SECRET", "gw-secret-1"),
        ("PAYMENT_CONFIRMATION_SECRET", CONFIRM_SECRET),
        ("PAYMENT_WEBHOOK_SECRET", WEBHOOK_SECRET),
        ("ADMIN_API_TOKEN", ADMIN_TOKEN),
        ("METRICS_ENABLED", "false"),
    ]);
    Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap()
}

/// Account that went through checkout and is waiting for the charge
pub fn pending_snapshot_for(subscription_id: &str) -> SubscriptionSnapshot {
    let mut snap = SubscriptionSnapshot::inactive();
    snap.status = SubscriptionStatus::PendingVerification;
    snap.copy_plan(&basic_plan());
    snap.external_subscription_id = Some(subscription_id.to_string());
    snap.request_kind = Some(RequestKind::New);
    snap
}

/// Signature the payment widget would hand back
pub fn confirm_signature(payment_id: &str, subscription_id: &str) -> String {
    SigningKey::new(CONFIRM_SECRET)
        .unwrap()
        .sign_hex(confirmation_payload(payment_id, subscription_id).as_bytes())
}

pub fn webhook_signature(body: &[u8]) -> String {
    SigningKey::new(WEBHOOK_SECRET).unwrap().sign_hex(body)
}

pub fn charged_event(subscription_id: &str, payment_id: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "event": "subscription.charged",
        "payload": {
            "subscription": {"entity": {"id": subscription_id, "status": "active"}},
            "payment": {"entity": {"id": payment_id, "amount": 49900}}
        }
    }))
    .unwrap()
}

/// Gateway double that hands out sequential subscription IDs
#[derive(Default)]
pub struct RecordingProvider {
    next_id: AtomicUsize,
    pub cancelled: Mutex<Vec<String>>,
}

#[async_trait]
impl PaymentProvider for RecordingProvider {
    async fn create_subscription(
        &self,
        _gateway_plan_id: &str,
        _account_id: AccountId,
        _total_count: u32,
    ) -> Result<GatewaySubscription, BillingError> {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(GatewaySubscription {
            id: format!("sub_test_{n}"),
            short_url: None,
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

pub struct TestApp {
    pub router: Router,
    pub accounts: MemoryAccountRepository,
    pub provider: Arc<RecordingProvider>,
    pub clock: Arc<FixedClock>,
}

impl TestApp {
    pub fn new() -> Self {
        let config = test_config();
        let accounts = MemoryAccountRepository::new();
        let plans = MemoryPlanRepository::new();
        plans.insert_plan(&basic_plan());
        let provider = Arc::new(RecordingProvider::default());
        let clock = Arc::new(FixedClock::new(t0()));

        let billing = BillingService::new(
            &config.billing,
            Arc::new(accounts.clone()),
            Arc::new(plans),
            provider.clone(),
            clock.clone(),
        )
        .unwrap();

        Self {
            router: build_router(AppState::new(billing, config), None),
            accounts,
            provider,
            clock,
        }
    }

    pub fn account_with(&self, snapshot: &SubscriptionSnapshot) -> AccountId {
        let id = Uuid::new_v4();
        let mut row =
            MemoryAccountRepository::new_account_row(id, "Corner Store", "owner@example.com");
        row.set_snapshot(snapshot);
        self.accounts.insert_account(row);
        AccountId(id)
    }

    pub fn account(&self) -> AccountId {
        self.account_with(&SubscriptionSnapshot::inactive())
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        self.send(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
    }

    pub async fn admin_post(
        &self,
        uri: &str,
        token: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        self.send(
            Request::post(uri)
                .header("content-type", "application/json")
                .header("x-admin-token", token)
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
    }

    pub async fn webhook(&self, body: Vec<u8>, signature: Option<&str>) -> StatusCode {
        let mut builder = Request::post("/webhooks/payments").header("content-type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header("x-razorpay-signature", signature);
        }
        self.send(builder.body(Body::from(body)).unwrap()).await.0
    }
}
