//! In-memory repositories
//!
//! `DashMap`-backed implementations of the repository traits with the same
//! compare-and-swap semantics as PostgreSQL. Used by tests and local runs
//! without a database.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use ledgerly_types::{Plan, SubscriptionSnapshot};

use crate::error::{DbError, DbResult};
use crate::models::{AccountRow, PlanRow};
use crate::repo::{AccountRepository, CreateAccount, PlanRepository};

// Constraint names as PostgreSQL reports them for the accounts table
const EMAIL_KEY: &str = "accounts_email_key";
const SUBSCRIPTION_KEY: &str = "accounts_external_subscription_id_key";

/// In-memory account repository
#[derive(Default, Clone)]
pub struct MemoryAccountRepository {
    accounts: Arc<DashMap<Uuid, AccountRow>>,
}

impl MemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a row directly, bypassing version checks
    pub fn insert_account(&self, account: AccountRow) {
        self.accounts.insert(account.id, account);
    }

    /// Build a fresh inactive account row
    pub fn new_account_row(id: Uuid, shop_name: &str, email: &str) -> AccountRow {
        let now = Utc::now();
        let mut row = AccountRow {
            id,
            shop_name: shop_name.to_string(),
            email: email.to_string(),
            status: String::new(),
            plan_id: None,
            plan_name: None,
            plan_price: None,
            plan_duration_value: None,
            plan_duration_unit: None,
            start_date: None,
            end_date: None,
            external_payment_id: None,
            external_subscription_id: None,
            request_kind: String::new(),
            rejection_reason: None,
            utr: None,
            applied_payment_ids: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        };
        row.set_snapshot(&SubscriptionSnapshot::inactive());
        row
    }

    /// Current stored version of an account
    pub fn version_of(&self, id: Uuid) -> Option<i64> {
        self.accounts.get(&id).map(|r| r.version)
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<AccountRow>> {
        Ok(self.accounts.get(&id).map(|r| r.value().clone()))
    }

    async fn find_by_external_subscription_id(
        &self,
        subscription_id: &str,
    ) -> DbResult<Vec<AccountRow>> {
        Ok(self
            .accounts
            .iter()
            .filter(|r| r.external_subscription_id.as_deref() == Some(subscription_id))
            .map(|r| r.value().clone())
            .collect())
    }

    async fn find_by_status(&self, status: &str, limit: i64) -> DbResult<Vec<AccountRow>> {
        let mut rows: Vec<AccountRow> = self
            .accounts
            .iter()
            .filter(|r| r.status == status)
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by_key(|r| r.updated_at);
        rows.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(rows)
    }

    async fn create(&self, account: CreateAccount) -> DbResult<AccountRow> {
        if self.accounts.iter().any(|r| r.email == account.email) {
            return Err(DbError::Conflict(EMAIL_KEY.to_string()));
        }
        let row = Self::new_account_row(account.id, &account.shop_name, &account.email);
        self.insert_account(row.clone());
        Ok(row)
    }

    async fn compare_and_swap_snapshot(
        &self,
        id: Uuid,
        expected_version: i64,
        snapshot: &SubscriptionSnapshot,
    ) -> DbResult<bool> {
        if let Some(subscription_id) = snapshot.external_subscription_id.as_deref() {
            // Checked before taking the entry guard; iterating under it can deadlock
            let taken = self.accounts.iter().any(|r| {
                r.id != id && r.external_subscription_id.as_deref() == Some(subscription_id)
            });
            if taken {
                return Err(DbError::Conflict(SUBSCRIPTION_KEY.to_string()));
            }
        }

        // The entry guard holds the shard lock for the check and the write
        let Some(mut row) = self.accounts.get_mut(&id) else {
            return Ok(false);
        };
        if row.version != expected_version {
            return Ok(false);
        }
        row.set_snapshot(snapshot);
        row.version += 1;
        row.updated_at = Utc::now();
        Ok(true)
    }

    async fn ping(&self) -> DbResult<()> {
        Ok(())
    }
}

/// In-memory plan catalog
#[derive(Default, Clone)]
pub struct MemoryPlanRepository {
    plans: Arc<DashMap<String, PlanRow>>,
}

impl MemoryPlanRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a plan
    pub fn insert_plan(&self, plan: &Plan) {
        self.plans.insert(plan.id.0.clone(), PlanRow::from_plan(plan));
    }
}

#[async_trait]
impl PlanRepository for MemoryPlanRepository {
    async fn find_by_id(&self, id: &str) -> DbResult<Option<PlanRow>> {
        Ok(self.plans.get(id).map(|r| r.value().clone()))
    }

    async fn list_active(&self) -> DbResult<Vec<PlanRow>> {
        let mut plans: Vec<PlanRow> = self
            .plans
            .iter()
            .filter(|r| r.active)
            .map(|r| r.value().clone())
            .collect();
        plans.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| a.id.cmp(&b.id)));
        Ok(plans)
    }
}
