//! Account store that simulates concurrent writers

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use ledgerly_db::{
    AccountRepository, AccountRow, CreateAccount, DbResult, MemoryAccountRepository,
};
use ledgerly_types::SubscriptionSnapshot;

/// Wraps the in-memory store and lands another writer's update right
/// before the caller's compare-and-swap
pub struct RacingAccountRepository {
    inner: MemoryAccountRepository,
    interfering: Mutex<VecDeque<SubscriptionSnapshot>>,
    always_conflict: AtomicBool,
    cas_calls: AtomicUsize,
}

#[allow(dead_code)]
impl RacingAccountRepository {
    pub fn new(inner: MemoryAccountRepository) -> Self {
        Self {
            inner,
            interfering: Mutex::new(VecDeque::new()),
            always_conflict: AtomicBool::new(false),
            cas_calls: AtomicUsize::new(0),
        }
    }

    /// Queue a write that wins the race against the next CAS
    pub fn interfere_with(&self, snapshot: SubscriptionSnapshot) {
        self.interfering.lock().unwrap().push_back(snapshot);
    }

    /// Every CAS loses to a version bump
    pub fn conflict_forever(&self) {
        self.always_conflict.store(true, Ordering::SeqCst);
    }

    pub fn cas_calls(&self) -> usize {
        self.cas_calls.load(Ordering::SeqCst)
    }

    async fn write_current(&self, id: Uuid, snapshot: &SubscriptionSnapshot) -> DbResult<()> {
        let version = self.inner.version_of(id).unwrap_or_default();
        self.inner
            .compare_and_swap_snapshot(id, version, snapshot)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for RacingAccountRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<AccountRow>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_external_subscription_id(
        &self,
        subscription_id: &str,
    ) -> DbResult<Vec<AccountRow>> {
        self.inner
            .find_by_external_subscription_id(subscription_id)
            .await
    }

    async fn find_by_status(&self, status: &str, limit: i64) -> DbResult<Vec<AccountRow>> {
        self.inner.find_by_status(status, limit).await
    }

    async fn create(&self, account: CreateAccount) -> DbResult<AccountRow> {
        self.inner.create(account).await
    }

    async fn compare_and_swap_snapshot(
        &self,
        id: Uuid,
        expected_version: i64,
        snapshot: &SubscriptionSnapshot,
    ) -> DbResult<bool> {
        self.cas_calls.fetch_add(1, Ordering::SeqCst);

        let interfering = self.interfering.lock().unwrap().pop_front();
        if let Some(other) = interfering {
            self.write_current(id, &other).await?;
        } else if self.always_conflict.load(Ordering::SeqCst) {
            if let Some(row) = self.inner.find_by_id(id).await? {
                self.write_current(id, &row.snapshot()?).await?;
            }
        }

        self.inner
            .compare_and_swap_snapshot(id, expected_version, snapshot)
            .await
    }

    async fn ping(&self) -> DbResult<()> {
        self.inner.ping().await
    }
}
