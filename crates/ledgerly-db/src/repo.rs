//! Repository traits
//!
//! Define async repository interfaces for database operations.

use async_trait::async_trait;
use uuid::Uuid;

use ledgerly_types::SubscriptionSnapshot;

use crate::error::DbResult;
use crate::models::*;

/// Account repository trait
///
/// The subscription snapshot is only ever written through
/// [`AccountRepository::compare_and_swap_snapshot`].
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Find an account by ID
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<AccountRow>>;

    /// Find all accounts whose snapshot carries the gateway subscription ID.
    ///
    /// More than one row means the uniqueness invariant was broken; callers
    /// decide how to treat that.
    async fn find_by_external_subscription_id(
        &self,
        subscription_id: &str,
    ) -> DbResult<Vec<AccountRow>>;

    /// Find accounts in a given status, oldest update first
    async fn find_by_status(&self, status: &str, limit: i64) -> DbResult<Vec<AccountRow>>;

    /// Create a new account with an inactive snapshot
    async fn create(&self, account: CreateAccount) -> DbResult<AccountRow>;

    /// Write the snapshot only if the stored version still equals
    /// `expected_version`, bumping the version on success.
    ///
    /// Returns `Ok(false)` when another writer got there first.
    async fn compare_and_swap_snapshot(
        &self,
        id: Uuid,
        expected_version: i64,
        snapshot: &SubscriptionSnapshot,
    ) -> DbResult<bool>;

    /// Check store connectivity
    async fn ping(&self) -> DbResult<()>;
}

/// Create account input
#[derive(Debug, Clone)]
pub struct CreateAccount {
    pub id: Uuid,
    pub shop_name: String,
    pub email: String,
}

/// Plan catalog repository trait
#[async_trait]
pub trait PlanRepository: Send + Sync {
    /// Find a plan by catalog ID
    async fn find_by_id(&self, id: &str) -> DbResult<Option<PlanRow>>;

    /// List plans currently offered
    async fn list_active(&self) -> DbResult<Vec<PlanRow>>;
}
