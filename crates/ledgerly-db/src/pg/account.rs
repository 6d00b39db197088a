//! PostgreSQL account repository implementation

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use ledgerly_types::{RequestKind, SubscriptionSnapshot};

use crate::error::{DbError, DbResult};
use crate::models::{duration_value, AccountRow};
use crate::repo::{AccountRepository, CreateAccount};

const ACCOUNT_COLUMNS: &str = r#"
    id, shop_name, email, status, plan_id, plan_name, plan_price,
    plan_duration_value, plan_duration_unit, start_date, end_date,
    external_payment_id, external_subscription_id, request_kind,
    rejection_reason, utr, applied_payment_ids, version, created_at, updated_at
"#;

/// PostgreSQL account repository
#[derive(Clone)]
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    /// Create a new account repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<AccountRow>> {
        let account = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn find_by_external_subscription_id(
        &self,
        subscription_id: &str,
    ) -> DbResult<Vec<AccountRow>> {
        // LIMIT 2 is enough to tell "exactly one" from "ambiguous"
        let accounts = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE external_subscription_id = $1 LIMIT 2"
        ))
        .bind(subscription_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(accounts)
    }

    async fn find_by_status(&self, status: &str, limit: i64) -> DbResult<Vec<AccountRow>> {
        let accounts = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE status = $1 ORDER BY updated_at ASC LIMIT $2"
        ))
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(accounts)
    }

    async fn create(&self, account: CreateAccount) -> DbResult<AccountRow> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            INSERT INTO accounts (id, shop_name, email)
            VALUES ($1, $2, $3)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(account.id)
        .bind(&account.shop_name)
        .bind(&account.email)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from_write)?;

        Ok(row)
    }

    async fn compare_and_swap_snapshot(
        &self,
        id: Uuid,
        expected_version: i64,
        snapshot: &SubscriptionSnapshot,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET status = $3,
                plan_id = $4,
                plan_name = $5,
                plan_price = $6,
                plan_duration_value = $7,
                plan_duration_unit = $8,
                start_date = $9,
                end_date = $10,
                external_payment_id = $11,
                external_subscription_id = $12,
                request_kind = $13,
                rejection_reason = $14,
                utr = $15,
                applied_payment_ids = $16,
                version = version + 1,
                updated_at = NOW()
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(snapshot.status.as_str())
        .bind(snapshot.plan_id.as_ref().map(|p| p.as_str()))
        .bind(&snapshot.plan_name)
        .bind(snapshot.plan_price)
        .bind(snapshot.plan_duration.map(|d| duration_value(&d)))
        .bind(snapshot.plan_duration.map(|d| d.unit.as_str()))
        .bind(snapshot.start_date)
        .bind(snapshot.end_date)
        .bind(&snapshot.external_payment_id)
        .bind(&snapshot.external_subscription_id)
        .bind(RequestKind::to_stored(snapshot.request_kind))
        .bind(&snapshot.rejection_reason)
        .bind(&snapshot.utr)
        .bind(snapshot.applied_payment_ids.as_slice())
        .execute(&self.pool)
        .await
        .map_err(DbError::from_write)?;

        Ok(result.rows_affected() == 1)
    }

    async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
