//! Database row models
//!
//! These types map directly to database rows using SQLx's FromRow derive.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use ledgerly_types::{
    AccountId, Plan, PlanDuration, PlanId, RequestKind, SubscriptionSnapshot, SubscriptionStatus,
};

use crate::error::{DbError, DbResult};

/// Account row from the database
#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    pub id: Uuid,
    pub shop_name: String,
    pub email: String,
    pub status: String,
    pub plan_id: Option<String>,
    pub plan_name: Option<String>,
    pub plan_price: Option<i64>,
    pub plan_duration_value: Option<i32>,
    pub plan_duration_unit: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub external_payment_id: Option<String>,
    pub external_subscription_id: Option<String>,
    pub request_kind: String,
    pub rejection_reason: Option<String>,
    pub utr: Option<String>,
    pub applied_payment_ids: Vec<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Plan row from the database
#[derive(Debug, Clone, FromRow)]
pub struct PlanRow {
    pub id: String,
    pub name: String,
    pub price: i64,
    pub duration_value: i32,
    pub duration_unit: String,
    pub gateway_plan_id: Option<String>,
    pub active: bool,
}

impl AccountRow {
    /// Convert to domain AccountId
    pub fn account_id(&self) -> AccountId {
        AccountId(self.id)
    }

    /// Decode the flat snapshot columns
    pub fn snapshot(&self) -> DbResult<SubscriptionSnapshot> {
        let plan_duration = match (self.plan_duration_value, &self.plan_duration_unit) {
            (Some(value), Some(unit)) => Some(decode_duration(value, unit)?),
            (None, None) => None,
            _ => {
                return Err(DbError::Corrupt(format!(
                    "account {}: partial plan duration",
                    self.id
                )))
            }
        };

        Ok(SubscriptionSnapshot {
            status: self.status.parse::<SubscriptionStatus>()?,
            plan_id: self.plan_id.clone().map(PlanId),
            plan_name: self.plan_name.clone(),
            plan_price: self.plan_price,
            plan_duration,
            start_date: self.start_date,
            end_date: self.end_date,
            external_payment_id: self.external_payment_id.clone(),
            external_subscription_id: self.external_subscription_id.clone(),
            request_kind: RequestKind::from_stored(&self.request_kind)?,
            rejection_reason: self.rejection_reason.clone(),
            utr: self.utr.clone(),
            applied_payment_ids: self.applied_payment_ids.clone(),
        })
    }

    /// Overwrite the snapshot columns, leaving identity and version alone
    pub fn set_snapshot(&mut self, snapshot: &SubscriptionSnapshot) {
        self.status = snapshot.status.as_str().to_string();
        self.plan_id = snapshot.plan_id.as_ref().map(|p| p.0.clone());
        self.plan_name = snapshot.plan_name.clone();
        self.plan_price = snapshot.plan_price;
        self.plan_duration_value = snapshot.plan_duration.map(|d| duration_value(&d));
        self.plan_duration_unit = snapshot.plan_duration.map(|d| d.unit.as_str().to_string());
        self.start_date = snapshot.start_date;
        self.end_date = snapshot.end_date;
        self.external_payment_id = snapshot.external_payment_id.clone();
        self.external_subscription_id = snapshot.external_subscription_id.clone();
        self.request_kind = RequestKind::to_stored(snapshot.request_kind).to_string();
        self.rejection_reason = snapshot.rejection_reason.clone();
        self.utr = snapshot.utr.clone();
        self.applied_payment_ids = snapshot.applied_payment_ids.clone();
    }
}

impl PlanRow {
    /// Convert to the domain plan
    pub fn to_plan(&self) -> DbResult<Plan> {
        Ok(Plan {
            id: PlanId(self.id.clone()),
            name: self.name.clone(),
            price: self.price,
            duration: decode_duration(self.duration_value, &self.duration_unit)?,
            gateway_plan_id: self.gateway_plan_id.clone(),
            active: self.active,
        })
    }

    /// Build a row from a domain plan
    pub fn from_plan(plan: &Plan) -> Self {
        Self {
            id: plan.id.0.clone(),
            name: plan.name.clone(),
            price: plan.price,
            duration_value: duration_value(&plan.duration),
            duration_unit: plan.duration.unit.as_str().to_string(),
            gateway_plan_id: plan.gateway_plan_id.clone(),
            active: plan.active,
        }
    }
}

/// Duration value as stored (INTEGER column)
pub(crate) fn duration_value(duration: &PlanDuration) -> i32 {
    i32::try_from(duration.value).unwrap_or(i32::MAX)
}

fn decode_duration(value: i32, unit: &str) -> DbResult<PlanDuration> {
    let value = u32::try_from(value)
        .map_err(|_| DbError::Corrupt(format!("negative duration value: {value}")))?;
    Ok(PlanDuration::new(value, unit.parse()?))
}
