//! Subscription types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ParseError, Plan, PlanDuration, PlanId};

/// Subscription status as stored on the account
///
/// Expiry is not a stored state: an `Active` snapshot whose `end_date` has
/// passed is "active-but-expired" and must be detected by readers with
/// [`SubscriptionSnapshot::is_expired`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// No paid term (new account, or cancelled)
    Inactive,
    /// Payment submitted, waiting for gateway confirmation or manual review
    PendingVerification,
    /// Paid term recorded
    Active,
    /// Manual payment was rejected by review
    Rejected,
}

impl SubscriptionStatus {
    /// Storage representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::PendingVerification => "pending_verification",
            Self::Active => "active",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inactive" => Ok(Self::Inactive),
            "pending_verification" => Ok(Self::PendingVerification),
            "active" => Ok(Self::Active),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ParseError::InvalidStatus(s.to_string())),
        }
    }
}

/// What the pending payment is meant to buy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    /// First-time purchase
    New,
    /// Extension of an already purchased term
    Renew,
}

impl RequestKind {
    /// Map the renewal flag carried by requests
    pub const fn from_renewal(renewal: bool) -> Self {
        if renewal {
            Self::Renew
        } else {
            Self::New
        }
    }

    /// Storage representation; the cleared state is stored as `""`
    pub const fn to_stored(kind: Option<Self>) -> &'static str {
        match kind {
            Some(Self::New) => "New",
            Some(Self::Renew) => "Renew",
            None => "",
        }
    }

    /// Decode the storage representation
    pub fn from_stored(s: &str) -> Result<Option<Self>, ParseError> {
        match s {
            "" => Ok(None),
            "New" => Ok(Some(Self::New)),
            "Renew" => Ok(Some(Self::Renew)),
            _ => Err(ParseError::InvalidRequestKind(s.to_string())),
        }
    }
}

/// The single record capturing an account's current subscription state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionSnapshot {
    pub status: SubscriptionStatus,
    /// Catalog plan the pending or current term was bought with
    pub plan_id: Option<PlanId>,
    pub plan_name: Option<String>,
    /// Price in minor currency units, copied at activation
    pub plan_price: Option<i64>,
    pub plan_duration: Option<PlanDuration>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub external_payment_id: Option<String>,
    /// Gateway subscription ID, unique across accounts
    pub external_subscription_id: Option<String>,
    pub request_kind: Option<RequestKind>,
    pub rejection_reason: Option<String>,
    /// Bank reference of a manual payment
    pub utr: Option<String>,
    /// Every gateway payment ID that has bought a term on this account
    #[serde(default)]
    pub applied_payment_ids: Vec<String>,
}

impl SubscriptionSnapshot {
    /// Snapshot of a freshly created account
    pub fn inactive() -> Self {
        Self {
            status: SubscriptionStatus::Inactive,
            plan_id: None,
            plan_name: None,
            plan_price: None,
            plan_duration: None,
            start_date: None,
            end_date: None,
            external_payment_id: None,
            external_subscription_id: None,
            request_kind: None,
            rejection_reason: None,
            utr: None,
            applied_payment_ids: Vec::new(),
        }
    }

    /// Copy the plan fields onto the snapshot
    pub fn copy_plan(&mut self, plan: &Plan) {
        self.plan_id = Some(plan.id.clone());
        self.plan_name = Some(plan.name.clone());
        self.plan_price = Some(plan.price);
        self.plan_duration = Some(plan.duration);
    }

    /// Stored as active but the paid term has run out
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && self.end_date.map_or(true, |end| end <= now)
    }

    /// Active with a term that has not yet ended
    pub fn is_entitled(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && self.end_date.is_some_and(|end| end > now)
    }
}

impl Default for SubscriptionSnapshot {
    fn default() -> Self {
        Self::inactive()
    }
}
