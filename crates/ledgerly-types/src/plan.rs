//! Plan catalog types

use serde::{Deserialize, Serialize};

use crate::ParseError;

/// Catalog identifier of a plan (e.g. `basic-monthly`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(pub String);

impl PlanId {
    /// Create a plan ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unit of a plan duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Day,
    Week,
    Month,
    Year,
}

impl DurationUnit {
    /// Storage representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

impl std::fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DurationUnit {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "day" | "days" => Ok(Self::Day),
            "week" | "weeks" => Ok(Self::Week),
            "month" | "months" => Ok(Self::Month),
            "year" | "years" => Ok(Self::Year),
            _ => Err(ParseError::InvalidDurationUnit(s.to_string())),
        }
    }
}

/// Length of one paid term, e.g. 3 months
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanDuration {
    /// Number of units
    pub value: u32,
    /// Unit of `value`
    pub unit: DurationUnit,
}

impl PlanDuration {
    /// Create a duration
    pub const fn new(value: u32, unit: DurationUnit) -> Self {
        Self { value, unit }
    }

    /// Shorthand for a month-based duration
    pub const fn months(value: u32) -> Self {
        Self::new(value, DurationUnit::Month)
    }

    /// A zero-length term can never produce `end > start`
    pub const fn is_positive(&self) -> bool {
        self.value > 0
    }
}

impl std::fmt::Display for PlanDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

/// A purchasable subscription plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Catalog ID
    pub id: PlanId,
    /// Display name
    pub name: String,
    /// Price in minor currency units (paise)
    pub price: i64,
    /// Term length
    pub duration: PlanDuration,
    /// Mirrored plan ID at the payment gateway, if the plan is sold online
    pub gateway_plan_id: Option<String>,
    /// Whether the plan is offered to new purchases
    pub active: bool,
}
