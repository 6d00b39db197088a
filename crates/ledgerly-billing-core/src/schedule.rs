//! Term window computation
//!
//! Decides where a paid term starts and ends. Renewals of a term that is
//! still running extend from its current end; everything else starts now.

use chrono::{DateTime, Duration, Months, Utc};

use ledgerly_types::{DurationUnit, PlanDuration};

/// Start and end of one paid term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Add a plan duration using calendar arithmetic.
///
/// Months and years clamp to the end of shorter months
/// (Jan 31 + 1 month = Feb 28/29). Returns `None` on overflow.
pub fn add_duration(start: DateTime<Utc>, duration: PlanDuration) -> Option<DateTime<Utc>> {
    match duration.unit {
        DurationUnit::Day => start.checked_add_signed(Duration::try_days(i64::from(duration.value))?),
        DurationUnit::Week => {
            start.checked_add_signed(Duration::try_weeks(i64::from(duration.value))?)
        }
        DurationUnit::Month => start.checked_add_months(Months::new(duration.value)),
        DurationUnit::Year => {
            start.checked_add_months(Months::new(duration.value.checked_mul(12)?))
        }
    }
}

/// Compute the window for a confirmed payment.
///
/// `current_end` is the stored end date, if any. Returns `None` for a
/// non-positive duration or on overflow.
pub fn compute_window(
    now: DateTime<Utc>,
    current_end: Option<DateTime<Utc>>,
    renewal: bool,
    duration: PlanDuration,
) -> Option<TermWindow> {
    if !duration.is_positive() {
        return None;
    }

    let current_end = current_end.unwrap_or(now);
    let start = if renewal && current_end > now {
        current_end
    } else {
        now
    };
    let end = add_duration(start, duration)?;

    Some(TermWindow { start, end })
}
