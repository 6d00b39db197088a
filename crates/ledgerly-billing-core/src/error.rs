//! Billing errors

use ledgerly_types::SubscriptionStatus;
use thiserror::Error;

/// Billing errors
#[derive(Error, Debug)]
pub enum BillingError {
    /// Signature did not match the payload (forged, tampered or wrong secret)
    #[error("invalid signature")]
    InvalidSignature,

    /// Account ID or gateway subscription ID does not resolve to one account
    #[error("account not found")]
    AccountNotFound,

    /// Plan is not in the catalog
    #[error("plan not found")]
    PlanNotFound,

    /// Plan price is not positive
    #[error("invalid plan price")]
    InvalidPlanPrice,

    /// Plan duration is not positive
    #[error("invalid plan duration")]
    InvalidPlanDuration,

    /// The requested action is not allowed from the current status
    #[error("cannot {action} while subscription is {from}")]
    InvalidTransition {
        /// Status the account is in
        from: SubscriptionStatus,
        /// Attempted action
        action: &'static str,
    },

    /// A confirmed payment does not belong to the checkout on record
    #[error("payment does not match the recorded checkout ({field})")]
    CheckoutMismatch {
        /// Snapshot field that disagreed
        field: &'static str,
    },

    /// Signed webhook body that does not have the expected shape
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// Compare-and-swap kept losing to concurrent writers
    #[error("concurrent modification")]
    ConcurrentModification,

    /// Missing or invalid configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Payment gateway error
    #[error("provider error: {0}")]
    ProviderError(String),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] ledgerly_db::DbError),
}

impl BillingError {
    /// Errors caused by the request itself; retrying the same input fails again
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSignature
                | Self::AccountNotFound
                | Self::PlanNotFound
                | Self::InvalidPlanPrice
                | Self::InvalidPlanDuration
                | Self::InvalidTransition { .. }
                | Self::CheckoutMismatch { .. }
                | Self::MalformedEvent(_)
        )
    }

    /// Transient failures a later redelivery may get past
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConcurrentModification | Self::ProviderError(_) => true,
            Self::Database(e) => !e.is_conflict(),
            _ => false,
        }
    }
}

impl From<crate::crypto::SigningKeyError> for BillingError {
    fn from(err: crate::crypto::SigningKeyError) -> Self {
        Self::Configuration(err.to_string())
    }
}
