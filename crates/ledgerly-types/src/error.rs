//! Common error types

use thiserror::Error;

/// Errors raised when decoding stored or user-supplied values into domain types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Unknown subscription status
    #[error("invalid subscription status: {0}")]
    InvalidStatus(String),

    /// Unknown request kind
    #[error("invalid request kind: {0}")]
    InvalidRequestKind(String),

    /// Unknown duration unit
    #[error("invalid duration unit: {0}")]
    InvalidDurationUnit(String),
}
