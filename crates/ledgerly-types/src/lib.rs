//! Ledgerly Types - Shared domain types
//!
//! This crate contains domain types used across Ledgerly services:
//! - Shop-owner account identity
//! - Plan catalog entries and plan durations
//! - Subscription snapshots and their lifecycle states

pub mod account;
pub mod error;
pub mod plan;
pub mod subscription;

pub use account::*;
pub use error::*;
pub use plan::*;
pub use subscription::*;
