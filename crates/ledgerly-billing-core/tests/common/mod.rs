//! Common test utilities for ledgerly-billing-core integration tests

#![allow(dead_code)]

pub mod fixtures;
pub mod mock_provider;
pub mod racing_repo;

#[allow(unused_imports)]
pub use fixtures::{
    basic_plan, checkout_snapshot, confirmation, t0, Harness, CONFIRM_SECRET, GATEWAY_KEY_ID,
    GATEWAY_KEY_SECRET, WEBHOOK_SECRET,
};
#[allow(unused_imports)]
pub use mock_provider::MockProvider;
#[allow(unused_imports)]
pub use racing_repo::RacingAccountRepository;
