//! PostgreSQL repository implementations

mod account;
mod plan;

pub use account::PgAccountRepository;
pub use plan::PgPlanRepository;

use crate::DbPool;

/// All repositories bundled together
#[derive(Clone)]
pub struct Repositories {
    pub accounts: PgAccountRepository,
    pub plans: PgPlanRepository,
}

impl Repositories {
    /// Create all repositories from a database pool
    pub fn new(pool: DbPool) -> Self {
        Self {
            accounts: PgAccountRepository::new(pool.clone()),
            plans: PgPlanRepository::new(pool),
        }
    }
}
