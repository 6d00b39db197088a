//! Ledgerly DB - Account store and plan catalog
//!
//! SQLx-based database layer for Ledgerly services, plus `DashMap`-backed
//! in-memory repositories with identical semantics for tests and local runs.
//!
//! # Example
//!
//! ```rust,ignore
//! use ledgerly_db::{create_pool, run_migrations, Repositories};
//!
//! let pool = create_pool("postgres://localhost/ledgerly").await?;
//! run_migrations(&pool).await?;
//! let repos = Repositories::new(pool);
//!
//! let account = repos.accounts.find_by_id(account_id).await?;
//! ```

pub mod error;
pub mod memory;
pub mod models;
pub mod pg;
pub mod pool;
pub mod repo;

pub use error::{DbError, DbResult};
pub use memory::{MemoryAccountRepository, MemoryPlanRepository};
pub use models::*;
pub use pg::Repositories;
pub use pool::{create_pool, create_pool_with_options, run_migrations, DbPool, PoolOptions};
pub use repo::*;
