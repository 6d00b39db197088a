//! Database errors

use thiserror::Error;

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLx error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// A unique constraint rejected the write
    #[error("unique constraint violated: {0}")]
    Conflict(String),

    /// A stored value could not be decoded into its domain type
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<ledgerly_types::ParseError> for DbError {
    fn from(err: ledgerly_types::ParseError) -> Self {
        Self::Corrupt(err.to_string())
    }
}

impl DbError {
    /// Unique-constraint violation rather than a connectivity or query failure
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Turn a PostgreSQL unique violation into `Conflict`, naming the constraint
    pub(crate) fn from_write(err: sqlx::Error) -> Self {
        match err.as_database_error() {
            Some(db) if db.is_unique_violation() => {
                Self::Conflict(db.constraint().unwrap_or("unique").to_string())
            }
            _ => Self::Sqlx(err),
        }
    }
}

/// Result alias for repository operations
pub type DbResult<T> = Result<T, DbError>;
