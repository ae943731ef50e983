use sea_orm::{DbErr, TransactionError};

use crate::domain::error::DomainError;

/// Upper bound on values bound into one `IN (...)` list.
pub const MAX_IN_LIST: usize = 500;

impl From<DbErr> for DomainError {
    fn from(e: DbErr) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<TransactionError<DomainError>> for DomainError {
    fn from(e: TransactionError<DomainError>) -> Self {
        match e {
            TransactionError::Connection(e) => e.into(),
            TransactionError::Transaction(e) => e,
        }
    }
}
