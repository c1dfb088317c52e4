//! Database repository implementations
//!
//! Per-aggregate SeaORM repositories + unified RepositoryProvider.
//! Multi-row writes run inside one transaction and guard every row they
//! revise with a version or status predicate; zero affected rows means a
//! concurrent writer got there first.

pub mod parking_lot_repository;
pub mod repository_provider;
pub mod reservation_repository;
pub mod space_repository;

pub use repository_provider::SeaOrmRepositoryProvider;

use sea_orm::{DbErr, SqlErr};
use uuid::Uuid;

use crate::domain::DomainError;

/// Lost connections and pool exhaustion surface as `Storage` so the
/// services retry them; everything else is a bug or a schema problem.
pub(crate) fn db_err(e: DbErr) -> DomainError {
    match e {
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => {
            DomainError::Storage(format!("Database unavailable: {}", e))
        }
        other => DomainError::Internal(format!("Database error: {}", other)),
    }
}

pub(crate) fn is_unique_violation(e: &DbErr) -> bool {
    matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

pub(crate) fn stale(what: &str, id: Uuid) -> DomainError {
    DomainError::Busy(format!("{} {} was modified concurrently", what, id))
}

fn corrupt(what: &str, id: Uuid, e: impl std::fmt::Display) -> DomainError {
    DomainError::Internal(format!("Stored {} {} is unreadable: {}", what, id, e))
}
