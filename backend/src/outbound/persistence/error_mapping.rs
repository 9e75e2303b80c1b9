//! Classification of pool and Diesel failures into [`StoreError`].
//!
//! The two backends report unique violations differently. PostgreSQL names
//! the index in the error's constraint field. SQLite leaves that field empty
//! and lists the indexed columns in the message instead:
//! `UNIQUE constraint failed: devices.user_db_id, devices.legacy_device_id`.

use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use crate::domain::ports::{StoreError, UniqueIndex};

use super::pool::PoolError;

const SQLITE_UNIQUE_PREFIX: &str = "UNIQUE constraint failed:";

/// Map pool errors to connection errors.
pub(crate) fn map_pool_error(error: PoolError) -> StoreError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            StoreError::connection(message)
        }
    }
}

/// Map Diesel errors raised by PostgreSQL.
pub(crate) fn map_pg_diesel_error(error: DieselError) -> StoreError {
    map_diesel_error(error, |info| {
        info.constraint_name()
            .map_or(UniqueIndex::Unknown, UniqueIndex::from_index_name)
    })
}

/// Map Diesel errors raised by SQLite.
pub(crate) fn map_sqlite_diesel_error(error: DieselError) -> StoreError {
    map_diesel_error(error, |info| sqlite_unique_index(info.message()))
}

fn sqlite_unique_index(message: &str) -> UniqueIndex {
    message
        .strip_prefix(SQLITE_UNIQUE_PREFIX)
        .map_or(UniqueIndex::Unknown, |columns| {
            UniqueIndex::from_columns(columns.split(','))
        })
}

fn map_diesel_error<F>(error: DieselError, unique_index: F) -> StoreError
where
    F: FnOnce(&dyn DatabaseErrorInformation) -> UniqueIndex,
{
    let mapped = match error {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            StoreError::duplicate_key(unique_index(info.as_ref()))
        }
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            StoreError::connection("database connection error")
        }
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
            StoreError::query(format!("foreign key violation: {}", info.message()))
        }
        DieselError::NotFound => StoreError::query("record not found"),
        DieselError::QueryBuilderError(_) => StoreError::query("database query error"),
        DieselError::DatabaseError(_, info) => StoreError::query(info.message()),
        other => StoreError::query(other.to_string()),
    };
    debug!(kind = mapped.kind(), error = %mapped, "diesel operation failed");
    mapped
}
