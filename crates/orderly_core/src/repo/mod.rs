//! Repository layer for the two persisted list facts.
//!
//! # Responsibility
//! - Define the record store (`RecordRepository`) and order store
//!   (`OrderRepository`) contracts used by the list engine.
//! - Keep SQL and serialization details behind those contracts.
//!
//! # Invariants
//! - Write paths validate item text before persistence.
//! - Read paths reject invalid persisted state instead of masking it.
//! - A missing key is a value (`None`/`false`), never an error.

use crate::db::schema::latest_version;
use crate::db::DbError;
use crate::model::item::ItemValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod kv_table;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod order_repo;
pub mod record_repo;

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage-level failure from either store.
#[derive(Debug)]
pub enum StoreError {
    Validation(ItemValidationError),
    Db(DbError),
    /// Order sequence could not be encoded or decoded as JSON.
    Encoding(serde_json::Error),
    /// Persisted data cannot be converted into a valid read model.
    InvalidData(String),
    /// Backend refused the operation (e.g. storage offline).
    Unavailable(String),
    /// Connection schema is not at the expected version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
}

impl StoreError {
    pub(crate) fn uninitialized(actual_version: u32) -> Self {
        Self::UninitializedConnection {
            expected_version: latest_version(),
            actual_version,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Encoding(err) => write!(f, "order sequence encoding error: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted list data: {message}"),
            Self::Unavailable(message) => write!(f, "storage unavailable: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "list store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "list store requires table `{table}`")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Encoding(err) => Some(err),
            Self::InvalidData(_)
            | Self::Unavailable(_)
            | Self::UninitializedConnection { .. }
            | Self::MissingRequiredTable(_) => None,
        }
    }
}

impl From<ItemValidationError> for StoreError {
    fn from(value: ItemValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encoding(value)
    }
}
