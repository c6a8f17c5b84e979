//! Order store: the single persisted display order.
//!
//! # Responsibility
//! - Persist the whole order sequence under one well-known key.
//! - Serialize the sequence as a JSON array of committed ids.
//!
//! # Invariants
//! - The sequence is always replaced wholesale, never patched.
//! - The draft id can not be represented in a stored sequence.

use super::kv_table::{KvTable, TableSpec};
use super::{StoreError, StoreResult};
use crate::model::item::CommittedId;
use rusqlite::Connection;

/// Key of the singleton row holding the current order.
pub const ORDER_SLOT_KEY: &str = "sortedList";

static ORDER_TABLE: TableSpec = TableSpec {
    table: "item_order",
    key_column: "id",
    value_column: "sorted_list",
};

/// Order store contract consumed by the list engine.
pub trait OrderRepository {
    /// Loads the current order. `None` only before the first write.
    ///
    /// A stored value that is not an array of positive integers is
    /// `StoreError::InvalidData`.
    fn get(&self) -> StoreResult<Option<Vec<CommittedId>>>;
    /// Replaces the current order.
    fn put(&self, order: &[CommittedId]) -> StoreResult<()>;
    /// Removes the stored order.
    fn clear(&self) -> StoreResult<()>;
}

/// SQLite-backed order store.
pub struct SqliteOrderRepository<'conn> {
    table: KvTable<'conn>,
}

impl<'conn> SqliteOrderRepository<'conn> {
    /// Creates the store from a bootstrapped connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        Ok(Self {
            table: KvTable::try_new(conn, &ORDER_TABLE)?,
        })
    }
}

impl OrderRepository for SqliteOrderRepository<'_> {
    fn get(&self) -> StoreResult<Option<Vec<CommittedId>>> {
        match self.table.get(ORDER_SLOT_KEY)? {
            Some(json) => serde_json::from_str(&json).map(Some).map_err(|err| {
                StoreError::InvalidData(format!("order sequence in item_order.sorted_list: {err}"))
            }),
            None => Ok(None),
        }
    }

    fn put(&self, order: &[CommittedId]) -> StoreResult<()> {
        let json = serde_json::to_string(order)?;
        self.table.upsert(ORDER_SLOT_KEY, &json)
    }

    fn clear(&self) -> StoreResult<()> {
        self.table.clear()?;
        Ok(())
    }
}
