//! Record store: item id to item text.
//!
//! # Responsibility
//! - Persist committed item records and the single draft record.
//! - Encode `ItemId` into the `records.id` text key.
//!
//! # Invariants
//! - Committed ids are stored as decimal text, the draft as `draft`.
//! - `update` on a missing id returns `false` and writes nothing.

use super::kv_table::{KvTable, TableSpec};
use super::{StoreError, StoreResult};
use crate::model::item::{validate_text, CommittedId, ItemId, ItemRecord};
use log::warn;
use rusqlite::Connection;

const DRAFT_KEY: &str = "draft";

static RECORDS_TABLE: TableSpec = TableSpec {
    table: "records",
    key_column: "id",
    value_column: "text",
};

/// Record store contract consumed by the list engine.
pub trait RecordRepository {
    /// Loads one record, `None` when absent.
    fn get(&self, id: ItemId) -> StoreResult<Option<ItemRecord>>;
    /// Inserts or overwrites a record and returns its id.
    fn put(&self, record: &ItemRecord) -> StoreResult<ItemId>;
    /// Replaces the text of an existing record; `false` when the id is absent.
    fn update(&self, id: ItemId, text: &str) -> StoreResult<bool>;
    /// Removes a record. Absence is not an error.
    fn delete(&self, id: ItemId) -> StoreResult<()>;
    /// Removes every record including the draft.
    fn clear(&self) -> StoreResult<()>;
    /// Lists ids of all stored records, committed ids ascending, draft last.
    fn list_ids(&self) -> StoreResult<Vec<ItemId>>;
    /// Largest committed id among keys that parse; unreadable keys are skipped.
    fn max_committed_id(&self) -> StoreResult<Option<CommittedId>>;
}

/// SQLite-backed record store.
pub struct SqliteRecordRepository<'conn> {
    table: KvTable<'conn>,
}

impl<'conn> SqliteRecordRepository<'conn> {
    /// Creates the store from a bootstrapped connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        Ok(Self {
            table: KvTable::try_new(conn, &RECORDS_TABLE)?,
        })
    }
}

impl RecordRepository for SqliteRecordRepository<'_> {
    fn get(&self, id: ItemId) -> StoreResult<Option<ItemRecord>> {
        match self.table.get(&item_id_to_db(id))? {
            Some(text) => {
                validate_text(&text).map_err(|err| {
                    StoreError::InvalidData(format!("record `{id}` in records.text: {err}"))
                })?;
                Ok(Some(ItemRecord { id, text }))
            }
            None => Ok(None),
        }
    }

    fn put(&self, record: &ItemRecord) -> StoreResult<ItemId> {
        record.validate()?;
        self.table
            .upsert(&item_id_to_db(record.id), record.text.as_str())?;
        Ok(record.id)
    }

    fn update(&self, id: ItemId, text: &str) -> StoreResult<bool> {
        validate_text(text)?;
        self.table.update(&item_id_to_db(id), text)
    }

    fn delete(&self, id: ItemId) -> StoreResult<()> {
        self.table.delete(&item_id_to_db(id))?;
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        self.table.clear()?;
        Ok(())
    }

    fn list_ids(&self) -> StoreResult<Vec<ItemId>> {
        let mut committed = Vec::new();
        let mut has_draft = false;
        for key in self.table.keys()? {
            match parse_item_id(&key) {
                Some(ItemId::Committed(id)) => committed.push(id),
                Some(ItemId::Draft) => has_draft = true,
                None => {
                    return Err(StoreError::InvalidData(format!(
                        "invalid item id `{key}` in records.id"
                    )));
                }
            }
        }
        // Text keys sort lexicographically; committed ids need numeric order.
        committed.sort_unstable();

        let mut ids: Vec<ItemId> = committed.into_iter().map(ItemId::Committed).collect();
        if has_draft {
            ids.push(ItemId::Draft);
        }
        Ok(ids)
    }

    fn max_committed_id(&self) -> StoreResult<Option<CommittedId>> {
        let mut max = None;
        for key in self.table.keys()? {
            match parse_item_id(&key) {
                Some(ItemId::Committed(id)) => max = max.max(Some(id)),
                Some(ItemId::Draft) => {}
                None => warn!(
                    "event=record_scan module=repo status=warn reason=invalid_key key_chars={}",
                    key.chars().count()
                ),
            }
        }
        Ok(max)
    }
}

fn item_id_to_db(id: ItemId) -> String {
    match id {
        ItemId::Committed(id) => id.get().to_string(),
        ItemId::Draft => DRAFT_KEY.to_string(),
    }
}

fn parse_item_id(value: &str) -> Option<ItemId> {
    if value == DRAFT_KEY {
        return Some(ItemId::Draft);
    }
    value
        .parse::<i64>()
        .ok()
        .and_then(CommittedId::new)
        .map(ItemId::Committed)
}

#[cfg(test)]
mod tests {
    use super::{item_id_to_db, parse_item_id};
    use crate::model::item::{CommittedId, ItemId};

    #[test]
    fn item_id_keys_round_trip() {
        let committed = ItemId::Committed(CommittedId::new(1_700_000_000_000).unwrap());
        assert_eq!(item_id_to_db(committed), "1700000000000");
        assert_eq!(parse_item_id("1700000000000"), Some(committed));
        assert_eq!(parse_item_id("draft"), Some(ItemId::Draft));
    }

    #[test]
    fn parse_item_id_rejects_garbage_and_non_positive() {
        assert_eq!(parse_item_id("inputAreaItemId"), None);
        assert_eq!(parse_item_id("0"), None);
        assert_eq!(parse_item_id("-3"), None);
    }
}
