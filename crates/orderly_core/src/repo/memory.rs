//! In-memory record and order stores for tests.
//!
//! Uses `Rc<RefCell<..>>` since the engine is single-owner; clones share
//! state so a test can keep a handle after moving a store into the engine.
//! Each store can be told to reject writes to exercise partial-failure paths.

use super::order_repo::OrderRepository;
use super::record_repo::RecordRepository;
use super::{StoreError, StoreResult};
use crate::model::item::{validate_text, CommittedId, ItemId, ItemRecord};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Clone, Default)]
pub struct MemoryRecordRepository {
    records: Rc<RefCell<HashMap<ItemId, String>>>,
    fail_writes: Rc<Cell<bool>>,
}

impl MemoryRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with `StoreError::Unavailable`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.fail_writes.get() {
            return Err(StoreError::Unavailable(
                "simulated record write failure".to_string(),
            ));
        }
        Ok(())
    }
}

impl RecordRepository for MemoryRecordRepository {
    fn get(&self, id: ItemId) -> StoreResult<Option<ItemRecord>> {
        Ok(self
            .records
            .borrow()
            .get(&id)
            .map(|text| ItemRecord::new(id, text.clone())))
    }

    fn put(&self, record: &ItemRecord) -> StoreResult<ItemId> {
        record.validate()?;
        self.check_writable()?;
        self.records
            .borrow_mut()
            .insert(record.id, record.text.clone());
        Ok(record.id)
    }

    fn update(&self, id: ItemId, text: &str) -> StoreResult<bool> {
        validate_text(text)?;
        self.check_writable()?;
        match self.records.borrow_mut().get_mut(&id) {
            Some(current) => {
                *current = text.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, id: ItemId) -> StoreResult<()> {
        self.check_writable()?;
        self.records.borrow_mut().remove(&id);
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        self.check_writable()?;
        self.records.borrow_mut().clear();
        Ok(())
    }

    fn list_ids(&self) -> StoreResult<Vec<ItemId>> {
        let records = self.records.borrow();
        let mut committed: Vec<CommittedId> =
            records.keys().filter_map(|id| id.committed()).collect();
        committed.sort_unstable();
        let mut ids: Vec<ItemId> = committed.into_iter().map(ItemId::Committed).collect();
        if records.contains_key(&ItemId::Draft) {
            ids.push(ItemId::Draft);
        }
        Ok(ids)
    }

    fn max_committed_id(&self) -> StoreResult<Option<CommittedId>> {
        Ok(self.records.borrow().keys().filter_map(|id| id.committed()).max())
    }
}

#[derive(Clone, Default)]
pub struct MemoryOrderRepository {
    order: Rc<RefCell<Option<Vec<CommittedId>>>>,
    fail_writes: Rc<Cell<bool>>,
    writes: Rc<Cell<usize>>,
}

impl MemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with `StoreError::Unavailable`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    /// Number of successful `put` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.fail_writes.get() {
            return Err(StoreError::Unavailable(
                "simulated order write failure".to_string(),
            ));
        }
        Ok(())
    }
}

impl OrderRepository for MemoryOrderRepository {
    fn get(&self) -> StoreResult<Option<Vec<CommittedId>>> {
        Ok(self.order.borrow().clone())
    }

    fn put(&self, order: &[CommittedId]) -> StoreResult<()> {
        self.check_writable()?;
        *self.order.borrow_mut() = Some(order.to_vec());
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        self.check_writable()?;
        *self.order.borrow_mut() = None;
        Ok(())
    }
}
