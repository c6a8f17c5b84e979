//! Ordered list engine.
//!
//! # Responsibility
//! - Be the only writer of both the record store and the order store.
//! - Turn view intents (create/edit/delete/reorder/clear) into store writes.
//! - Resolve the persisted order into the view model returned by `load`.
//!
//! # Invariants
//! - After every successful structural operation, the set of ids in the
//!   order sequence equals the set of committed record ids.
//! - Text validation happens before any store is touched.
//! - The order sequence is always written as a full replacement.
//! - Editing the draft never allocates a committed id.

use crate::model::item::{validate_text, CommittedId, ItemId, ItemRecord, ItemValidationError};
use crate::repo::order_repo::OrderRepository;
use crate::repo::record_repo::RecordRepository;
use crate::repo::StoreError;
use crate::service::id_alloc::IdAllocator;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced to engine callers.
#[derive(Debug)]
pub enum EngineError {
    /// Item text failed validation; nothing was written.
    Validation(ItemValidationError),
    /// A store read or write failed.
    Storage(StoreError),
    /// Every committed id has been handed out.
    IdSpaceExhausted,
    /// The engine worker is not running anymore.
    WorkerUnavailable,
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::IdSpaceExhausted => write!(f, "no committed item ids left to allocate"),
            Self::WorkerUnavailable => write!(f, "list engine worker is not running"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::IdSpaceExhausted | Self::WorkerUnavailable => None,
        }
    }
}

impl From<ItemValidationError> for EngineError {
    fn from(value: ItemValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Validation(err) => Self::Validation(err),
            other => Self::Storage(other),
        }
    }
}

/// What to do when an edit targets a committed id that no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingEditPolicy {
    /// Drop the edit and log it.
    #[default]
    Discard,
    /// Store the text as a new item under a fresh id, appended to the order.
    Reinsert,
}

/// Result of `ListEngine::edit_item`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// Existing committed record text replaced.
    Updated,
    /// Draft text stored.
    DraftSaved,
    /// Target was missing; text stored as a new item.
    Reinserted(ItemRecord),
    /// Target was missing; nothing written.
    Skipped,
}

/// View model returned by `load`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSnapshot {
    /// Committed items in display order.
    pub items: Vec<ItemRecord>,
    /// Draft text, empty when there is no draft.
    pub draft: String,
}

impl ListSnapshot {
    /// Committed ids in display order.
    pub fn ids(&self) -> Vec<CommittedId> {
        self.items
            .iter()
            .filter_map(|record| record.id.committed())
            .collect()
    }

    /// Item texts in display order.
    pub fn texts(&self) -> Vec<&str> {
        self.items.iter().map(|record| record.text.as_str()).collect()
    }
}

/// Drift between the order sequence and the record store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    /// Ids listed in the order without a stored record.
    pub dangling_ids: Vec<CommittedId>,
    /// Committed records missing from the order, ascending.
    pub orphan_ids: Vec<CommittedId>,
    /// Ids listed in the order more than once.
    pub duplicate_ids: Vec<CommittedId>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.dangling_ids.is_empty() && self.orphan_ids.is_empty() && self.duplicate_ids.is_empty()
    }
}

/// Engine coordinating the record store and the order store.
pub struct ListEngine<R: RecordRepository, O: OrderRepository> {
    records: R,
    orders: O,
    ids: IdAllocator,
    missing_edit_policy: MissingEditPolicy,
}

impl<R: RecordRepository, O: OrderRepository> ListEngine<R, O> {
    /// Creates an engine over both stores.
    ///
    /// Reads both stores once to seed id allocation past every stored id.
    /// Unreadable record keys and an undecodable order are left out of the
    /// seed so `clear_all` and `repair` stay reachable over damaged data.
    pub fn new(records: R, orders: O) -> EngineResult<Self> {
        let max_record = records.max_committed_id()?;
        let max_ordered = match orders.get() {
            Ok(order) => order.unwrap_or_default().into_iter().max(),
            Err(StoreError::InvalidData(reason)) => {
                warn!(
                    "event=engine_seed module=engine status=warn reason=invalid_order error={reason}"
                );
                None
            }
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            records,
            orders,
            ids: IdAllocator::seeded(max_record.max(max_ordered)),
            missing_edit_policy: MissingEditPolicy::default(),
        })
    }

    /// Sets how edits to vanished items are handled.
    pub fn with_missing_edit_policy(mut self, policy: MissingEditPolicy) -> Self {
        self.missing_edit_policy = policy;
        self
    }

    pub fn records(&self) -> &R {
        &self.records
    }

    pub fn orders(&self) -> &O {
        &self.orders
    }

    /// Loads committed items in display order plus the draft text.
    ///
    /// Order entries without a stored record are skipped with a warning.
    pub fn load(&self) -> EngineResult<ListSnapshot> {
        let started_at = Instant::now();
        let result = self.load_snapshot();
        if let Ok(snapshot) = &result {
            info!(
                "event=list_load module=engine status=ok items={} has_draft={}",
                snapshot.items.len(),
                !snapshot.draft.is_empty()
            );
        }
        logged("list_load", started_at, result)
    }

    /// Commits new item text as the last item and clears the draft.
    pub fn create_item(&mut self, text: &str) -> EngineResult<ItemRecord> {
        let started_at = Instant::now();
        let result = self.insert_committed(text).and_then(|record| {
            self.records.delete(ItemId::Draft)?;
            Ok(record)
        });
        if let Ok(record) = &result {
            info!("event=item_create module=engine status=ok item_id={}", record.id);
        }
        logged("item_create", started_at, result)
    }

    /// Replaces item text, or stores draft text for `ItemId::Draft`.
    ///
    /// Never changes the order sequence unless a vanished item is reinserted
    /// under `MissingEditPolicy::Reinsert`.
    pub fn edit_item(&mut self, id: ItemId, text: &str) -> EngineResult<EditOutcome> {
        let started_at = Instant::now();
        let result = self.apply_edit(id, text);
        logged("item_edit", started_at, result)
    }

    /// Removes one item and persists the caller's current visual order.
    ///
    /// `visual_order` is the on-screen order after the removal; `id` is
    /// filtered out of it in case the caller still listed it.
    pub fn delete_item(&mut self, id: ItemId, visual_order: &[CommittedId]) -> EngineResult<()> {
        let started_at = Instant::now();
        let result = self.remove_and_reorder(id, visual_order);
        if let Ok(order_len) = &result {
            info!("event=item_delete module=engine status=ok item_id={id} order_len={order_len}");
        }
        logged("item_delete", started_at, result).map(|_| ())
    }

    /// Persists `visual_order` verbatim as the new order sequence.
    pub fn reorder(&mut self, visual_order: &[CommittedId]) -> EngineResult<()> {
        let started_at = Instant::now();
        let result = self.orders.put(visual_order).map_err(EngineError::from);
        logged("list_reorder", started_at, result)
    }

    /// Wipes both stores, including the draft.
    pub fn clear_all(&mut self) -> EngineResult<()> {
        let started_at = Instant::now();
        let result = self
            .records
            .clear()
            .and_then(|()| self.orders.clear())
            .map_err(EngineError::from);
        if result.is_ok() {
            info!("event=list_clear module=engine status=ok");
        }
        logged("list_clear", started_at, result)
    }

    /// Compares the order sequence against stored records without writing.
    pub fn check_consistency(&self) -> EngineResult<ConsistencyReport> {
        let order = self.current_order()?;
        let record_ids = self.committed_record_ids()?;
        Ok(build_report(&order, &record_ids))
    }

    /// Rewrites the order so it matches the stored records again.
    ///
    /// Dangling and repeated entries are dropped (first occurrence kept),
    /// orphan records are appended in creation order. An undecodable order
    /// is rebuilt from the records alone. Returns the drift found before
    /// repairing.
    pub fn repair(&mut self) -> EngineResult<ConsistencyReport> {
        let started_at = Instant::now();
        let result = self.repair_order();
        if let Ok(report) = &result {
            if report.is_consistent() {
                debug!("event=list_repair module=engine status=ok drift=none");
            } else {
                warn!(
                    "event=list_repair module=engine status=ok dangling={} orphans={} duplicates={}",
                    report.dangling_ids.len(),
                    report.orphan_ids.len(),
                    report.duplicate_ids.len()
                );
            }
        }
        logged("list_repair", started_at, result)
    }

    fn load_snapshot(&self) -> EngineResult<ListSnapshot> {
        let order = self.current_order()?;
        let mut items = Vec::with_capacity(order.len());
        for id in order {
            match self.records.get(ItemId::Committed(id))? {
                Some(record) => items.push(record),
                None => warn!(
                    "event=list_load module=engine status=warn reason=missing_record item_id={id}"
                ),
            }
        }

        let draft = self
            .records
            .get(ItemId::Draft)?
            .map(|record| record.text)
            .unwrap_or_default();
        Ok(ListSnapshot { items, draft })
    }

    /// Stores `text` under a fresh id and appends it to the stored order.
    fn insert_committed(&mut self, text: &str) -> EngineResult<ItemRecord> {
        validate_text(text)?;

        let id = self.ids.next_id().ok_or(EngineError::IdSpaceExhausted)?;
        let record = ItemRecord::new(id, text);
        self.records.put(&record)?;

        let mut order = self.current_order()?;
        order.retain(|existing| *existing != id);
        order.push(id);
        self.orders.put(&order)?;
        Ok(record)
    }

    fn apply_edit(&mut self, id: ItemId, text: &str) -> EngineResult<EditOutcome> {
        validate_text(text)?;

        if self.records.update(id, text)? {
            return Ok(match id {
                ItemId::Draft => EditOutcome::DraftSaved,
                ItemId::Committed(_) => EditOutcome::Updated,
            });
        }

        match (id, self.missing_edit_policy) {
            (ItemId::Draft, _) => {
                self.records.put(&ItemRecord::draft(text))?;
                Ok(EditOutcome::DraftSaved)
            }
            (ItemId::Committed(missing), MissingEditPolicy::Discard) => {
                warn!(
                    "event=item_edit module=engine status=warn reason=missing_record policy=discard item_id={missing}"
                );
                Ok(EditOutcome::Skipped)
            }
            (ItemId::Committed(missing), MissingEditPolicy::Reinsert) => {
                let record = self.insert_committed(text)?;
                warn!(
                    "event=item_edit module=engine status=warn reason=missing_record policy=reinsert item_id={missing} new_item_id={}",
                    record.id
                );
                Ok(EditOutcome::Reinserted(record))
            }
        }
    }

    fn remove_and_reorder(
        &mut self,
        id: ItemId,
        visual_order: &[CommittedId],
    ) -> EngineResult<usize> {
        self.records.delete(id)?;

        let removed = id.committed();
        let order: Vec<CommittedId> = visual_order
            .iter()
            .copied()
            .filter(|existing| Some(*existing) != removed)
            .collect();
        self.orders.put(&order)?;
        Ok(order.len())
    }

    fn repair_order(&mut self) -> EngineResult<ConsistencyReport> {
        let (order, decodable) = match self.orders.get() {
            Ok(order) => (order.unwrap_or_default(), true),
            Err(StoreError::InvalidData(reason)) => {
                warn!(
                    "event=list_repair module=engine status=warn reason=invalid_order error={reason}"
                );
                (Vec::new(), false)
            }
            Err(err) => return Err(err.into()),
        };
        let record_ids = self.committed_record_ids()?;
        let report = build_report(&order, &record_ids);
        if report.is_consistent() && decodable {
            return Ok(report);
        }

        let mut seen = HashSet::with_capacity(order.len());
        let mut repaired: Vec<CommittedId> = order
            .into_iter()
            .filter(|id| record_ids.contains(id) && seen.insert(*id))
            .collect();
        repaired.extend(report.orphan_ids.iter().copied());
        self.orders.put(&repaired)?;
        Ok(report)
    }

    fn current_order(&self) -> EngineResult<Vec<CommittedId>> {
        Ok(self.orders.get()?.unwrap_or_default())
    }

    fn committed_record_ids(&self) -> EngineResult<BTreeSet<CommittedId>> {
        Ok(self
            .records
            .list_ids()?
            .into_iter()
            .filter_map(ItemId::committed)
            .collect())
    }
}

fn build_report(order: &[CommittedId], record_ids: &BTreeSet<CommittedId>) -> ConsistencyReport {
    let mut report = ConsistencyReport::default();
    let mut seen = HashSet::with_capacity(order.len());

    for id in order {
        if !seen.insert(*id) {
            if !report.duplicate_ids.contains(id) {
                report.duplicate_ids.push(*id);
            }
            continue;
        }
        if !record_ids.contains(id) {
            report.dangling_ids.push(*id);
        }
    }
    report.orphan_ids = record_ids
        .iter()
        .filter(|id| !seen.contains(*id))
        .copied()
        .collect();
    report
}

fn logged<T>(event: &'static str, started_at: Instant, result: EngineResult<T>) -> EngineResult<T> {
    let duration_ms = started_at.elapsed().as_millis();
    match &result {
        Ok(_) => debug!("event={event} module=engine status=ok duration_ms={duration_ms}"),
        Err(EngineError::Validation(err)) => warn!(
            "event={event} module=engine status=rejected duration_ms={duration_ms} error_code=validation error={err}"
        ),
        Err(err) => error!(
            "event={event} module=engine status=error duration_ms={duration_ms} error_code=storage error={err}"
        ),
    }
    result
}
