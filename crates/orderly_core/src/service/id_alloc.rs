//! Committed id allocation.
//!
//! Ids stay close to creation time in epoch milliseconds, but never repeat:
//! each id is at least one greater than the previous id and than any id the
//! stores already held when the allocator was seeded.

use crate::model::item::CommittedId;
use std::time::{SystemTime, UNIX_EPOCH};

/// Monotonic, time-derived id source owned by one engine.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    last: i64,
}

impl IdAllocator {
    /// Seeds the allocator with the largest id already persisted.
    pub fn seeded(max_seen: Option<CommittedId>) -> Self {
        Self {
            last: max_seen.map_or(0, CommittedId::get),
        }
    }

    /// Returns the next id using the wall clock.
    pub fn next_id(&mut self) -> Option<CommittedId> {
        self.next_id_at(now_epoch_ms())
    }

    /// Returns the next id as if the clock read `now_ms`.
    ///
    /// `None` once `i64::MAX` has been handed out.
    pub fn next_id_at(&mut self, now_ms: i64) -> Option<CommittedId> {
        let floor = self.last.checked_add(1)?;
        let id = CommittedId::at_least_one(now_ms.max(floor));
        self.last = id.get();
        Some(id)
    }
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        // A clock before the epoch falls back to pure counter behavior.
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::IdAllocator;
    use crate::model::item::CommittedId;

    #[test]
    fn ids_follow_the_clock_when_it_moves_forward() {
        let mut ids = IdAllocator::seeded(None);
        assert_eq!(ids.next_id_at(1_000).unwrap().get(), 1_000);
        assert_eq!(ids.next_id_at(1_500).unwrap().get(), 1_500);
    }

    #[test]
    fn same_millisecond_creations_get_distinct_ids() {
        let mut ids = IdAllocator::seeded(None);
        let generated: Vec<i64> = [42, 42, 41]
            .into_iter()
            .map(|now_ms| ids.next_id_at(now_ms).unwrap().get())
            .collect();
        assert_eq!(generated, [42, 43, 44]);
    }

    #[test]
    fn seed_wins_over_a_clock_behind_stored_ids() {
        let mut ids = IdAllocator::seeded(CommittedId::new(9_000));
        assert_eq!(ids.next_id_at(10).unwrap().get(), 9_001);
    }

    #[test]
    fn exhausted_id_space_is_not_reused() {
        let mut ids = IdAllocator::seeded(CommittedId::new(i64::MAX - 1));
        assert_eq!(ids.next_id_at(0).unwrap().get(), i64::MAX);
        assert_eq!(ids.next_id_at(0), None);
        assert_eq!(ids.next_id_at(i64::MAX), None);
    }

    #[test]
    fn wall_clock_ids_are_strictly_increasing() {
        let mut ids = IdAllocator::seeded(None);
        let generated: Vec<i64> = (0..100).map(|_| ids.next_id().unwrap().get()).collect();
        assert!(generated.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
