//! Seen-Set tracking for cross-cycle deduplication.
//!
//! A [`SeenSet`] remembers which item ids have already been offered to
//! interest matching. It is owned by exactly one poll loop; `&mut self`
//! receivers make overlapping cycles on the same set impossible without
//! external synchronisation.
//!
//! By default the set grows without bound for the lifetime of the loop, which
//! is what gives the "dispatched at most once" guarantee. A capacity cap can
//! be configured for long-running processes; the oldest ids are evicted first
//! and an evicted id would be treated as new if the platform returned it again.

use std::collections::{HashSet, VecDeque};

use crate::ItemId;

/// Bounded or unbounded memory of previously observed item ids.
#[derive(Debug, Clone, Default)]
pub struct SeenSet {
    ids: HashSet<ItemId>,
    order: VecDeque<ItemId>,
    capacity: Option<usize>,
}

impl SeenSet {
    /// A set that never evicts.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// A set holding at most `capacity` ids (minimum 1), evicting oldest first.
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            ..Self::default()
        }
    }

    /// Returns `true` if `id` has not been marked seen.
    pub fn is_new(&self, id: &ItemId) -> bool {
        !self.ids.contains(id)
    }

    /// Records `id` as seen. Marking an already-seen id is a no-op.
    pub fn mark_seen(&mut self, id: ItemId) {
        if self.ids.contains(&id) {
            return;
        }
        if let Some(cap) = self.capacity {
            while self.order.len() >= cap {
                match self.order.pop_front() {
                    Some(evicted) => {
                        self.ids.remove(&evicted);
                    }
                    None => break,
                }
            }
            self.order.push_back(id.clone());
        }
        self.ids.insert(id);
    }

    /// Checks and records `id` in one step, returning whether it was new.
    ///
    /// This is the form a poll cycle uses so the check and the mark can never
    /// be separated by a dispatch.
    pub fn observe(&mut self, id: &ItemId) -> bool {
        if !self.is_new(id) {
            return false;
        }
        self.mark_seen(id.clone());
        true
    }

    /// Forgets every id.
    pub fn reset(&mut self) {
        self.ids.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> ItemId {
        ItemId::from(n)
    }

    #[test]
    fn marked_ids_are_not_new_until_reset() {
        let mut seen = SeenSet::unbounded();
        for n in 0..1_000 {
            assert!(seen.is_new(&id(n)));
            seen.mark_seen(id(n));
            assert!(!seen.is_new(&id(n)));
        }
        assert!((0..1_000).all(|n| !seen.is_new(&id(n))));

        seen.reset();
        assert!(seen.is_new(&id(3)));
        assert!(seen.is_empty());
    }

    #[test]
    fn observe_reports_new_exactly_once() {
        let mut seen = SeenSet::unbounded();
        assert!(seen.observe(&id(1)));
        assert!(!seen.observe(&id(1)));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn capped_set_evicts_oldest_first() {
        let mut seen = SeenSet::with_capacity_limit(2);
        seen.mark_seen(id(1));
        seen.mark_seen(id(2));
        seen.mark_seen(id(2));
        seen.mark_seen(id(3));

        assert_eq!(seen.len(), 2);
        assert!(seen.is_new(&id(1)));
        assert!(!seen.is_new(&id(2)));
        assert!(!seen.is_new(&id(3)));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut seen = SeenSet::with_capacity_limit(0);
        seen.mark_seen(id(9));
        assert_eq!(seen.capacity(), Some(1));
        assert!(!seen.is_new(&id(9)));
    }
}
