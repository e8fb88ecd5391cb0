//! Id allocation for one element kind.
//!
//! Live ids are kept in insertion order so they can be addressed by a dense
//! position (`0..count`). Removed ids are parked on a pending list until the
//! enclosing write transaction ends, then returned to the free set, from which
//! the smallest id is handed out first.

use indexmap::IndexSet;
use rustc_hash::FxBuildHasher;
use std::collections::BTreeSet;

const MIN_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct ElementTable {
    live: IndexSet<u32, FxBuildHasher>,
    free: BTreeSet<u32>,
    pending: Vec<u32>,
    /// One past the highest id that is live or awaiting release
    high_water: u32,
    capacity: usize,
}

impl ElementTable {
    pub fn new(capacity: usize) -> Self {
        ElementTable {
            live: IndexSet::with_capacity_and_hasher(capacity, FxBuildHasher),
            free: BTreeSet::new(),
            pending: Vec::new(),
            high_water: 0,
            capacity: capacity.max(MIN_CAPACITY),
        }
    }

    /// Allocate the smallest available id.
    pub fn add(&mut self) -> u32 {
        let id = match self.free.pop_first() {
            Some(id) => id,
            None => {
                let id = self.high_water;
                self.high_water += 1;
                id
            }
        };
        self.live.insert(id);
        self.grow_for(id);
        id
    }

    /// Make a specific id live again. Used when replaying a journal.
    pub fn add_with_id(&mut self, id: u32) {
        if self.live.contains(&id) {
            return;
        }
        if id >= self.high_water {
            self.free.extend(self.high_water..id);
            self.high_water = id + 1;
        } else if !self.free.remove(&id) {
            self.pending.retain(|p| *p != id);
        }
        self.live.insert(id);
        self.grow_for(id);
    }

    /// Remove a live id and return the position it vacated. The last id moves
    /// into that position. The removed id stays unavailable until
    /// [`release_pending`](Self::release_pending).
    pub fn remove(&mut self, id: u32) -> Option<usize> {
        let (position, _) = self.live.swap_remove_full(&id)?;
        self.pending.push(id);
        Some(position)
    }

    /// Undo a [`remove`](Self::remove): make `id` live again at `position`,
    /// moving the id that filled the gap back to the end.
    pub fn restore(&mut self, id: u32, position: usize) {
        self.add_with_id(id);
        self.reposition(id, position);
    }

    /// Swap the most recently added `id` back into `position`.
    pub(crate) fn reposition(&mut self, id: u32, position: usize) {
        let last = self.live.len().saturating_sub(1);
        if position < last && self.live.get_index_of(&id) == Some(last) {
            self.live.swap_indices(position, last);
        }
    }

    /// Return ids removed since the last release to the free set.
    pub fn release_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        self.free.extend(self.pending.drain(..));
        while self.high_water > 0 && self.free.remove(&(self.high_water - 1)) {
            self.high_water -= 1;
        }
    }

    fn grow_for(&mut self, id: u32) {
        let needed = id as usize + 1;
        while self.capacity < needed {
            self.capacity *= 2;
        }
    }

    pub fn contains(&self, id: u32) -> bool {
        self.live.contains(&id)
    }

    pub fn count(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Number of addressable slots. Always greater than every live id.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Id at a dense position
    pub fn element(&self, position: usize) -> Option<u32> {
        self.live.get_index(position).copied()
    }

    pub fn position(&self, id: u32) -> Option<usize> {
        self.live.get_index_of(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.live.iter().copied()
    }

    pub(crate) fn high_water(&self) -> u32 {
        self.high_water
    }

    pub(crate) fn free_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.free.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_dense() {
        let mut table = ElementTable::new(4);
        assert_eq!(table.add(), 0);
        assert_eq!(table.add(), 1);
        assert_eq!(table.add(), 2);
        assert_eq!(table.count(), 3);
        assert_eq!(table.element(1), Some(1));
        assert_eq!(table.position(2), Some(2));
    }

    #[test]
    fn test_removed_id_not_reused_until_released() {
        let mut table = ElementTable::new(4);
        for _ in 0..3 {
            table.add();
        }
        assert_eq!(table.remove(1), Some(1));
        assert!(!table.contains(1));
        assert_eq!(table.add(), 3);
        table.release_pending();
        assert_eq!(table.add(), 1);
    }

    #[test]
    fn test_smallest_free_id_first() {
        let mut table = ElementTable::new(4);
        for _ in 0..5 {
            table.add();
        }
        table.remove(3);
        table.remove(1);
        table.release_pending();
        assert_eq!(table.add(), 1);
        assert_eq!(table.add(), 3);
        assert_eq!(table.add(), 5);
    }

    #[test]
    fn test_freeing_top_lowers_high_water() {
        let mut table = ElementTable::new(4);
        for _ in 0..4 {
            table.add();
        }
        table.remove(2);
        table.remove(3);
        table.release_pending();
        assert_eq!(table.high_water(), 2);
        assert_eq!(table.free_ids().count(), 0);
    }

    #[test]
    fn test_add_with_id_beyond_high_water() {
        let mut table = ElementTable::new(4);
        table.add_with_id(5);
        assert!(table.contains(5));
        assert_eq!(table.free_ids().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
        assert_eq!(table.add(), 0);
    }

    #[test]
    fn test_add_with_id_reclaims_pending() {
        let mut table = ElementTable::new(4);
        table.add();
        table.add();
        table.remove(0);
        table.add_with_id(0);
        table.release_pending();
        assert!(table.contains(0));
        assert_eq!(table.add(), 2);
    }

    #[test]
    fn test_capacity_grows() {
        let mut table = ElementTable::new(16);
        for _ in 0..40 {
            table.add();
        }
        assert!(table.capacity() >= 40);
        assert_eq!(table.capacity(), 64);
    }

    #[test]
    fn test_positions_stay_dense_after_remove() {
        let mut table = ElementTable::new(4);
        for _ in 0..4 {
            table.add();
        }
        table.remove(0);
        let ids: Vec<u32> = (0..table.count()).filter_map(|p| table.element(p)).collect();
        assert_eq!(ids.len(), 3);
        for id in ids {
            assert_eq!(table.element(table.position(id).unwrap()), Some(id));
        }
    }

    #[test]
    fn test_restore_undoes_remove_positions() {
        let mut table = ElementTable::new(4);
        for _ in 0..5 {
            table.add();
        }
        let before: Vec<u32> = table.iter().collect();
        let second = table.remove(1).unwrap();
        let first = table.remove(3).unwrap();
        assert_ne!(table.iter().collect::<Vec<_>>(), before);

        table.restore(3, first);
        table.restore(1, second);
        assert_eq!(table.iter().collect::<Vec<_>>(), before);
        assert_eq!(table.position(1), Some(1));
    }

    #[test]
    fn test_remove_missing_id() {
        let mut table = ElementTable::new(4);
        table.add();
        assert_eq!(table.remove(7), None);
    }
}
