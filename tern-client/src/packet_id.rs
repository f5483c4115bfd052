//! Packet identifier bookkeeping for outbound requests.
//!
//! Identifiers are non-zero 16-bit values shared by SUBSCRIBE, UNSUBSCRIBE and
//! QoS 1/2 PUBLISH. An identifier stays taken until its entry is removed, so
//! it is never reused while an acknowledgement is outstanding.

use std::collections::HashMap;

#[derive(Debug)]
pub(crate) struct PacketIdTable<T> {
    next_id: u16,
    entries: HashMap<u16, T>,
}

impl<T> Default for PacketIdTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PacketIdTable<T> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 1,
            entries: HashMap::new(),
        }
    }

    /// Returns the identifier the next `insert` will use, without taking it.
    ///
    /// `None` when all 65535 identifiers are in flight.
    pub(crate) fn next_free(&self) -> Option<u16> {
        let mut candidate = self.next_id;

        for _ in 0..u16::MAX {
            if !self.entries.contains_key(&candidate) {
                return Some(candidate);
            }
            candidate = Self::following(candidate);
        }

        None
    }

    /// Take the next free identifier for `value`.
    #[cfg(test)]
    pub(crate) fn insert(&mut self, value: T) -> Option<u16> {
        let id = self.next_free()?;
        self.occupy(id, value);

        Some(id)
    }

    /// Take `id`, as returned by `next_free`, for `value`.
    pub(crate) fn occupy(&mut self, id: u16, value: T) {
        self.entries.insert(id, value);
        self.next_id = Self::following(id);
    }

    pub(crate) fn get(&self, id: u16) -> Option<&T> {
        self.entries.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: u16) -> Option<&mut T> {
        self.entries.get_mut(&id)
    }

    /// Release an identifier, handing back what it tracked.
    pub(crate) fn remove(&mut self, id: u16) -> Option<T> {
        self.entries.remove(&id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (u16, &T)> {
        self.entries.iter().map(|(id, value)| (*id, value))
    }

    /// Release every identifier, in ascending order.
    pub(crate) fn drain(&mut self) -> Vec<(u16, T)> {
        let mut drained: Vec<(u16, T)> = self.entries.drain().collect();
        drained.sort_by_key(|(id, _)| *id);
        drained
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn following(id: u16) -> u16 {
        match id.wrapping_add(1) {
            0 => 1,
            next => next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_allocation() {
        let mut table = PacketIdTable::new();
        assert_eq!(table.insert("a"), Some(1));
        assert_eq!(table.insert("b"), Some(2));
        assert_eq!(table.insert("c"), Some(3));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_released_id_is_not_reused_immediately() {
        let mut table = PacketIdTable::new();
        let first = table.insert(()).unwrap();
        let second = table.insert(()).unwrap();

        assert!(table.remove(first).is_some());
        assert!(table.get(first).is_none());
        assert!(table.get(second).is_some());
        assert_eq!(table.insert(()), Some(3));
    }

    #[test]
    fn test_skips_zero_on_wrap() {
        let mut table = PacketIdTable::new();
        table.next_id = u16::MAX;

        assert_eq!(table.insert(()), Some(u16::MAX));
        assert_eq!(table.insert(()), Some(1));
    }

    #[test]
    fn test_skips_ids_in_flight() {
        let mut table = PacketIdTable::new();
        table.insert(());
        table.insert(());
        table.next_id = 1;

        assert_eq!(table.next_free(), Some(3));
        assert_eq!(table.insert(()), Some(3));
    }

    #[test]
    fn test_exhausted() {
        let mut table = PacketIdTable::new();
        for _ in 0..u16::MAX {
            assert!(table.insert(()).is_some());
        }

        assert_eq!(table.next_free(), None);
        assert_eq!(table.insert(()), None);

        table.remove(42);
        assert_eq!(table.insert(()), Some(42));
    }

    #[test]
    fn test_drain_is_ordered() {
        let mut table = PacketIdTable::new();
        table.insert('x');
        table.insert('y');
        table.insert('z');

        let drained = table.drain();
        assert_eq!(drained, vec![(1, 'x'), (2, 'y'), (3, 'z')]);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_get_mut() {
        let mut table = PacketIdTable::new();
        let id = table.insert(1u32).unwrap();

        if let Some(value) = table.get_mut(id) {
            *value += 1;
        }
        assert_eq!(table.get(id), Some(&2));
    }
}
