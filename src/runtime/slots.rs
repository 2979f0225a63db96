//! Fixed-capacity connection slot table.
//!
//! Slots are addressed by index, which doubles as the mio token of the
//! session occupying it. A freed slot is reused by the next accept; the
//! lowest free index always wins.

/// Fixed-size table of optional entries.
pub struct SlotTable<T> {
    slots: Box<[Option<T>]>,
    occupied: usize,
}

impl<T> SlotTable<T> {
    /// Create a table with `capacity` free slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            occupied: 0,
        }
    }

    /// Lowest free slot, or `None` when the table is full.
    pub fn find_free(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    /// Put `entry` into a free slot.
    ///
    /// Returns the entry back if the slot is taken or out of range.
    pub fn occupy(&mut self, index: usize, entry: T) -> Result<&mut T, T> {
        let Some(slot) = self.slots.get_mut(index) else {
            return Err(entry);
        };
        if slot.is_some() {
            return Err(entry);
        }
        self.occupied += 1;
        Ok(slot.insert(entry))
    }

    /// Free a slot, handing back its entry.
    pub fn release(&mut self, index: usize) -> Option<T> {
        let entry = self.slots.get_mut(index)?.take()?;
        self.occupied -= 1;
        Some(entry)
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index)?.as_ref()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index)?.as_mut()
    }

    /// Indices of every occupied slot, ascending.
    pub fn occupied(&self) -> Vec<usize> {
        self.iter().map(|(index, _)| index).collect()
    }

    /// Iterate over occupied slots.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|entry| (index, entry)))
    }

    /// Number of occupied slots.
    pub fn count(&self) -> usize {
        self.occupied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_to_capacity() {
        let mut table = SlotTable::new(3);
        for expected in 0..3 {
            let index = table.find_free().unwrap();
            assert_eq!(index, expected);
            table.occupy(index, expected * 10).unwrap();
        }

        assert_eq!(table.find_free(), None);
        assert_eq!(table.count(), 3);
    }

    #[test]
    fn test_release_and_reuse_lowest() {
        let mut table = SlotTable::new(4);
        for i in 0..4 {
            table.occupy(i, i).unwrap();
        }

        assert_eq!(table.release(2), Some(2));
        assert_eq!(table.release(1), Some(1));
        assert_eq!(table.release(1), None);
        assert_eq!(table.count(), 2);

        // First free slot wins, regardless of release order
        assert_eq!(table.find_free(), Some(1));
        table.occupy(1, 100).unwrap();
        assert_eq!(table.get(1), Some(&100));
        assert_eq!(table.find_free(), Some(2));
    }

    #[test]
    fn test_occupy_taken_or_out_of_range() {
        let mut table = SlotTable::new(1);
        table.occupy(0, "a").unwrap();
        assert_eq!(table.occupy(0, "b").err(), Some("b"));
        assert_eq!(table.occupy(7, "c").err(), Some("c"));
        assert_eq!(table.get(0), Some(&"a"));
        assert_eq!(table.count(), 1);
    }

    #[test]
    fn test_iterate_occupied() {
        let mut table = SlotTable::new(5);
        table.occupy(0, 'a').unwrap();
        table.occupy(3, 'd').unwrap();

        assert_eq!(table.occupied(), vec![0, 3]);
        assert_eq!(table.get(3), Some(&'d'));
        assert!(table.get(1).is_none());
        assert!(table.get(99).is_none());
        assert!(table.get_mut(4).is_none());
    }
}
