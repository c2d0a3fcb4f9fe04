//! Fixed-capacity slot arena with a free set.
//!
//! Slots are addressed by index so that `GID = team * 1024 + slot` stays
//! stable for the lifetime of an entity. Allocation always hands out the
//! lowest free slot: peers that apply the same orders, and games reloaded
//! from a save, therefore allocate exactly the same slots.

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Arena of `capacity` optional entries with O(log n) allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotTable<T> {
    slots: Vec<Option<T>>,
    free: BTreeSet<u16>,
}

impl<T> SlotTable<T> {
    /// Create a table with every slot free.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity <= usize::from(u16::MAX), "slot table too large");
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            free: (0..capacity as u16).collect(),
        }
    }

    /// Total number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// True when no slot is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.free.len() == self.slots.len()
    }

    /// Lowest free slot, if any.
    #[must_use]
    pub fn peek_free(&self) -> Option<usize> {
        self.free.first().map(|&s| usize::from(s))
    }

    /// Store `make(slot)` in the lowest free slot and return the slot.
    pub fn insert_with(&mut self, make: impl FnOnce(usize) -> T) -> Option<usize> {
        let slot = usize::from(self.free.pop_first()?);
        self.slots[slot] = Some(make(slot));
        Some(slot)
    }

    /// Store `value` at a specific slot, replacing nothing.
    ///
    /// Returns `false` if the slot is out of range or occupied.
    pub fn insert_at(&mut self, slot: usize, value: T) -> bool {
        if slot >= self.slots.len() || self.slots[slot].is_some() {
            return false;
        }
        self.free.remove(&(slot as u16));
        self.slots[slot] = Some(value);
        true
    }

    /// Remove and return the entry at `slot`.
    pub fn remove(&mut self, slot: usize) -> Option<T> {
        let value = self.slots.get_mut(slot)?.take()?;
        self.free.insert(slot as u16);
        Some(value)
    }

    /// Entry at `slot`.
    #[must_use]
    pub fn get(&self, slot: usize) -> Option<&T> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Mutable entry at `slot`.
    pub fn get_mut(&mut self, slot: usize) -> Option<&mut T> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    /// True when `slot` holds an entry.
    #[must_use]
    pub fn contains(&self, slot: usize) -> bool {
        self.get(slot).is_some()
    }

    /// Occupied slots in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|v| (i, v)))
    }

    /// Mutable occupied slots in ascending order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, s)| s.as_mut().map(|v| (i, v)))
    }

    /// Indices of occupied slots in ascending order.
    #[must_use]
    pub fn occupied(&self) -> Vec<usize> {
        self.iter().map(|(i, _)| i).collect()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        let capacity = self.slots.len();
        *self = Self::with_capacity(capacity);
    }
}

#[derive(Serialize, Deserialize)]
struct SlotRecord<T> {
    capacity: u16,
    entries: Vec<(u16, T)>,
}

impl<T: Serialize> Serialize for SlotTable<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Borrowed<'a, T> {
            capacity: u16,
            entries: Vec<(u16, &'a T)>,
        }
        Borrowed {
            capacity: self.slots.len() as u16,
            entries: self.iter().map(|(i, v)| (i as u16, v)).collect(),
        }
        .serialize(serializer)
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for SlotTable<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = SlotRecord::<T>::deserialize(deserializer)?;
        let mut table = Self::with_capacity(usize::from(record.capacity));
        for (slot, value) in record.entries {
            if !table.insert_at(usize::from(slot), value) {
                return Err(serde::de::Error::custom(format!(
                    "slot {slot} duplicated or out of range"
                )));
            }
        }
        Ok(table)
    }
}
