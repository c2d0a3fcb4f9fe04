//! Authoritative values paired with a locally predicted copy.
//!
//! The local player sees its own setting changes immediately, before the
//! order carrying them has travelled through the network and been executed
//! by every peer. The authoritative value is the one the simulation reads,
//! saves and checksums; the local value is only for display.
//!
//! Reconciliation: a commit coming from another player overwrites the local
//! value. A commit that round-trips from the local player consumes one
//! pending prediction; once no prediction is pending the local value is
//! overwritten with the authoritative one.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An authoritative value with a locally predicted shadow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shadowed<T> {
    authoritative: T,
    local: T,
    pending: u32,
}

impl<T: Clone> Shadowed<T> {
    /// Create with both values equal.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            local: value.clone(),
            authoritative: value,
            pending: 0,
        }
    }

    /// Value every peer agrees on.
    #[must_use]
    pub fn get(&self) -> &T {
        &self.authoritative
    }

    /// Value shown to the local player.
    #[must_use]
    pub fn local(&self) -> &T {
        &self.local
    }

    /// Number of local predictions still waiting for their order.
    #[must_use]
    pub fn pending(&self) -> u32 {
        self.pending
    }

    /// Record a local change that has been sent as an order.
    pub fn predict(&mut self, value: T) {
        self.local = value;
        self.pending += 1;
    }

    /// Apply an executed order.
    pub fn commit(&mut self, value: T, from_local_player: bool) {
        self.authoritative = value;
        if from_local_player {
            self.pending = self.pending.saturating_sub(1);
            if self.pending > 0 {
                return;
            }
        }
        self.local = self.authoritative.clone();
    }

    /// Overwrite both values, dropping predictions (simulation-internal writes).
    pub fn reset(&mut self, value: T) {
        self.local = value.clone();
        self.authoritative = value;
        self.pending = 0;
    }
}

impl<T: Clone + Default> Default for Shadowed<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Serialize> Serialize for Shadowed<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.authoritative.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de> + Clone> Deserialize<'de> for Shadowed<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_commit_overwrites_local() {
        let mut v = Shadowed::new(3);
        v.commit(7, false);
        assert_eq!(*v.get(), 7);
        assert_eq!(*v.local(), 7);
    }

    #[test]
    fn test_local_prediction_survives_earlier_round_trip() {
        let mut v = Shadowed::new(1);
        v.predict(5);
        v.predict(8);
        assert_eq!(*v.get(), 1);
        assert_eq!(*v.local(), 8);

        // First order comes back: prediction 8 is still in flight.
        v.commit(5, true);
        assert_eq!(*v.get(), 5);
        assert_eq!(*v.local(), 8);

        // Last order round-trips: local reconciles to authoritative.
        v.commit(8, true);
        assert_eq!(*v.local(), 8);
        assert_eq!(v.pending(), 0);
    }

    #[test]
    fn test_remote_commit_during_prediction_then_round_trip() {
        let mut v = Shadowed::new(0);
        v.predict(4);
        v.commit(9, false);
        assert_eq!(*v.local(), 9);
        v.commit(4, true);
        assert_eq!(*v.get(), 4);
        assert_eq!(*v.local(), 4);
    }

    #[test]
    fn test_serializes_authoritative_only() {
        let mut v = Shadowed::new(2u32);
        v.predict(6);
        let bytes = bincode::serialize(&v).unwrap();
        assert_eq!(bytes, bincode::serialize(&2u32).unwrap());
        let back: Shadowed<u32> = bincode::deserialize(&bytes).unwrap();
        assert_eq!(*back.local(), 2);
    }
}
