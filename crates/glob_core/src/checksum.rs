//! 32-bit state checksums for desync detection.
//!
//! Every component folds its state with XOR followed by a one-bit right
//! rotation. Peers exchange the game checksum after each batch of ticks;
//! the optional [`ChecksumReport`] keeps per-component values so that a
//! mismatch can be narrowed down to a team, a building or a unit.

use serde::{Deserialize, Serialize};

use crate::ids::Gid;

/// Rotate right by one bit.
#[inline]
#[must_use]
pub const fn rotr1(cs: u32) -> u32 {
    cs.rotate_right(1)
}

/// Fold a sequence of words: XOR each one in, then rotate.
#[must_use]
pub fn fold(words: impl IntoIterator<Item = u32>) -> u32 {
    words.into_iter().fold(0, |cs, w| rotr1(cs ^ w))
}

/// Per-component checksum values collected during [`crate::game::Game::check_sum`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumReport {
    /// Step at which the report was taken.
    pub step: u32,
    /// Map header contribution.
    pub header: u32,
    /// One value per team, in team order.
    pub teams: Vec<u32>,
    /// One value per player, in player order.
    pub players: Vec<u32>,
    /// Map contribution.
    pub map: u32,
    /// Sync-rand contribution.
    pub sync_rand: u32,
    /// Script contribution.
    pub script: u32,
    /// Buildings in GID order.
    pub buildings: Vec<(Gid, u32)>,
    /// Units in GID order.
    pub units: Vec<(Gid, u32)>,
    /// Running value after each top-level component.
    pub running: Vec<u32>,
}

/// First component at which two reports disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Divergence {
    /// Map headers differ.
    Header,
    /// A team differs.
    Team(usize),
    /// A player differs.
    Player(usize),
    /// A building differs (or exists on one side only).
    Building(Gid),
    /// A unit differs (or exists on one side only).
    Unit(Gid),
    /// Map contents differ.
    Map,
    /// Sync-rand seeds differ.
    SyncRand,
    /// Script state differs.
    Script,
}

impl ChecksumReport {
    /// Locate the first difference with `other`, entities before containers.
    #[must_use]
    pub fn first_difference(&self, other: &Self) -> Option<Divergence> {
        if self.header != other.header {
            return Some(Divergence::Header);
        }
        if let Some(gid) = first_entity_difference(&self.buildings, &other.buildings) {
            return Some(Divergence::Building(gid));
        }
        if let Some(gid) = first_entity_difference(&self.units, &other.units) {
            return Some(Divergence::Unit(gid));
        }
        if let Some(i) = first_index_difference(&self.teams, &other.teams) {
            return Some(Divergence::Team(i));
        }
        if let Some(i) = first_index_difference(&self.players, &other.players) {
            return Some(Divergence::Player(i));
        }
        if self.map != other.map {
            return Some(Divergence::Map);
        }
        if self.sync_rand != other.sync_rand {
            return Some(Divergence::SyncRand);
        }
        if self.script != other.script {
            return Some(Divergence::Script);
        }
        None
    }
}

fn first_index_difference(a: &[u32], b: &[u32]) -> Option<usize> {
    let common = a.iter().zip(b).position(|(x, y)| x != y);
    common.or_else(|| (a.len() != b.len()).then(|| a.len().min(b.len())))
}

fn first_entity_difference(a: &[(Gid, u32)], b: &[(Gid, u32)]) -> Option<Gid> {
    for (x, y) in a.iter().zip(b) {
        if x.0 != y.0 {
            return Some(x.0.min(y.0));
        }
        if x.1 != y.1 {
            return Some(x.0);
        }
    }
    match a.len().cmp(&b.len()) {
        std::cmp::Ordering::Less => Some(b[a.len()].0),
        std::cmp::Ordering::Greater => Some(a[b.len()].0),
        std::cmp::Ordering::Equal => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotr1() {
        assert_eq!(rotr1(1), 0x8000_0000);
        assert_eq!(rotr1(2), 1);
    }

    #[test]
    fn test_fold_is_order_sensitive() {
        assert_ne!(fold([1, 2, 3]), fold([3, 2, 1]));
        assert_eq!(fold([1, 2, 3]), fold([1, 2, 3]));
    }

    #[test]
    fn test_first_difference_prefers_entities() {
        let a = ChecksumReport {
            teams: vec![1, 2],
            units: vec![(Gid::new(1, 3), 7)],
            ..ChecksumReport::default()
        };
        let mut b = a.clone();
        b.teams[1] = 9;
        b.units[0].1 = 8;
        assert_eq!(a.first_difference(&b), Some(Divergence::Unit(Gid::new(1, 3))));
        b.units[0].1 = 7;
        assert_eq!(a.first_difference(&b), Some(Divergence::Team(1)));
        assert_eq!(a.first_difference(&a), None);
    }

    #[test]
    fn test_missing_entity_detected() {
        let a = ChecksumReport {
            buildings: vec![(Gid::new(0, 0), 1), (Gid::new(0, 1), 2)],
            ..ChecksumReport::default()
        };
        let mut b = a.clone();
        b.buildings.pop();
        assert_eq!(
            a.first_difference(&b),
            Some(Divergence::Building(Gid::new(0, 1)))
        );
    }
}
