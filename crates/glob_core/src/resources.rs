//! Basic resources lying on the map and carried by workers.

use serde::{Deserialize, Serialize};

/// Number of basic resource kinds.
pub const NB_RESOURCES: usize = 5;

/// Kind of a basic resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Trees.
    Wood,
    /// Wheat fields.
    Corn,
    /// Papyrus reeds.
    Papyrus,
    /// Stone quarries.
    Stone,
    /// Sea algae.
    Algae,
}

impl ResourceKind {
    /// All kinds in index order.
    pub const ALL: [Self; NB_RESOURCES] = [
        Self::Wood,
        Self::Corn,
        Self::Papyrus,
        Self::Stone,
        Self::Algae,
    ];

    /// Stable index used in per-resource arrays and bit masks.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Kind at `index`.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Bit of this kind in a resource mask.
    #[must_use]
    pub const fn bit(self) -> u8 {
        1 << (self as u8)
    }

    /// Largest amount a single tile can hold.
    #[must_use]
    pub const fn max_amount(self) -> u8 {
        match self {
            Self::Wood | Self::Papyrus => 8,
            Self::Corn => 5,
            Self::Stone => 12,
            Self::Algae => 6,
        }
    }

    /// Whether depleted tiles grow back.
    #[must_use]
    pub const fn regrows(self) -> bool {
        !matches!(self, Self::Stone)
    }

    /// Whether this resource lives on water tiles.
    #[must_use]
    pub const fn on_water(self) -> bool {
        matches!(self, Self::Algae)
    }
}

/// Resource deposit on a map tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// What grows here.
    pub kind: ResourceKind,
    /// Units left; zero means depleted but still regrowing.
    pub amount: u8,
}

impl Resource {
    /// Full deposit of `kind`.
    #[must_use]
    pub const fn full(kind: ResourceKind) -> Self {
        Self {
            kind,
            amount: kind.max_amount(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_round_trip() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::from_index(kind.index()), Some(kind));
        }
        assert_eq!(ResourceKind::from_index(NB_RESOURCES), None);
    }

    #[test]
    fn test_bits_are_distinct() {
        let mask = ResourceKind::ALL.iter().fold(0u8, |m, k| m | k.bit());
        assert_eq!(mask, 0b1_1111);
    }
}
