//! Global identifiers for units and buildings.
//!
//! Every unit and building is addressed by a GID: `team * 1024 + slot`.
//! The encoding is load-bearing: map cells, orders and save games all
//! store the 16-bit value directly.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum number of teams in a game.
pub const MAX_TEAMS: usize = 32;

/// Maximum number of players in a game.
pub const MAX_PLAYERS: usize = 32;

/// Number of unit slots, and of building slots, per team.
pub const SLOTS_PER_TEAM: usize = 1024;

/// Global identifier of a unit or building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Gid(u16);

impl Gid {
    /// Build the GID of `slot` in `team`.
    ///
    /// # Panics
    ///
    /// Panics if `team` or `slot` is out of range.
    #[must_use]
    pub fn new(team: usize, slot: usize) -> Self {
        assert!(team < MAX_TEAMS, "team {team} out of range");
        assert!(slot < SLOTS_PER_TEAM, "slot {slot} out of range");
        Self((team * SLOTS_PER_TEAM + slot) as u16)
    }

    /// Reinterpret a raw wire value.
    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// Raw 16-bit value.
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Team number encoded in this GID.
    #[must_use]
    pub const fn team(self) -> usize {
        self.0 as usize / SLOTS_PER_TEAM
    }

    /// Slot index within the team.
    #[must_use]
    pub const fn slot(self) -> usize {
        self.0 as usize % SLOTS_PER_TEAM
    }
}

impl fmt::Display for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.team(), self.slot())
    }
}

/// Bit of `team` in a 32-team mask.
#[must_use]
pub const fn team_mask(team: usize) -> u32 {
    1u32 << team
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gid_layout() {
        let gid = Gid::new(3, 17);
        assert_eq!(gid.raw(), 3 * 1024 + 17);
        assert_eq!(gid.team(), 3);
        assert_eq!(gid.slot(), 17);
        assert_eq!(Gid::from_raw(gid.raw()), gid);
    }

    #[test]
    fn test_gid_extremes() {
        let last = Gid::new(MAX_TEAMS - 1, SLOTS_PER_TEAM - 1);
        assert_eq!(last.raw(), 32 * 1024 - 1);
        assert_eq!(last.team(), 31);
        assert_eq!(last.slot(), 1023);
    }

    #[test]
    #[should_panic(expected = "slot 1024 out of range")]
    fn test_gid_rejects_bad_slot() {
        let _ = Gid::new(0, SLOTS_PER_TEAM);
    }

    #[test]
    fn test_team_mask() {
        assert_eq!(team_mask(0), 1);
        assert_eq!(team_mask(31), 0x8000_0000);
    }
}
