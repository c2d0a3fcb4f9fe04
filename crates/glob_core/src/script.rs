//! Mission script state.
//!
//! Only the hooks the simulation consults are modelled: the script is
//! stepped every 32 ticks and may declare teams as winners or losers.
//! Campaign scripts set the masks through [`ScriptState::declare_won`] and
//! [`ScriptState::declare_lost`].

use serde::{Deserialize, Serialize};

use crate::checksum::fold;
use crate::ids::team_mask;

/// Script progress and outcome flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptState {
    /// Number of script steps run.
    pub step: u32,
    /// Teams the script declared winners.
    pub won_mask: u32,
    /// Teams the script declared losers.
    pub lost_mask: u32,
}

impl ScriptState {
    /// Run one script step.
    pub fn sync_step(&mut self) {
        self.step = self.step.wrapping_add(1);
    }

    /// Mark `team` as having won.
    pub fn declare_won(&mut self, team: usize) {
        self.won_mask |= team_mask(team);
    }

    /// Mark `team` as having lost.
    pub fn declare_lost(&mut self, team: usize) {
        self.lost_mask |= team_mask(team);
    }

    /// Whether the script declared `team` a winner.
    #[must_use]
    pub fn has_team_won(&self, team: usize) -> bool {
        self.won_mask & team_mask(team) != 0
    }

    /// Whether the script declared `team` a loser.
    #[must_use]
    pub fn has_team_lost(&self, team: usize) -> bool {
        self.lost_mask & team_mask(team) != 0
    }

    /// Checksum of the script state.
    #[must_use]
    pub fn checksum(&self) -> u32 {
        fold([self.step, self.won_mask, self.lost_mask])
    }
}
