//! Players: the people and programs issuing orders for a team.

use serde::{Deserialize, Serialize};

use crate::checksum::{fold, rotr1};

/// How a player's orders reach the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlayerKind {
    /// Local human.
    #[default]
    Human,
    /// Remote human over the network.
    Ip,
    /// Computer opponent.
    Ai,
}

/// A player in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Index in the game.
    pub number: usize,
    /// Display name.
    pub name: String,
    /// Team controlled.
    pub team: usize,
    /// Controller kind.
    pub kind: PlayerKind,
}

impl Player {
    /// Create a player controlling `team`.
    #[must_use]
    pub fn new(number: usize, name: impl Into<String>, team: usize, kind: PlayerKind) -> Self {
        Self {
            number,
            name: name.into(),
            team,
            kind,
        }
    }

    /// Checksum of the player.
    #[must_use]
    pub fn checksum(&self) -> u32 {
        let cs = fold([self.number as u32, self.team as u32, self.kind as u32]);
        self.name.bytes().fold(cs, |cs, b| rotr1(cs ^ u32::from(b)))
    }
}
