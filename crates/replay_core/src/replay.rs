//! Replay metadata: who played a recorded match and on which map.
//!
//! [`ReplayInfo`] is what the engine reports for a replay before it is
//! started. It is also persisted per match by the upstream parsing stage so
//! that frame sampling can run without an engine.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

/// Playable race of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Race {
    /// Terran.
    Terran,
    /// Zerg.
    Zerg,
    /// Protoss.
    Protoss,
    /// Random (only ever requested, never the actual race in a finished replay).
    Random,
}

impl Race {
    /// Name used in dataset directory names.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Terran => "Terran",
            Self::Zerg => "Zerg",
            Self::Protoss => "Protoss",
            Self::Random => "Random",
        }
    }

    /// Parse a race from its directory name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Terran" => Some(Self::Terran),
            "Zerg" => Some(Self::Zerg),
            "Protoss" => Some(Self::Protoss),
            "Random" => Some(Self::Random),
            _ => None,
        }
    }
}

impl fmt::Display for Race {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a participant played or only watched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParticipantKind {
    /// An actual player.
    #[default]
    Player,
    /// A spectator; never replayed.
    Observer,
}

/// One side of a recorded match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    /// Engine player id (1-based).
    pub player_id: u32,
    /// Race the participant actually played.
    pub race: Race,
    /// Player or observer.
    #[serde(default)]
    pub kind: ParticipantKind,
}

impl ParticipantInfo {
    /// Create a player-type participant.
    #[must_use]
    pub const fn player(player_id: u32, race: Race) -> Self {
        Self {
            player_id,
            race,
            kind: ParticipantKind::Player,
        }
    }

    /// Create an observer-type participant.
    #[must_use]
    pub const fn observer(player_id: u32, race: Race) -> Self {
        Self {
            player_id,
            race,
            kind: ParticipantKind::Observer,
        }
    }

    /// Whether this participant is replayed.
    #[must_use]
    pub fn is_player(&self) -> bool {
        self.kind == ParticipantKind::Player
    }

    /// File name for this participant's outputs of the given replay.
    #[must_use]
    pub fn output_name(&self, replay_name: &str) -> String {
        format!("{}@{}", self.player_id, replay_name)
    }
}

/// Engine-reported information about a replay.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReplayInfo {
    /// Display name of the map.
    #[serde(default)]
    pub map_name: String,
    /// Path of a custom map, relative to the maps directory.
    #[serde(default)]
    pub local_map_path: Option<String>,
    /// Length of the match in game loops.
    #[serde(default)]
    pub game_duration_loops: u32,
    /// Everyone who took part, players and observers.
    pub players: Vec<ParticipantInfo>,
}

impl ReplayInfo {
    /// Non-observer participants, in reported order.
    pub fn active_players(&self) -> impl Iterator<Item = &ParticipantInfo> {
        self.players.iter().filter(|p| p.is_player())
    }

    /// Both non-observer participants.
    ///
    /// # Errors
    /// Returns [`CoreError::ParticipantCount`] unless exactly two players took part.
    pub fn player_pair(&self) -> Result<[&ParticipantInfo; 2]> {
        let players: Vec<&ParticipantInfo> = self.active_players().collect();
        match players.as_slice() {
            [a, b] => Ok([*a, *b]),
            other => Err(CoreError::ParticipantCount(other.len())),
        }
    }
}
