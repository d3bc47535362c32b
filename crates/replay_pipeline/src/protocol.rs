//! JSON-lines protocol spoken with an engine process.
//!
//! One JSON object per line in each direction:
//!
//! **Requests (stdin of the engine):** tagged by `cmd`
//! **Responses (stdout of the engine):** tagged by `type`
//!
//! # Example Session
//!
//! ```text
//! -> {"cmd":"replay_info","replay_data":[...]}
//! <- {"type":"replay_info","info":{"map_name":"Abyssal Reef LE",...}}
//! -> {"cmd":"start_replay","replay_data":[...],"map_data":null,"options":{...},"observed_player_id":1}
//! <- {"type":"started"}
//! -> {"cmd":"step","count":8}
//! <- {"type":"stepped","game_loop":8}
//! -> {"cmd":"observe"}
//! <- {"type":"observation","observation":{"game_loop":8,...}}
//! -> {"cmd":"quit"}
//! ```

use replay_core::engine::CaptureConfig;
use replay_core::observation::Observation;
use replay_core::replay::ReplayInfo;
use serde::{Deserialize, Serialize};

// ============================================================================
// Requests (Pipeline -> Engine)
// ============================================================================

/// Requests sent to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
    /// Inspect a replay without starting it.
    ReplayInfo { replay_data: Vec<u8> },

    /// Start replaying from one participant's view.
    StartReplay {
        replay_data: Vec<u8>,
        #[serde(default)]
        map_data: Option<Vec<u8>>,
        options: CaptureConfig,
        observed_player_id: u32,
    },

    /// Advance by N game loops (default: 1).
    Step {
        #[serde(default = "default_step_count")]
        count: u32,
    },

    /// Capture the current observation.
    Observe,

    /// Dump the running game's info.
    GameInfo,

    /// Dump the static game data.
    DataRaw,

    /// Shut the engine down. No response.
    Quit,
}

fn default_step_count() -> u32 {
    1
}

// ============================================================================
// Responses (Engine -> Pipeline)
// ============================================================================

/// Responses read from the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Replay metadata.
    ReplayInfo { info: ReplayInfo },

    /// Replay started.
    Started,

    /// Step finished.
    Stepped { game_loop: u32 },

    /// Captured observation.
    Observation { observation: Observation },

    /// Game info dump.
    GameInfo { text: String },

    /// Static data dump.
    DataRaw { text: String },

    /// The engine could not serve the request.
    Error { message: String },
}

impl Request {
    /// Serialize to a JSON line (with newline).
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let mut json = serde_json::to_string(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Request name, as sent in `cmd`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReplayInfo { .. } => "replay_info",
            Self::StartReplay { .. } => "start_replay",
            Self::Step { .. } => "step",
            Self::Observe => "observe",
            Self::GameInfo => "game_info",
            Self::DataRaw => "data_raw",
            Self::Quit => "quit",
        }
    }
}

impl Response {
    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Response name, as sent in `type`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReplayInfo { .. } => "replay_info",
            Self::Started => "started",
            Self::Stepped { .. } => "stepped",
            Self::Observation { .. } => "observation",
            Self::GameInfo { .. } => "game_info",
            Self::DataRaw { .. } => "data_raw",
            Self::Error { .. } => "error",
        }
    }
}

// The engine side of the exchange, for scripting connections in tests.
#[cfg(test)]
impl Request {
    pub(crate) fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
impl Response {
    pub(crate) fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub(crate) fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap();
        json.push('\n');
        json
    }
}
