//! Test fixtures and helpers.
//!
//! Pre-built observations, replays and action records for consistent testing.

use replay_core::features::{MINIMAP_LAYERS, SCREEN_LAYERS};
use replay_core::observation::{
    FeatureLayerData, ImageData, Observation, PlayerCommon, Score, ScoreDetails, Size2D,
};
use replay_core::replay::{ParticipantInfo, Race, ReplayInfo};

/// Serialized unit command issuing `ability_id`, as the engine writes it.
#[must_use]
pub fn action_record(ability_id: u32) -> String {
    format!(r#"{{"actionRaw":{{"unitCommand":{{"abilityId":{ability_id},"queueCommand":false}}}}}}"#)
}

/// Serialized camera/selection action that carries no unit command.
#[must_use]
pub fn ui_action_record() -> String {
    r#"{"actionUi":{"controlGroup":{"action":"Recall","controlGroupIndex":1}}}"#.to_string()
}

/// Replay info for a two-player match.
#[must_use]
pub fn two_player_info(a: Race, b: Race) -> ReplayInfo {
    replay_info(vec![
        ParticipantInfo::player(1, a),
        ParticipantInfo::player(2, b),
    ])
}

/// Replay info with the given participants.
#[must_use]
pub fn replay_info(players: Vec<ParticipantInfo>) -> ReplayInfo {
    ReplayInfo {
        map_name: "Test Arena".to_string(),
        local_map_path: None,
        game_duration_loops: 20_000,
        players,
    }
}

/// Replay file contents understood by the scripted engine.
#[must_use]
pub fn replay_bytes(info: &ReplayInfo) -> Vec<u8> {
    serde_json::to_vec(info).unwrap_or_default()
}

fn plane(size: Size2D, game_loop: u32, layer_index: usize) -> ImageData {
    let data = (0..size.area())
        .map(|i| ((i + layer_index + game_loop as usize) % 4) as u8)
        .collect();
    ImageData::from_u8(size, data)
}

/// Observation with every feature plane present at `map_size` resolution.
///
/// Plane contents and counters vary with `game_loop` and `player_id` so
/// records from different frames and viewpoints differ.
#[must_use]
pub fn observation(game_loop: u32, map_size: u32, player_id: u32) -> Observation {
    let size = Size2D::square(map_size);
    Observation {
        game_loop,
        player_common: PlayerCommon {
            player_id,
            minerals: 50 + game_loop / 8,
            vespene: game_loop / 32,
            food_used: 12,
            food_cap: 15,
            food_workers: 12,
            ..Default::default()
        },
        score: Score {
            score: game_loop as i32,
            score_details: ScoreDetails {
                collected_minerals: game_loop as f32,
                ..Default::default()
            },
        },
        raw_units: Vec::new(),
        feature_layer_data: FeatureLayerData {
            renders: SCREEN_LAYERS
                .iter()
                .enumerate()
                .map(|(i, l)| (l.name.to_string(), plane(size, game_loop, i)))
                .collect(),
            minimap_renders: MINIMAP_LAYERS
                .iter()
                .enumerate()
                .map(|(i, l)| (l.name.to_string(), plane(size, game_loop, i)))
                .collect(),
        },
    }
}
