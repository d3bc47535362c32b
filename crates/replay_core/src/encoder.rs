//! Observation → fixed-shape feature tensors.
//!
//! Shapes depend only on the layer table and the capture resolution, never on
//! game state, so every record of a dataset has the same layout.

use serde::{Deserialize, Serialize};

use crate::engine::CaptureConfig;
use crate::error::{CoreError, Result};
use crate::features::{FeatureLayer, MINIMAP_LAYERS, SCREEN_LAYERS};
use crate::observation::{ImageData, Observation, Size2D};

/// Length of the `player` vector.
pub const PLAYER_LEN: usize = 11;
/// Length of the `score` vector.
pub const SCORE_LEN: usize = 13;

/// Dense row-major array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor<T> {
    /// Dimensions, outermost first.
    pub shape: Vec<usize>,
    /// Elements in row-major order.
    pub data: Vec<T>,
}

impl<T> Tensor<T> {
    /// Number of elements implied by the shape.
    #[must_use]
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Element at a multi-dimensional index.
    #[must_use]
    pub fn get(&self, index: &[usize]) -> Option<&T> {
        if index.len() != self.shape.len() || index.iter().zip(&self.shape).any(|(i, d)| i >= d) {
            return None;
        }
        let flat = index
            .iter()
            .zip(&self.shape)
            .fold(0, |acc, (i, d)| acc * d + i);
        self.data.get(flat)
    }
}

/// Encoded form of one observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTensors {
    /// `[screen layers, y, x]`, each plane divided by its scale.
    pub screen: Tensor<f32>,
    /// `[minimap layers, y, x]`, each plane divided by its scale.
    pub minimap: Tensor<f32>,
    /// Game loop − 1, minerals, vespene, food used/cap/army/workers, idle
    /// workers, army count, warp gates, larva.
    pub player: [i32; PLAYER_LEN],
    /// Score followed by the twelve score-breakdown fields.
    pub score: [i32; SCORE_LEN],
}

/// Tensor shapes produced for a given capture resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationSpec {
    /// Shape of `screen`.
    pub screen: [usize; 3],
    /// Shape of `minimap`.
    pub minimap: [usize; 3],
    /// Shape of `player`.
    pub player: [usize; 1],
    /// Shape of `score`.
    pub score: [usize; 1],
}

/// Encodes observations captured at a fixed resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureEncoder {
    screen_size: Size2D,
    minimap_size: Size2D,
}

impl FeatureEncoder {
    /// Encoder for observations captured with `config`.
    #[must_use]
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            screen_size: config.screen_size(),
            minimap_size: config.minimap_size(),
        }
    }

    /// Shapes of the tensors [`encode`](Self::encode) returns.
    #[must_use]
    pub fn observation_spec(&self) -> ObservationSpec {
        ObservationSpec {
            screen: [
                SCREEN_LAYERS.len(),
                self.screen_size.y as usize,
                self.screen_size.x as usize,
            ],
            minimap: [
                MINIMAP_LAYERS.len(),
                self.minimap_size.y as usize,
                self.minimap_size.x as usize,
            ],
            player: [PLAYER_LEN],
            score: [SCORE_LEN],
        }
    }

    /// Encode one observation.
    ///
    /// # Errors
    /// Fails if a plane from the layer table is missing, has the wrong size,
    /// or cannot be decoded.
    pub fn encode(&self, obs: &Observation) -> Result<FeatureTensors> {
        let planes = &obs.feature_layer_data;
        let screen = stack_layers(SCREEN_LAYERS, self.screen_size, |name| {
            planes.renders.get(name)
        })?;
        let minimap = stack_layers(MINIMAP_LAYERS, self.minimap_size, |name| {
            planes.minimap_renders.get(name)
        })?;

        let pc = &obs.player_common;
        let player = [
            saturate(i64::from(obs.game_loop) - 1),
            saturate(i64::from(pc.minerals)),
            saturate(i64::from(pc.vespene)),
            saturate(i64::from(pc.food_used)),
            saturate(i64::from(pc.food_cap)),
            saturate(i64::from(pc.food_army)),
            saturate(i64::from(pc.food_workers)),
            saturate(i64::from(pc.idle_worker_count)),
            saturate(i64::from(pc.army_count)),
            saturate(i64::from(pc.warp_gate_count)),
            saturate(i64::from(pc.larva_count)),
        ];

        let details = &obs.score.score_details;
        let score = [
            obs.score.score,
            details.idle_production_time as i32,
            details.idle_worker_time as i32,
            details.total_value_units as i32,
            details.total_value_structures as i32,
            details.killed_value_units as i32,
            details.killed_value_structures as i32,
            details.collected_minerals as i32,
            details.collected_vespene as i32,
            details.collection_rate_minerals as i32,
            details.collection_rate_vespene as i32,
            details.spent_minerals as i32,
            details.spent_vespene as i32,
        ];

        Ok(FeatureTensors {
            screen,
            minimap,
            player,
            score,
        })
    }
}

fn saturate(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

fn stack_layers<'a>(
    layers: &[FeatureLayer],
    size: Size2D,
    lookup: impl Fn(&str) -> Option<&'a ImageData>,
) -> Result<Tensor<f32>> {
    let mut data = Vec::with_capacity(layers.len() * size.area());

    for layer in layers {
        let plane = lookup(layer.name).ok_or_else(|| CoreError::MissingLayer {
            layer: layer.full_name(),
        })?;
        if plane.size != size {
            return Err(CoreError::LayerSizeMismatch {
                layer: layer.full_name(),
                actual_x: plane.size.x,
                actual_y: plane.size.y,
                expected_x: size.x,
                expected_y: size.y,
            });
        }
        let scale = layer.scale as f32;
        data.extend(
            plane
                .unpack(&layer.full_name())?
                .into_iter()
                .map(|v| v as f32 / scale),
        );
    }

    Ok(Tensor {
        shape: vec![layers.len(), size.y as usize, size.x as usize],
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{FeatureLayerData, PlayerCommon, RawUnit, Score, ScoreDetails};

    fn filled_planes(layers: &[FeatureLayer], size: Size2D, value: u8) -> Vec<(String, ImageData)> {
        layers
            .iter()
            .map(|l| {
                (
                    l.name.to_string(),
                    ImageData::from_u8(size, vec![value; size.area()]),
                )
            })
            .collect()
    }

    fn observation(size: Size2D, value: u8) -> Observation {
        Observation {
            game_loop: 96,
            feature_layer_data: FeatureLayerData {
                renders: filled_planes(SCREEN_LAYERS, size, value).into_iter().collect(),
                minimap_renders: filled_planes(MINIMAP_LAYERS, size, value)
                    .into_iter()
                    .collect(),
            },
            ..Default::default()
        }
    }

    fn encoder(map_size: u32) -> FeatureEncoder {
        FeatureEncoder::new(&CaptureConfig::spatial(map_size, 24.0))
    }

    #[test]
    fn test_shapes_match_observation_spec() {
        let encoder = encoder(8);
        let out = encoder.encode(&observation(Size2D::square(8), 1)).unwrap();
        let spec = encoder.observation_spec();

        assert_eq!(out.screen.shape, spec.screen.to_vec());
        assert_eq!(out.minimap.shape, spec.minimap.to_vec());
        assert_eq!(out.screen.shape, vec![8, 8, 8]);
        assert_eq!(out.minimap.shape, vec![4, 8, 8]);
        assert_eq!(out.screen.data.len(), out.screen.numel());
        assert_eq!(out.player.len(), 11);
        assert_eq!(out.score.len(), 13);
    }

    #[test]
    fn test_shapes_independent_of_units() {
        let encoder = encoder(4);
        let empty = observation(Size2D::square(4), 0);
        let mut crowded = empty.clone();
        crowded.raw_units = (0..50)
            .map(|i| RawUnit {
                tag: i,
                unit_type: 48,
                owner: 1,
                ..Default::default()
            })
            .collect();

        let a = encoder.encode(&empty).unwrap();
        let b = encoder.encode(&crowded).unwrap();
        assert_eq!(a.screen.shape, b.screen.shape);
        assert_eq!(a.minimap.shape, b.minimap.shape);
    }

    #[test]
    fn test_values_divided_by_scale() {
        let encoder = encoder(2);
        let mut obs = observation(Size2D::square(2), 0);
        obs.feature_layer_data.renders.insert(
            "player_relative".to_string(),
            ImageData::from_u8(Size2D::square(2), vec![0, 1, 4, 5]),
        );
        obs.feature_layer_data.renders.insert(
            "unit_type".to_string(),
            ImageData::from_i32(Size2D::square(2), &[0, 0, 981, 1962]),
        );

        let out = encoder.encode(&obs).unwrap();
        // player_relative is layer 4, scale 5
        assert_eq!(out.screen.get(&[4, 0, 1]), Some(&0.2));
        assert_eq!(out.screen.get(&[4, 1, 1]), Some(&1.0));
        // unit_type is layer 5, scale 1962
        assert_eq!(out.screen.get(&[5, 1, 0]), Some(&0.5));
        assert_eq!(out.screen.get(&[5, 1, 1]), Some(&1.0));
    }

    #[test]
    fn test_player_and_score_vectors() {
        let encoder = encoder(2);
        let mut obs = observation(Size2D::square(2), 0);
        obs.game_loop = 200;
        obs.player_common = PlayerCommon {
            minerals: 50,
            vespene: 25,
            food_used: 12,
            food_cap: 15,
            food_army: 0,
            food_workers: 12,
            idle_worker_count: 1,
            army_count: 0,
            warp_gate_count: 0,
            larva_count: 3,
            ..Default::default()
        };
        obs.score = Score {
            score: 1000,
            score_details: ScoreDetails {
                collected_minerals: 450.0,
                spent_minerals: 400.9,
                ..Default::default()
            },
        };

        let out = encoder.encode(&obs).unwrap();
        assert_eq!(out.player, [199, 50, 25, 12, 15, 0, 12, 1, 0, 0, 3]);
        assert_eq!(out.score[0], 1000);
        assert_eq!(out.score[7], 450);
        assert_eq!(out.score[11], 400);
    }

    #[test]
    fn test_first_loop_gives_negative_player_loop() {
        let encoder = encoder(2);
        let mut obs = observation(Size2D::square(2), 0);
        obs.game_loop = 0;
        assert_eq!(encoder.encode(&obs).unwrap().player[0], -1);
    }

    #[test]
    fn test_missing_layer_is_error() {
        let encoder = encoder(2);
        let mut obs = observation(Size2D::square(2), 0);
        obs.feature_layer_data.minimap_renders.remove("creep");

        let err = encoder.encode(&obs).unwrap_err();
        assert!(matches!(err, CoreError::MissingLayer { ref layer } if layer == "minimap creep"));
    }

    #[test]
    fn test_wrong_resolution_is_error() {
        let encoder = encoder(4);
        let obs = observation(Size2D::square(2), 0);
        assert!(matches!(
            encoder.encode(&obs),
            Err(CoreError::LayerSizeMismatch { expected_x: 4, actual_x: 2, .. })
        ));
    }

    #[test]
    fn test_encode_is_deterministic() {
        let encoder = encoder(3);
        let obs = observation(Size2D::square(3), 2);
        assert_eq!(encoder.encode(&obs).unwrap(), encoder.encode(&obs).unwrap());
    }
}
