//! Observation model returned by the simulation engine at a captured frame.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Size2D {
    /// Columns.
    pub x: u32,
    /// Rows.
    pub y: u32,
}

impl Size2D {
    /// Create a size.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Square size.
    #[must_use]
    pub const fn square(n: u32) -> Self {
        Self { x: n, y: n }
    }

    /// Number of pixels.
    #[must_use]
    pub const fn area(self) -> usize {
        self.x as usize * self.y as usize
    }
}

/// One packed feature plane.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageData {
    /// Pixel depth: 1, 8, 16 or 32.
    pub bits_per_pixel: u32,
    /// Plane dimensions.
    pub size: Size2D,
    /// Row-major packed pixels.
    pub data: Vec<u8>,
}

impl ImageData {
    /// Wrap a plane of 8-bit pixels.
    #[must_use]
    pub fn from_u8(size: Size2D, data: Vec<u8>) -> Self {
        Self {
            bits_per_pixel: 8,
            size,
            data,
        }
    }

    /// Wrap a plane of 32-bit pixels.
    #[must_use]
    pub fn from_i32(size: Size2D, values: &[i32]) -> Self {
        Self {
            bits_per_pixel: 32,
            size,
            data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    /// Number of bytes a plane of this size and depth must carry.
    fn expected_len(&self) -> usize {
        let area = self.size.area();
        match self.bits_per_pixel {
            1 => area.div_ceil(8),
            bits => area * (bits as usize / 8),
        }
    }

    /// Decode the plane into one integer per pixel, row-major.
    ///
    /// 1-bit planes are packed most significant bit first; 16- and 32-bit
    /// planes are little-endian.
    ///
    /// # Errors
    /// Returns an error for an unsupported depth or a buffer whose length does
    /// not match the plane size.
    pub fn unpack(&self, layer: &str) -> Result<Vec<i32>> {
        if !matches!(self.bits_per_pixel, 1 | 8 | 16 | 32) {
            return Err(CoreError::UnsupportedPixelDepth {
                layer: layer.to_string(),
                bits: self.bits_per_pixel,
            });
        }
        let expected = self.expected_len();
        if self.data.len() != expected {
            return Err(CoreError::LayerDataLength {
                layer: layer.to_string(),
                actual: self.data.len(),
                expected,
            });
        }

        let area = self.size.area();
        let values = match self.bits_per_pixel {
            1 => (0..area)
                .map(|i| i32::from((self.data[i / 8] >> (7 - i % 8)) & 1))
                .collect(),
            8 => self.data.iter().map(|&b| i32::from(b)).collect(),
            16 => self
                .data
                .chunks_exact(2)
                .map(|c| i32::from(u16::from_le_bytes([c[0], c[1]])))
                .collect(),
            _ => self
                .data
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        };
        Ok(values)
    }
}

/// Spatial planes keyed by layer name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeatureLayerData {
    /// Screen planes.
    #[serde(default)]
    pub renders: BTreeMap<String, ImageData>,
    /// Minimap planes.
    #[serde(default)]
    pub minimap_renders: BTreeMap<String, ImageData>,
}

/// Per-player economy and army counters.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerCommon {
    pub player_id: u32,
    pub minerals: u32,
    pub vespene: u32,
    pub food_used: u32,
    pub food_cap: u32,
    pub food_army: u32,
    pub food_workers: u32,
    pub idle_worker_count: u32,
    pub army_count: u32,
    pub warp_gate_count: u32,
    pub larva_count: u32,
}

/// Cumulative score breakdown.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreDetails {
    pub idle_production_time: f32,
    pub idle_worker_time: f32,
    pub total_value_units: f32,
    pub total_value_structures: f32,
    pub killed_value_units: f32,
    pub killed_value_structures: f32,
    pub collected_minerals: f32,
    pub collected_vespene: f32,
    pub collection_rate_minerals: f32,
    pub collection_rate_vespene: f32,
    pub spent_minerals: f32,
    pub spent_vespene: f32,
}

/// Aggregate score plus its breakdown.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Score {
    pub score: i32,
    pub score_details: ScoreDetails,
}

/// Raw state of one unit.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawUnit {
    pub tag: u64,
    pub unit_type: u32,
    pub owner: u32,
    pub pos: (f32, f32),
    pub health: f32,
}

/// Everything the engine reports at a captured frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Observation {
    /// Game-loop counter at capture time.
    pub game_loop: u32,
    /// Economy and army counters of the observed player.
    #[serde(default)]
    pub player_common: PlayerCommon,
    /// Score of the observed player.
    #[serde(default)]
    pub score: Score,
    /// Raw unit state.
    #[serde(default)]
    pub raw_units: Vec<RawUnit>,
    /// Spatial feature planes.
    #[serde(default)]
    pub feature_layer_data: FeatureLayerData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpack_u8() {
        let plane = ImageData::from_u8(Size2D::new(2, 2), vec![0, 1, 2, 255]);
        assert_eq!(plane.unpack("t").unwrap(), vec![0, 1, 2, 255]);
    }

    #[test]
    fn test_unpack_bits_msb_first() {
        let plane = ImageData {
            bits_per_pixel: 1,
            size: Size2D::new(3, 3),
            data: vec![0b1010_0000, 0b1000_0000],
        };
        assert_eq!(
            plane.unpack("t").unwrap(),
            vec![1, 0, 1, 0, 0, 0, 0, 0, 1]
        );
    }

    #[test]
    fn test_unpack_u16_little_endian() {
        let plane = ImageData {
            bits_per_pixel: 16,
            size: Size2D::new(2, 1),
            data: vec![0x01, 0x02, 0xff, 0xff],
        };
        assert_eq!(plane.unpack("t").unwrap(), vec![0x0201, 0xffff]);
    }

    #[test]
    fn test_unpack_i32() {
        let plane = ImageData::from_i32(Size2D::new(3, 1), &[-1, 0, 1962]);
        assert_eq!(plane.unpack("t").unwrap(), vec![-1, 0, 1962]);
    }

    #[test]
    fn test_unpack_rejects_bad_depth() {
        let plane = ImageData {
            bits_per_pixel: 24,
            size: Size2D::new(1, 1),
            data: vec![0, 0, 0],
        };
        assert!(matches!(
            plane.unpack("screen creep"),
            Err(CoreError::UnsupportedPixelDepth { bits: 24, .. })
        ));
    }

    #[test]
    fn test_unpack_rejects_short_buffer() {
        let plane = ImageData::from_u8(Size2D::new(4, 4), vec![0; 15]);
        assert!(matches!(
            plane.unpack("screen creep"),
            Err(CoreError::LayerDataLength {
                actual: 15,
                expected: 16,
                ..
            })
        ));
    }
}
