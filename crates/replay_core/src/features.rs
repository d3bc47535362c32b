//! Static table of spatial feature layers.
//!
//! The order of each slice is the order of the planes in the encoded
//! `screen`/`minimap` tensors. Changing it changes the dataset format.

use serde::{Deserialize, Serialize};

/// Which group of planes a layer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerSet {
    /// Camera-relative screen planes.
    Screen,
    /// Whole-map minimap planes.
    Minimap,
}

impl LayerSet {
    /// Prefix used in full layer names.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Screen => "screen",
            Self::Minimap => "minimap",
        }
    }
}

/// Numeric meaning of a plane's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    /// Values are ids; `scale` is the number of categories.
    Categorical,
    /// Values are magnitudes; `scale` is the maximum.
    Scalar,
}

/// Colour map used when rendering a plane for inspection. Not used by encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Palette {
    /// Blue-green gradient for terrain height.
    Winter,
    /// Hidden / seen / visible / full-hidden.
    Visibility,
    /// Creep present or not.
    Creep,
    /// Power field present or not.
    Power,
    /// Background / self / ally / neutral / enemy.
    PlayerRelative,
    /// One colour per unit type.
    UnitType,
    /// Black-red-yellow heat map for densities.
    Hot,
}

/// Descriptor of one feature plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeatureLayer {
    /// Name of the plane in the observation.
    pub name: &'static str,
    /// Screen or minimap.
    pub layer_set: LayerSet,
    /// Divisor applied to raw values.
    pub scale: u32,
    /// Categorical or scalar.
    pub kind: FeatureKind,
    /// Rendering palette.
    pub palette: Palette,
}

impl FeatureLayer {
    const fn new(
        name: &'static str,
        layer_set: LayerSet,
        scale: u32,
        kind: FeatureKind,
        palette: Palette,
    ) -> Self {
        Self {
            name,
            layer_set,
            scale,
            kind,
            palette,
        }
    }

    /// Name including the layer set, e.g. `screen unit_type`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.layer_set.prefix(), self.name)
    }
}

use FeatureKind::{Categorical, Scalar};
use LayerSet::{Minimap, Screen};

/// Screen planes in tensor order.
pub const SCREEN_LAYERS: &[FeatureLayer] = &[
    FeatureLayer::new("height_map", Screen, 256, Scalar, Palette::Winter),
    FeatureLayer::new("visibility_map", Screen, 4, Categorical, Palette::Visibility),
    FeatureLayer::new("creep", Screen, 2, Categorical, Palette::Creep),
    FeatureLayer::new("power", Screen, 2, Categorical, Palette::Power),
    FeatureLayer::new("player_relative", Screen, 5, Categorical, Palette::PlayerRelative),
    FeatureLayer::new("unit_type", Screen, 1962, Categorical, Palette::UnitType),
    FeatureLayer::new("unit_density", Screen, 16, Scalar, Palette::Hot),
    FeatureLayer::new("unit_density_aa", Screen, 256, Scalar, Palette::Hot),
];

/// Minimap planes in tensor order.
pub const MINIMAP_LAYERS: &[FeatureLayer] = &[
    FeatureLayer::new("height_map", Minimap, 256, Scalar, Palette::Winter),
    FeatureLayer::new("visibility_map", Minimap, 4, Categorical, Palette::Visibility),
    FeatureLayer::new("creep", Minimap, 2, Categorical, Palette::Creep),
    FeatureLayer::new("player_relative", Minimap, 5, Categorical, Palette::PlayerRelative),
];

/// Layers belonging to `set`, in tensor order.
#[must_use]
pub const fn layers(set: LayerSet) -> &'static [FeatureLayer] {
    match set {
        LayerSet::Screen => SCREEN_LAYERS,
        LayerSet::Minimap => MINIMAP_LAYERS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_counts() {
        assert_eq!(SCREEN_LAYERS.len(), 8);
        assert_eq!(MINIMAP_LAYERS.len(), 4);
    }

    #[test]
    fn test_layers_match_their_set() {
        for set in [LayerSet::Screen, LayerSet::Minimap] {
            assert!(layers(set).iter().all(|l| l.layer_set == set));
        }
    }

    #[test]
    fn test_scales_are_positive() {
        assert!(SCREEN_LAYERS
            .iter()
            .chain(MINIMAP_LAYERS)
            .all(|l| l.scale > 0));
    }

    #[test]
    fn test_full_name() {
        assert_eq!(SCREEN_LAYERS[5].full_name(), "screen unit_type");
        assert_eq!(MINIMAP_LAYERS[0].full_name(), "minimap height_map");
    }

    #[test]
    fn test_minimap_is_subset_of_screen() {
        for layer in MINIMAP_LAYERS {
            assert!(SCREEN_LAYERS.iter().any(|s| s.name == layer.name));
        }
    }
}
