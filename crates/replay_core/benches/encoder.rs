//! Feature encoder benchmarks for replay_core.
//!
//! Run with: `cargo bench -p replay_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use replay_core::encoder::FeatureEncoder;
use replay_core::engine::CaptureConfig;
use replay_core::features::{MINIMAP_LAYERS, SCREEN_LAYERS};
use replay_core::observation::{FeatureLayerData, ImageData, Observation, Size2D};

fn observation(map_size: u32) -> Observation {
    let size = Size2D::square(map_size);
    let plane = |seed: usize| {
        let values: Vec<i32> = (0..size.area()).map(|i| ((i + seed) % 256) as i32).collect();
        ImageData::from_i32(size, &values)
    };
    Observation {
        game_loop: 1000,
        feature_layer_data: FeatureLayerData {
            renders: SCREEN_LAYERS
                .iter()
                .enumerate()
                .map(|(i, l)| (l.name.to_string(), plane(i)))
                .collect(),
            minimap_renders: MINIMAP_LAYERS
                .iter()
                .enumerate()
                .map(|(i, l)| (l.name.to_string(), plane(i)))
                .collect(),
        },
        ..Default::default()
    }
}

/// Encodes one observation at the default and a large resolution.
pub fn encoder_benchmark(c: &mut Criterion) {
    for map_size in [64, 128] {
        let encoder = FeatureEncoder::new(&CaptureConfig::spatial(map_size, 24.0));
        let obs = observation(map_size);
        c.bench_function(&format!("encode_{map_size}"), |b| {
            b.iter(|| encoder.encode(black_box(&obs)))
        });
    }
}

criterion_group!(benches, encoder_benchmark);
criterion_main!(benches);
