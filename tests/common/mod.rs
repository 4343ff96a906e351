#![allow(dead_code)]

use std::path::Path;

use burn::backend::{Autodiff, NdArray};
use glyph_gan::application::train_use_case::TrainConfig;
use glyph_gan::data::dataset::GlyphDataset;
use glyph_gan::domain::example::{Example, ExampleLabel, ImagePair};
use glyph_gan::domain::style::StyleId;

pub type TrainBackend = Autodiff<NdArray>;

pub const SIZE: usize = 16;

/// Deterministic glyph-like pair: a bar whose position depends on
/// the index, drawn thicker in the target.
pub fn example(index: usize, style: usize) -> Example {
    let col = index % SIZE;
    let source: Vec<f32> = (0..SIZE * SIZE)
        .map(|p| if p % SIZE == col { 1.0 } else { -1.0 })
        .collect();
    let target: Vec<f32> = (0..SIZE * SIZE)
        .map(|p| if (p % SIZE).abs_diff(col) <= style { 1.0 } else { -1.0 })
        .collect();
    Example::new(
        StyleId(style),
        ImagePair::new(SIZE, source, target),
        ExampleLabel::Sequence(index as u32),
    )
}

/// `n` examples alternating between `styles` styles.
pub fn dataset(n: usize, styles: usize) -> GlyphDataset {
    GlyphDataset::new((0..n).map(|i| example(i, i % styles)).collect())
}

pub fn tiny_config(dir: &Path) -> TrainConfig {
    TrainConfig {
        experiment_dir:    dir.display().to_string(),
        image_size:        SIZE,
        embedding_num:     2,
        embedding_dim:     4,
        generator_dim:     2,
        discriminator_dim: 2,
        epoch:             1,
        batch_size:        10,
        checkpoint_steps:  5,
        sample_steps:      1000,
        no_val:            true,
        resume:            true,
        cpu:               true,
        ..TrainConfig::default()
    }
}
