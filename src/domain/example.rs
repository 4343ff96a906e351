// ============================================================
// Layer 3 — Example Domain Type
// ============================================================
// One training example: a style id and a paired raster holding
// the target glyph (left half of the source image file) and the
// reference glyph (right half). Pixels are stored normalised
// to [-1, 1], row-major, one channel.

use crate::domain::style::StyleId;

/// How an example is identified in logs and sample file names.
/// Exactly one form exists per example, depending on how the
/// record store was packaged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExampleLabel {
    /// Position of the record in its store (random-split mode)
    Sequence(u32),
    /// The character the glyph renders (fixed-sample mode)
    Unicode(String),
}

impl ExampleLabel {
    pub fn unicode(&self) -> Option<&str> {
        match self {
            Self::Unicode(s) => Some(s),
            Self::Sequence(_) => None,
        }
    }

    /// Short tag used in generated file names
    pub fn file_tag(&self) -> String {
        match self {
            Self::Sequence(n) => format!("{n:04}"),
            Self::Unicode(s) => s.clone(),
        }
    }
}

/// Two square single-channel images of side `size`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePair {
    pub size:   usize,
    pub source: Vec<f32>,
    pub target: Vec<f32>,
}

impl ImagePair {
    pub fn new(size: usize, source: Vec<f32>, target: Vec<f32>) -> Self {
        debug_assert_eq!(source.len(), size * size);
        debug_assert_eq!(target.len(), size * size);
        Self { size, source, target }
    }

    /// Swap which half acts as the source. Used by the
    /// no-target-source mode to train the reverse mapping.
    pub fn swapped(&self) -> Self {
        Self {
            size:   self.size,
            source: self.target.clone(),
            target: self.source.clone(),
        }
    }
}

/// A decoded, validated example ready for batching.
#[derive(Debug, Clone)]
pub struct Example {
    pub style_id: StyleId,
    pub pair:     ImagePair,
    pub label:    ExampleLabel,
}

impl Example {
    pub fn new(style_id: StyleId, pair: ImagePair, label: ExampleLabel) -> Self {
        Self { style_id, pair, label }
    }
}

/// Map a raw 8-bit pixel into the model's [-1, 1] range.
pub fn normalize_pixel(p: u8) -> f32 {
    p as f32 / 127.5 - 1.0
}

/// Inverse of `normalize_pixel`, clamped so generator overshoot
/// never wraps around.
pub fn denormalize_pixel(v: f32) -> u8 {
    ((v + 1.0) * 127.5).round().clamp(0.0, 255.0) as u8
}
