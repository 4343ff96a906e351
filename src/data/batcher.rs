// ============================================================
// Layer 4 — Glyph Batcher
// ============================================================
// Implements Burn's Batcher trait to stack examples into tensors,
// plus the epoch cycler that decides which examples form each
// batch.
//
// How batching works here:
//   Input:  Vec of N Examples, each two S×S images
//   Output: GlyphBatch with image tensors of shape [N, 1, S, S]
//
// The cycler reshuffles once per epoch and always yields full
// batches: the last batch of an epoch wraps around to the start
// of the shuffled order instead of coming up short.

use burn::{data::dataloader::batcher::Batcher, prelude::*};
use rand::{seq::SliceRandom, Rng};

use crate::domain::example::Example;
use crate::domain::style::StyleId;

// ─── GlyphBatch ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct GlyphBatch<B: Backend> {
    /// Reference glyphs — shape: [batch, 1, size, size]
    pub source: Tensor<B, 4>,

    /// Ground-truth target glyphs — shape: [batch, 1, size, size]
    pub target: Tensor<B, 4>,

    /// Style id per example — shape: [batch]
    pub style_ids: Tensor<B, 1, Int>,

    /// Host-side copies used for masks, logging and file names
    pub styles: Vec<StyleId>,
    pub labels: Vec<String>,
}

impl<B: Backend> GlyphBatch<B> {
    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// Exchange source and target (the no-target-source mode).
    pub fn swapped(self) -> Self {
        Self { source: self.target, target: self.source, ..self }
    }
}

// ─── GlyphBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct GlyphBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> GlyphBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    fn images(&self, planes: Vec<&[f32]>, size: usize) -> Tensor<B, 4> {
        let n    = planes.len();
        let flat: Vec<f32> = planes.into_iter().flatten().copied().collect();
        Tensor::<B, 1>::from_floats(flat.as_slice(), &self.device).reshape([n, 1, size, size])
    }
}

impl<B: Backend> Batcher<Example, GlyphBatch<B>> for GlyphBatcher<B> {
    fn batch(&self, items: Vec<Example>) -> GlyphBatch<B> {
        let size = items.first().map(|ex| ex.pair.size).unwrap_or(0);

        let source = self.images(items.iter().map(|ex| ex.pair.source.as_slice()).collect(), size);
        let target = self.images(items.iter().map(|ex| ex.pair.target.as_slice()).collect(), size);

        let ids: Vec<i32> = items.iter().map(|ex| ex.style_id.index() as i32).collect();
        let style_ids = Tensor::<B, 1, Int>::from_ints(ids.as_slice(), &self.device);

        GlyphBatch {
            source,
            target,
            style_ids,
            styles: items.iter().map(|ex| ex.style_id).collect(),
            labels: items.iter().map(|ex| ex.label.file_tag()).collect(),
        }
    }
}

// ─── EpochCycler ──────────────────────────────────────────────────────────────
/// Produces the example indices of every batch in one epoch.
#[derive(Debug, Clone)]
pub struct EpochCycler {
    len:        usize,
    batch_size: usize,
}

impl EpochCycler {
    pub fn new(len: usize, batch_size: usize) -> Self {
        Self { len, batch_size: batch_size.max(1) }
    }

    pub fn batches_per_epoch(&self) -> usize {
        self.len.div_ceil(self.batch_size)
    }

    /// Fresh shuffle, then `batches_per_epoch` index lists of
    /// exactly `batch_size` entries each.
    pub fn epoch<R: Rng>(&self, rng: &mut R) -> Vec<Vec<usize>> {
        if self.len == 0 {
            return Vec::new();
        }
        let mut order: Vec<usize> = (0..self.len).collect();
        order.shuffle(rng);
        (0..self.batches_per_epoch())
            .map(|b| {
                let start = b * self.batch_size;
                (0..self.batch_size)
                    .map(|offset| order[(start + offset) % self.len])
                    .collect()
            })
            .collect()
    }
}

// ─── ValidationWindow ─────────────────────────────────────────────────────────
/// A rolling slice over the validation set so successive samples
/// show different glyphs.
#[derive(Debug, Clone, Default)]
pub struct ValidationWindow {
    start: usize,
}

impl ValidationWindow {
    pub fn next_indices(&mut self, len: usize, batch_size: usize) -> Vec<usize> {
        if len == 0 {
            return Vec::new();
        }
        let idx = (0..batch_size).map(|o| (self.start + o) % len).collect();
        self.start = (self.start + batch_size) % len;
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use rand::{rngs::StdRng, SeedableRng};

    use crate::domain::example::{ExampleLabel, ImagePair};

    type TestBackend = NdArray;

    fn example(style: usize, value: f32) -> Example {
        Example::new(
            StyleId(style),
            ImagePair::new(2, vec![value; 4], vec![-value; 4]),
            ExampleLabel::Sequence(style as u32),
        )
    }

    #[test]
    fn test_batch_shapes_and_halves() {
        let batcher = GlyphBatcher::<TestBackend>::new(Default::default());
        let batch   = batcher.batch(vec![example(0, 0.5), example(1, 0.25)]);

        assert_eq!(batch.source.dims(), [2, 1, 2, 2]);
        assert_eq!(batch.target.dims(), [2, 1, 2, 2]);
        assert_eq!(batch.style_ids.dims(), [2]);
        assert_eq!(batch.styles, vec![StyleId(0), StyleId(1)]);

        let src: Vec<f32> = batch.source.clone().into_data().to_vec().unwrap();
        assert_eq!(&src[..4], &[0.5; 4]);
        let swapped = batch.swapped();
        let src: Vec<f32> = swapped.source.into_data().to_vec().unwrap();
        assert_eq!(&src[..4], &[-0.5; 4]);
    }

    #[test]
    fn test_epoch_covers_every_example_with_full_batches() {
        let cycler  = EpochCycler::new(25, 10);
        let mut rng = StdRng::seed_from_u64(1);
        let batches = cycler.epoch(&mut rng);

        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|b| b.len() == 10));
        let mut seen: Vec<usize> = batches.concat();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 25);
    }

    #[test]
    fn test_epochs_are_reshuffled() {
        let cycler  = EpochCycler::new(50, 50);
        let mut rng = StdRng::seed_from_u64(9);
        let first   = cycler.epoch(&mut rng);
        let second  = cycler.epoch(&mut rng);
        assert_ne!(first, second);
    }

    #[test]
    fn test_exact_division() {
        let cycler = EpochCycler::new(100, 10);
        assert_eq!(cycler.batches_per_epoch(), 10);
        assert!(EpochCycler::new(0, 10).epoch(&mut StdRng::seed_from_u64(0)).is_empty());
    }

    #[test]
    fn test_validation_window_rolls() {
        let mut w = ValidationWindow::default();
        assert_eq!(w.next_indices(5, 3), vec![0, 1, 2]);
        assert_eq!(w.next_indices(5, 3), vec![3, 4, 0]);
        assert_eq!(w.next_indices(5, 3), vec![1, 2, 3]);
    }
}
