// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Loads the latest generator of an experiment and renders source
// glyphs in a chosen style. Runs on a plain (non-autodiff)
// backend, so dropout is off.

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::batcher::GlyphBatcher;
use crate::domain::error::{GanError, GanResult};
use crate::domain::example::Example;
use crate::domain::style::StyleId;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::generator::Generator;
use crate::ml::model::ModelConfig;

pub struct Inferencer<B: Backend> {
    generator:    Generator<B>,
    model_config: ModelConfig,
    step:         usize,
    device:       B::Device,
}

impl<B: Backend> Inferencer<B> {
    pub fn from_checkpoint(ckpt: &CheckpointManager, device: B::Device) -> GanResult<Self> {
        let model_config = ckpt.load_model_config()?.ok_or_else(|| {
            GanError::checkpoint(format!(
                "no model_config.json under '{}'. Have you run 'train' first?",
                ckpt.dir().display()
            ))
        })?;
        let generator: Generator<B> = model_config.init_generator(&device);
        let (generator, step) = ckpt.load_latest_generator(generator, &device)?;
        tracing::info!("Generator loaded from checkpoint step {}", step);
        Ok(Self { generator, model_config, step, device })
    }

    pub fn model_config(&self) -> &ModelConfig {
        &self.model_config
    }

    pub fn step(&self) -> usize {
        self.step
    }

    /// Render the source half of every example in `style`,
    /// `batch_size` examples at a time. Output order matches input.
    pub fn generate(
        &self,
        examples:   &[Example],
        style:      StyleId,
        batch_size: usize,
    ) -> GanResult<Vec<Vec<f32>>> {
        let style   = StyleId::checked(style.index(), self.model_config.embedding_num)?;
        let size    = self.model_config.image_size;
        let batcher = GlyphBatcher::<B>::new(self.device.clone());

        let mut out = Vec::with_capacity(examples.len());
        for chunk in examples.chunks(batch_size.max(1)) {
            let batch  = batcher.batch(chunk.to_vec());
            let styles = vec![style; chunk.len()];
            let image  = self.generator.generate(batch.source, &styles)?.image;
            let values = image
                .into_data()
                .convert::<f32>()
                .to_vec::<f32>()
                .map_err(|e| GanError::data(format!("cannot read generated pixels: {e:?}")))?;
            out.extend(values.chunks(size * size).map(<[f32]>::to_vec));
        }
        tracing::debug!("Generated {} glyphs in style {}", out.len(), style);
        Ok(out)
    }
}
