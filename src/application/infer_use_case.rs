// ============================================================
// Layer 2 — InferUseCase
// ============================================================
// Offline glyph generation with a trained experiment:
//
//   Step 1: Load the latest generator            (Layer 5 - ml)
//   Step 2: Read the source record store         (Layer 4 - data)
//   Step 3: Generate in the requested style      (Layer 5 - ml)
//   Step 4: Write one PNG per glyph              (Layer 6 - infra)

use std::path::PathBuf;

use anyhow::{Context, Result};
use burn::prelude::Backend;
use serde::{Deserialize, Serialize};

use crate::data::dataset::RecordStoreSource;
use crate::domain::style::StyleId;
use crate::domain::traits::ExampleSource;
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::sampler::GlyphWriter;
use crate::ml::inferencer::Inferencer;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferConfig {
    pub experiment_dir: String,
    pub experiment_id:  usize,
    /// Record store whose source halves are rendered
    pub source_obj:     String,
    pub style_id:       usize,
    pub output_dir:     String,
    pub batch_size:     usize,
    pub cpu:            bool,
}

impl InferConfig {
    pub fn checkpoint_dir(&self) -> PathBuf {
        PathBuf::from(&self.experiment_dir)
            .join("checkpoint")
            .join(format!("experiment_{}", self.experiment_id))
    }
}

pub struct InferUseCase {
    config: InferConfig,
}

impl InferUseCase {
    pub fn new(config: InferConfig) -> Self {
        Self { config }
    }

    /// Returns the paths of the written glyph images.
    pub fn execute(&self) -> Result<Vec<PathBuf>> {
        if self.config.cpu {
            self.execute_on::<burn::backend::NdArray>(Default::default())
        } else {
            self.execute_on::<burn::backend::Wgpu>(burn::backend::wgpu::WgpuDevice::default())
        }
    }

    pub fn execute_on<B: Backend>(&self, device: B::Device) -> Result<Vec<PathBuf>> {
        let cfg = &self.config;

        // ── Step 1: Generator ─────────────────────────────────────────────────
        let ckpt = CheckpointManager::new(cfg.checkpoint_dir());
        let inferencer = Inferencer::<B>::from_checkpoint(&ckpt, device)
            .context("Cannot load the trained generator")?;
        let model = inferencer.model_config();

        // ── Step 2: Source glyphs ─────────────────────────────────────────────
        let examples = RecordStoreSource::new(&cfg.source_obj, model.image_size, model.embedding_num)
            .load_examples()
            .with_context(|| format!("Failed to load '{}'", cfg.source_obj))?;
        tracing::info!("Rendering {} glyphs in style {}", examples.len(), cfg.style_id);

        // ── Step 3: Generate ──────────────────────────────────────────────────
        let glyphs = inferencer
            .generate(&examples, StyleId(cfg.style_id), cfg.batch_size)
            .context("Generation failed")?;

        // ── Step 4: Write ─────────────────────────────────────────────────────
        let writer = GlyphWriter::create(PathBuf::from(&cfg.output_dir).as_path())?;
        let mut written = Vec::with_capacity(glyphs.len());
        for (example, pixels) in examples.iter().zip(&glyphs) {
            let name = format!("{}_{}", example.style_id, example.label.file_tag());
            written.push(writer.write(&name, pixels, model.image_size)?);
        }
        tracing::info!("Wrote {} glyphs to '{}'", written.len(), cfg.output_dir);
        Ok(written)
    }
}
