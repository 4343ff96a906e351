// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a training run in order:
//
//   Step 1: Validate the configuration
//   Step 2: Load train/validation record stores   (Layer 4 - data)
//   Step 3: Restrict to fine-tune styles          (Layer 4 - data)
//   Step 4: Pick the backend, open a session      (Layer 5 - ml)
//   Step 5: Build the trainer and run it          (Layer 5 - ml)

use std::path::PathBuf;

use anyhow::{Context, Result};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use crate::data::dataset::{GlyphDataset, RecordStoreSource};
use crate::domain::error::{GanError, GanResult};
use crate::domain::style::{FineTuneScope, FineTuneSet};
use crate::domain::traits::ExampleSource;
use crate::ml::losses::LossWeights;
use crate::ml::model::ModelConfig;
use crate::ml::session::Session;
use crate::ml::trainer::{build_trainer, BuildMode, TrainingReport};

// ─── Training Configuration ──────────────────────────────────────────────────
// Every option of a training run. Saved as train_config.json next
// to the checkpoints so a run can be inspected later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub experiment_dir:    String,
    pub experiment_id:     usize,
    pub image_size:        usize,
    pub l1_penalty:        f64,
    pub lconst_penalty:    f64,
    pub ltv_penalty:       f64,
    pub lcategory_penalty: f64,
    pub embedding_num:     usize,
    pub embedding_dim:     usize,
    pub epoch:             usize,
    pub batch_size:        usize,
    pub lr:                f64,
    /// Epochs between learning-rate halvings
    pub schedule:          usize,
    pub resume:            bool,
    pub freeze_encoder:    bool,
    /// Comma-separated style ids, e.g. "1,4,7"
    pub fine_tune:         Option<String>,
    pub inst_norm:         bool,
    pub sample_steps:      usize,
    pub checkpoint_steps:  usize,
    pub flip_labels:       bool,
    pub no_val:            bool,

    pub generator_dim:     usize,
    pub discriminator_dim: usize,
    pub min_lr:            f64,
    pub beta1:             f64,
    pub seed:              u64,
    pub augment:           bool,
    pub fine_tune_scope:   FineTuneScope,
    pub max_bad_record_fraction: f64,
    pub log_steps:         usize,
    pub cpu:               bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            experiment_dir:    "experiment".to_string(),
            experiment_id:     0,
            image_size:        128,
            l1_penalty:        100.0,
            lconst_penalty:    15.0,
            ltv_penalty:       0.0,
            lcategory_penalty: 1.0,
            embedding_num:     40,
            embedding_dim:     128,
            epoch:             100,
            batch_size:        16,
            lr:                0.001,
            schedule:          10,
            resume:            true,
            freeze_encoder:    false,
            fine_tune:         None,
            inst_norm:         false,
            sample_steps:      10,
            checkpoint_steps:  500,
            flip_labels:       false,
            no_val:            false,
            generator_dim:     64,
            discriminator_dim: 64,
            min_lr:            0.0002,
            beta1:             0.5,
            seed:              42,
            augment:           false,
            fine_tune_scope:   FineTuneScope::Embedding,
            max_bad_record_fraction: 0.1,
            log_steps:         1,
            cpu:               false,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> GanResult<()> {
        let penalties = [
            ("L1_penalty", self.l1_penalty),
            ("Lconst_penalty", self.lconst_penalty),
            ("Ltv_penalty", self.ltv_penalty),
            ("Lcategory_penalty", self.lcategory_penalty),
        ];
        for (name, value) in penalties {
            if !value.is_finite() || value < 0.0 {
                return Err(GanError::config(format!("{name} must be a non-negative number, got {value}")));
            }
        }
        if !(16..=512).contains(&self.image_size) || !self.image_size.is_power_of_two() {
            return Err(GanError::config(format!(
                "image_size must be a power of two in [16, 512], got {}", self.image_size
            )));
        }
        let counts = [
            ("embedding_num", self.embedding_num),
            ("embedding_dim", self.embedding_dim),
            ("batch_size", self.batch_size),
            ("schedule", self.schedule),
            ("sample_steps", self.sample_steps),
            ("checkpoint_steps", self.checkpoint_steps),
            ("generator_dim", self.generator_dim),
            ("discriminator_dim", self.discriminator_dim),
            ("log_steps", self.log_steps),
        ];
        if let Some((name, _)) = counts.iter().find(|(_, v)| *v == 0) {
            return Err(GanError::config(format!("{name} must be positive")));
        }
        if !(self.lr.is_finite() && self.lr > 0.0) {
            return Err(GanError::config(format!("lr must be positive, got {}", self.lr)));
        }
        if !(self.min_lr >= 0.0 && self.min_lr <= self.lr) {
            return Err(GanError::config(format!(
                "min_lr must lie in [0, lr], got {} with lr {}", self.min_lr, self.lr
            )));
        }
        if !(0.0..1.0).contains(&self.beta1) {
            return Err(GanError::config(format!("beta1 must lie in [0, 1), got {}", self.beta1)));
        }
        if !(0.0..=1.0).contains(&self.max_bad_record_fraction) {
            return Err(GanError::config("max_bad_record_fraction must lie in [0, 1]"));
        }
        if let Some(set) = self.fine_tune_set()? {
            if let Some(max) = set.max_id().filter(|&id| id >= self.embedding_num) {
                return Err(GanError::config(format!(
                    "fine_tune style id {max} is outside [0, {})", self.embedding_num
                )));
            }
        }
        Ok(())
    }

    pub fn fine_tune_set(&self) -> GanResult<Option<FineTuneSet>> {
        match &self.fine_tune {
            Some(list) => FineTuneSet::parse(list),
            None => Ok(None),
        }
    }

    pub fn model_config(&self) -> ModelConfig {
        ModelConfig::new(self.image_size, self.embedding_num, self.embedding_dim)
            .with_generator_dim(self.generator_dim)
            .with_discriminator_dim(self.discriminator_dim)
            .with_inst_norm(self.inst_norm)
    }

    pub fn loss_weights(&self) -> LossWeights {
        LossWeights {
            l1:       self.l1_penalty,
            constant: self.lconst_penalty,
            tv:       self.ltv_penalty,
            category: self.lcategory_penalty,
        }
    }

    /// `max(lr · 0.5^⌊epoch / schedule⌋, min_lr)`
    pub fn learning_rate(&self, epoch: usize) -> f64 {
        let halvings = (epoch / self.schedule.max(1)) as i32;
        (self.lr * 0.5f64.powi(halvings)).max(self.min_lr)
    }

    pub fn build_mode(&self) -> BuildMode {
        BuildMode {
            is_training:      true,
            inst_norm:        self.inst_norm,
            no_target_source: self.flip_labels,
        }
    }

    fn root(&self) -> PathBuf {
        PathBuf::from(&self.experiment_dir)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root().join("data")
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        self.root().join("checkpoint").join(format!("experiment_{}", self.experiment_id))
    }

    pub fn sample_dir(&self) -> PathBuf {
        self.root().join("sample").join(format!("experiment_{}", self.experiment_id))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root().join("logs").join(format!("experiment_{}", self.experiment_id))
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TrainingReport> {
        let cfg = &self.config;

        // ── Step 1: Validate ──────────────────────────────────────────────────
        cfg.validate().context("Rejected training configuration")?;

        // ── Step 2: Load record stores ────────────────────────────────────────
        let data_dir = cfg.data_dir();
        let train = load_store(cfg, data_dir.join("train.obj"))?;
        let val = if data_dir.join("val.obj").exists() {
            load_store(cfg, data_dir.join("val.obj"))?
        } else {
            tracing::warn!("No validation store in '{}', sampling disabled", data_dir.display());
            GlyphDataset::new(Vec::new())
        };
        tracing::info!(
            "Loaded {} train, {} validation examples",
            train.examples().len(),
            val.examples().len()
        );

        // ── Step 3 + 4 + 5: Session, trainer, run ─────────────────────────────
        let report = if cfg.cpu {
            type Cpu = burn::backend::Autodiff<burn::backend::NdArray>;
            tracing::info!("Using NdArray (CPU) backend");
            train_with::<Cpu>(Default::default(), cfg.clone(), train, val)?
        } else {
            type Gpu = burn::backend::Autodiff<burn::backend::Wgpu>;
            let device = burn::backend::wgpu::WgpuDevice::default();
            tracing::info!("Using WGPU device: {:?}", device);
            train_with::<Gpu>(device, cfg.clone(), train, val)?
        };

        tracing::info!(
            "Training finished: {} batches, {} checkpoints, final step {}",
            report.batches, report.checkpoints_written, report.final_step
        );
        Ok(report)
    }
}

fn load_store(cfg: &TrainConfig, path: PathBuf) -> Result<GlyphDataset> {
    let source = RecordStoreSource::new(&path, cfg.image_size, cfg.embedding_num)
        .with_tolerance(cfg.batch_size, cfg.max_bad_record_fraction);
    let examples = source
        .load_examples()
        .with_context(|| format!("Failed to load record store '{}'", path.display()))?;
    Ok(GlyphDataset::new(examples))
}

/// Run a full training session on backend `B`. Used by the CLI and
/// directly by integration tests.
pub fn train_with<B: AutodiffBackend>(
    device: B::Device,
    config: TrainConfig,
    mut train: GlyphDataset,
    mut val: GlyphDataset,
) -> Result<TrainingReport> {
    // ── Step 3: Fine-tune restriction ─────────────────────────────────────────
    if let Some(set) = config.fine_tune_set()? {
        train.retain_styles(|s| set.contains(s));
        val.retain_styles(|s| set.contains(s));
        tracing::info!(
            "Fine-tuning styles {:?}: {} train examples remain",
            set.ids().collect::<Vec<_>>(),
            train.examples().len()
        );
    }

    // ── Step 4: Session ───────────────────────────────────────────────────────
    let session = Session::<B>::new(device, config.seed);
    let mode = config.build_mode();

    // ── Step 5: Build + run ───────────────────────────────────────────────────
    let mut trainer = build_trainer(session, config, mode, train, val)
        .context("Failed to build the trainer")?;
    let report = trainer.run().context("Training stopped with an error")?;
    Ok(report)
}
