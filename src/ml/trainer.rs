// ============================================================
// Layer 5 — GAN Trainer
// ============================================================
// The stateful training loop.
//
//   UNINITIALIZED ──build──▶ BUILT ──start──▶ RUNNING ──▶ STOPPED
//                                              │    ▲
//                                     every N  ▼    │
//                                          CHECKPOINTING
//
// One batch = one discriminator step, then one generator step:
//   D: real pair vs. pair with detached G(source)
//   G: fool D, match the target (L1), keep encode(source) close
//      to encode(target), stay smooth (tv), keep the style right
//
// Restrictions applied between backward() and the optimizer:
//   freeze_encoder  — encoder gradients are removed, so Adam
//                     leaves those parameters untouched
//   fine_tune       — gradients of per-style rows (embedding and
//                     conditional norm scale/shift) outside the set
//                     are zeroed and the rows are copied back after
//                     the step (Adam moments from a resumed run
//                     would otherwise still move them)
//
// A non-finite loss aborts the step before anything is committed:
// the discriminator update is held back until the generator loss
// has been checked.
//
// Resume restarts the interrupted epoch from a fresh shuffle;
// state.epoch moves on as soon as an epoch's last batch is done.

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    module::{AutodiffModule, Param, ParamId},
    nn::{conv::Conv2d, Linear},
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::{backend::AutodiffBackend, Bool},
};

use crate::application::train_use_case::TrainConfig;
use crate::data::batcher::{EpochCycler, GlyphBatch, GlyphBatcher, ValidationWindow};
use crate::data::dataset::GlyphDataset;
use crate::data::image_pair::augment_pair;
use crate::domain::error::{GanError, GanResult};
use crate::domain::example::Example;
use crate::domain::phase::TrainerPhase;
use crate::domain::style::{FineTuneScope, FineTuneSet, StyleId};
use crate::domain::traits::{SampleSheet, SampleSink};
use crate::infra::checkpoint::{CheckpointManager, TrainingState};
use crate::infra::lock::DirLock;
use crate::infra::metrics::{MetricsLogger, StepMetrics};
use crate::infra::sampler::ImageSampler;
use crate::ml::discriminator::Discriminator;
use crate::ml::generator::Generator;
use crate::ml::losses::{scalar, LossComposer, LossReport};
use crate::ml::model::ModelConfig;
use crate::ml::norm::{DecoderNorm, InstanceNorm2d};
use crate::ml::session::Session;

/// How the networks are built and how batches are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildMode {
    pub is_training:      bool,
    pub inst_norm:        bool,
    /// Swap source and target: always, or on odd steps with flip_labels
    pub no_target_source: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub batches:             usize,
    pub checkpoints_written: usize,
    pub final_step:          usize,
    pub final_epoch:         usize,
    pub phase:               TrainerPhase,
}

// ─── Parameter snapshot ───────────────────────────────────────────────────────
/// Flattened parameter values per partition, for comparisons.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSnapshot {
    pub encoder:                  Vec<f32>,
    pub decoder:                  Vec<f32>,
    pub embedding:                Vec<f32>,
    /// Per style: its scale then shift row from every conditional norm
    pub style_norm:               Vec<Vec<f32>>,
    pub discriminator_trunk:      Vec<f32>,
    pub discriminator_classifier: Vec<f32>,
    pub embedding_dim:            usize,
}

impl ParameterSnapshot {
    pub fn embedding_row(&self, style: StyleId) -> &[f32] {
        let start = style.index() * self.embedding_dim;
        &self.embedding[start..start + self.embedding_dim]
    }

    /// Empty unless the generator uses conditional instance norm.
    pub fn style_norm_row(&self, style: StyleId) -> &[f32] {
        self.style_norm.get(style.index()).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn param_values<B: Backend, const D: usize>(param: &Param<Tensor<B, D>>) -> GanResult<Vec<f32>> {
    param
        .val()
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| GanError::data(format!("cannot read parameter {:?}: {e:?}", param.id)))
}

fn push_param<B: Backend, const D: usize>(out: &mut Vec<f32>, param: &Param<Tensor<B, D>>) -> GanResult<()> {
    out.extend(param_values(param)?);
    Ok(())
}

fn push_conv<B: Backend>(out: &mut Vec<f32>, conv: &Conv2d<B>) -> GanResult<()> {
    push_param(out, &conv.weight)?;
    if let Some(bias) = &conv.bias {
        push_param(out, bias)?;
    }
    Ok(())
}

fn push_linear<B: Backend>(out: &mut Vec<f32>, linear: &Linear<B>) -> GanResult<()> {
    push_param(out, &linear.weight)?;
    if let Some(bias) = &linear.bias {
        push_param(out, bias)?;
    }
    Ok(())
}

fn push_norm<B: Backend>(out: &mut Vec<f32>, norm: &InstanceNorm2d<B>) -> GanResult<()> {
    push_param(out, &norm.gamma)?;
    push_param(out, &norm.beta)
}

impl ParameterSnapshot {
    pub fn capture<B: Backend>(generator: &Generator<B>, discriminator: &Discriminator<B>) -> GanResult<Self> {
        let mut encoder = Vec::new();
        for block in &generator.encoder {
            push_conv(&mut encoder, &block.conv)?;
            if let Some(norm) = &block.norm {
                push_norm(&mut encoder, norm)?;
            }
        }

        let mut decoder = Vec::new();
        for block in &generator.decoder {
            push_param(&mut decoder, &block.deconv.weight)?;
            if let Some(bias) = &block.deconv.bias {
                push_param(&mut decoder, bias)?;
            }
            match &block.norm {
                Some(DecoderNorm::Plain(norm)) => push_norm(&mut decoder, norm)?,
                Some(DecoderNorm::Conditional(norm)) => {
                    push_param(&mut decoder, &norm.gamma)?;
                    push_param(&mut decoder, &norm.beta)?;
                }
                None => {}
            }
        }

        let mut embedding = Vec::new();
        push_param(&mut embedding, &generator.embedding.weight)?;

        let conditional: Vec<_> = per_style_params(generator).into_iter().skip(1).collect();
        let mut style_norm = if conditional.is_empty() {
            Vec::new()
        } else {
            vec![Vec::new(); generator.embedding_rows()]
        };
        for param in conditional {
            let cols   = param.dims()[1];
            let values = param_values(param)?;
            for (row, chunk) in style_norm.iter_mut().zip(values.chunks(cols)) {
                row.extend_from_slice(chunk);
            }
        }

        let mut discriminator_trunk = Vec::new();
        for block in &discriminator.trunk {
            push_conv(&mut discriminator_trunk, &block.conv)?;
            if let Some(norm) = &block.norm {
                push_norm(&mut discriminator_trunk, norm)?;
            }
        }
        push_conv(&mut discriminator_trunk, &discriminator.patch_head)?;

        let mut discriminator_classifier = Vec::new();
        push_linear(&mut discriminator_classifier, &discriminator.classifier_head)?;

        Ok(Self {
            encoder,
            decoder,
            embedding,
            style_norm,
            discriminator_trunk,
            discriminator_classifier,
            embedding_dim: generator.embedding.weight.dims()[1],
        })
    }
}

// ─── Gradient surgery ─────────────────────────────────────────────────────────

fn encoder_param_ids<B: Backend>(generator: &Generator<B>) -> Vec<(ParamId, usize)> {
    let mut ids = Vec::new();
    for block in &generator.encoder {
        ids.push((block.conv.weight.id, 4));
        if let Some(bias) = &block.conv.bias {
            ids.push((bias.id, 1));
        }
        if let Some(norm) = &block.norm {
            ids.push((norm.gamma.id, 1));
            ids.push((norm.beta.id, 1));
        }
    }
    ids
}

fn drop_gradients<B: AutodiffBackend>(grads: &mut GradientsParams, ids: &[(ParamId, usize)]) {
    for &(id, rank) in ids {
        match rank {
            4 => { grads.remove::<B::InnerBackend, 4>(id); }
            _ => { grads.remove::<B::InnerBackend, 1>(id); }
        }
    }
}

/// Zero the gradient wherever `frozen` is set.
fn mask_gradient<B: AutodiffBackend, const D: usize>(
    grads:  &mut GradientsParams,
    id:     ParamId,
    frozen: &[bool],
) {
    if let Some(grad) = grads.remove::<B::InnerBackend, D>(id) {
        let mask = Tensor::<B::InnerBackend, D, Bool>::from_data(
            TensorData::new(frozen.to_vec(), grad.dims()),
            &grad.device(),
        );
        grads.register::<B::InnerBackend, D>(id, grad.mask_fill(mask, 0.0));
    }
}

/// Put `before` back wherever `frozen` is set.
fn restore_frozen<B: AutodiffBackend, const D: usize>(
    param:  &mut Param<Tensor<B, D>>,
    before: Tensor<B, D>,
    frozen: &[bool],
) {
    let current = param.val();
    let mask = Tensor::<B, D, Bool>::from_data(
        TensorData::new(frozen.to_vec(), current.dims()),
        &current.device(),
    );
    let restored = current.mask_where(mask, before).detach().require_grad();
    *param = Param::initialized(param.id, restored);
}

/// Row-major `[rows, cols]` mask, frozen where the row's style is outside the set.
fn frozen_rows(set: &FineTuneSet, rows: usize, cols: usize) -> Vec<bool> {
    (0..rows)
        .flat_map(|r| std::iter::repeat(!set.contains(StyleId(r))).take(cols))
        .collect()
}

/// Row-major `[rows, cols]` mask, frozen where the column's style is outside the set.
fn frozen_cols(set: &FineTuneSet, rows: usize, cols: usize) -> Vec<bool> {
    (0..rows)
        .flat_map(|_| (0..cols).map(|c| !set.contains(StyleId(c))))
        .collect()
}

/// Whether source and target trade places for global step `step`.
fn swaps_roles(mode: &BuildMode, flip_labels: bool, step: usize) -> bool {
    match (mode.no_target_source, flip_labels) {
        (false, _)    => false,
        (true, true)  => step % 2 == 1,
        (true, false) => true,
    }
}

/// Generator tables holding one row per style: the embedding first,
/// then scale and shift of every conditional decoder norm.
fn per_style_params<B: Backend>(generator: &Generator<B>) -> Vec<&Param<Tensor<B, 2>>> {
    let mut params = vec![&generator.embedding.weight];
    for block in &generator.decoder {
        if let Some(DecoderNorm::Conditional(norm)) = &block.norm {
            params.push(&norm.gamma);
            params.push(&norm.beta);
        }
    }
    params
}

fn per_style_params_mut<B: Backend>(generator: &mut Generator<B>) -> Vec<&mut Param<Tensor<B, 2>>> {
    let mut params = vec![&mut generator.embedding.weight];
    for block in &mut generator.decoder {
        if let Some(DecoderNorm::Conditional(norm)) = &mut block.norm {
            params.push(&mut norm.gamma);
            params.push(&mut norm.beta);
        }
    }
    params
}

// ─── GanTrainer ───────────────────────────────────────────────────────────────
pub struct GanTrainer<B: AutodiffBackend, OG, OD> {
    session:       Session<B>,
    config:        TrainConfig,
    model_config:  ModelConfig,
    mode:          BuildMode,
    phase:         TrainerPhase,
    generator:     Generator<B>,
    discriminator: Discriminator<B>,
    optim_g:       OG,
    optim_d:       OD,
    losses:        LossComposer,
    state:         TrainingState,
    fine_tune:     Option<FineTuneSet>,
    frozen_encoder: Vec<(ParamId, usize)>,
    batcher:       GlyphBatcher<B>,
    train:         GlyphDataset,
    val:           GlyphDataset,
    val_window:    ValidationWindow,
    checkpoints:   CheckpointManager,
    sampler:       Box<dyn SampleSink>,
    metrics:       Option<MetricsLogger>,
    lock:          Option<DirLock>,
    batches_run:   usize,
    checkpoints_written:  usize,
    last_checkpoint_step: Option<usize>,
}

/// Build a trainer with Adam optimizers for both networks.
pub fn build_trainer<B: AutodiffBackend>(
    session: Session<B>,
    config:  TrainConfig,
    mode:    BuildMode,
    train:   GlyphDataset,
    val:     GlyphDataset,
) -> GanResult<
    GanTrainer<
        B,
        impl Optimizer<Generator<B>, B> + Clone,
        impl Optimizer<Discriminator<B>, B> + Clone,
    >,
> {
    let optim_cfg = AdamConfig::new().with_beta_1(config.beta1 as f32);
    let optim_g = optim_cfg.init::<B, Generator<B>>();
    let optim_d = optim_cfg.init::<B, Discriminator<B>>();
    GanTrainer::new(session, config, mode, train, val, optim_g, optim_d)
}

impl<B, OG, OD> GanTrainer<B, OG, OD>
where
    B:  AutodiffBackend,
    OG: Optimizer<Generator<B>, B> + Clone,
    OD: Optimizer<Discriminator<B>, B> + Clone,
{
    pub fn new(
        session: Session<B>,
        config:  TrainConfig,
        mode:    BuildMode,
        train:   GlyphDataset,
        val:     GlyphDataset,
        optim_g: OG,
        optim_d: OD,
    ) -> GanResult<Self> {
        let mut phase = TrainerPhase::Uninitialized;
        config.validate()?;

        let model_config = config.model_config().with_inst_norm(mode.inst_norm);
        model_config.validate()?;

        let device        = session.device().clone();
        let generator     = model_config.init_generator::<B>(&device);
        let discriminator = model_config.init_discriminator::<B>(&device);
        let frozen_encoder = if config.freeze_encoder {
            encoder_param_ids(&generator)
        } else {
            Vec::new()
        };

        tracing::info!(
            "Built generator ({} encoder layers, {} styles × {}) and discriminator, inst_norm={}",
            model_config.encoder_layers(),
            model_config.embedding_num,
            model_config.embedding_dim,
            model_config.inst_norm,
        );
        phase.advance(TrainerPhase::Built)?;

        Ok(Self {
            losses:        LossComposer::new(config.loss_weights()),
            state:         TrainingState::fresh(config.learning_rate(0)),
            fine_tune:     config.fine_tune_set()?,
            checkpoints:   CheckpointManager::new(config.checkpoint_dir()),
            sampler:       Box::new(ImageSampler::new(config.sample_dir())),
            batcher:       GlyphBatcher::new(device),
            val_window:    ValidationWindow::default(),
            metrics:       None,
            lock:          None,
            batches_run:   0,
            checkpoints_written:  0,
            last_checkpoint_step: None,
            session,
            config,
            model_config,
            mode,
            phase,
            generator,
            discriminator,
            optim_g,
            optim_d,
            frozen_encoder,
            train,
            val,
        })
    }

    /// Send samples somewhere other than the experiment's sample dir.
    pub fn with_sample_sink(mut self, sink: Box<dyn SampleSink>) -> Self {
        self.sampler = sink;
        self
    }

    pub fn phase(&self) -> TrainerPhase {
        self.phase
    }

    pub fn state(&self) -> TrainingState {
        self.state
    }

    pub fn generator(&self) -> &Generator<B> {
        &self.generator
    }

    pub fn discriminator(&self) -> &Discriminator<B> {
        &self.discriminator
    }

    pub fn model_config(&self) -> &ModelConfig {
        &self.model_config
    }

    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    pub fn snapshot(&self) -> GanResult<ParameterSnapshot> {
        ParameterSnapshot::capture(&self.generator, &self.discriminator)
    }

    pub fn batches_per_epoch(&self) -> usize {
        EpochCycler::new(self.train.len(), self.config.batch_size).batches_per_epoch()
    }

    /// Stack the training examples at `indices` into a batch.
    pub fn make_batch(&self, indices: &[usize]) -> GlyphBatch<B> {
        let items: Vec<Example> = indices.iter().filter_map(|&i| self.train.get(i)).collect();
        self.batcher.batch(items)
    }

    // ─── BUILT → RUNNING ──────────────────────────────────────────────────────

    /// Take the experiment lock, then resume or start fresh.
    pub fn start(&mut self) -> GanResult<()> {
        if !self.mode.is_training {
            return Err(GanError::config("trainer was built for evaluation only"));
        }
        if self.phase != TrainerPhase::Built {
            return Err(GanError::config(format!("cannot start a trainer that is {}", self.phase)));
        }
        self.lock = Some(DirLock::acquire(self.checkpoints.dir())?);

        if self.config.resume {
            self.restore_latest()?;
        } else if let Some(step) = self.checkpoints.latest_step()? {
            return Err(GanError::checkpoint(format!(
                "'{}' already holds checkpoint step {step}; resume it or pick another experiment_id",
                self.checkpoints.dir().display()
            )));
        }

        self.checkpoints.save_model_config(&self.model_config)?;
        self.checkpoints.save_train_config(&self.config)?;
        self.metrics = Some(MetricsLogger::new(&self.config.log_dir())?);
        self.phase.advance(TrainerPhase::Running)
    }

    fn restore_latest(&mut self) -> GanResult<()> {
        let Some(step) = self.checkpoints.latest_step()? else {
            tracing::warn!(
                "No checkpoint found in '{}', starting from fresh initialization",
                self.checkpoints.dir().display()
            );
            return Ok(());
        };

        let stored = self.checkpoints.load_model_config()?.ok_or_else(|| {
            GanError::checkpoint(format!(
                "'{}' holds checkpoints but no model_config.json",
                self.checkpoints.dir().display()
            ))
        })?;
        self.model_config.ensure_compatible(&stored)?;

        let restored = self.checkpoints.load_training(
            step,
            self.generator.clone(),
            self.discriminator.clone(),
            self.optim_g.clone(),
            self.optim_d.clone(),
            self.session.device(),
        )?;
        if restored.state.global_step != step {
            tracing::warn!(
                "Checkpoint dir step_{} records global step {}",
                step, restored.state.global_step
            );
        }

        self.generator     = restored.generator;
        self.discriminator = restored.discriminator;
        self.optim_g       = restored.optim_g;
        self.optim_d       = restored.optim_d;
        self.state         = restored.state;
        self.last_checkpoint_step = Some(self.state.global_step);
        tracing::info!(
            "Resumed from step {} at epoch {}, lr {}",
            self.state.global_step, self.state.epoch, self.state.learning_rate
        );
        Ok(())
    }

    // ─── One optimizer step ───────────────────────────────────────────────────

    fn restricted_classifier(&self) -> Option<&FineTuneSet> {
        match self.config.fine_tune_scope {
            FineTuneScope::EmbeddingAndClassifier => self.fine_tune.as_ref(),
            FineTuneScope::Embedding => None,
        }
    }

    /// One discriminator update followed by one generator update.
    pub fn step_batch(&mut self, batch: GlyphBatch<B>) -> GanResult<LossReport> {
        if self.phase != TrainerPhase::Running {
            return Err(GanError::config(format!("cannot train while {}", self.phase)));
        }
        let step = self.state.global_step + 1;
        let lr   = self.state.learning_rate;
        let batch = if swaps_roles(&self.mode, self.config.flip_labels, step) {
            batch.swapped()
        } else {
            batch
        };
        let GlyphBatch { source, target, style_ids, .. } = batch;

        // ── Discriminator ─────────────────────────────────────────────────────
        let fake    = self.generator.forward(source.clone(), style_ids.clone()).image.detach();
        let on_real = self.discriminator.discriminate(source.clone(), target.clone());
        let on_fake = self.discriminator.discriminate(source.clone(), fake);
        let d = self.losses.discriminator(on_real, on_fake, style_ids.clone());

        let d_loss = scalar(&d.total);
        if !d_loss.is_finite() {
            return Err(GanError::Divergence { step, d_loss, g_loss: f64::NAN });
        }

        let mut grads = GradientsParams::from_grads(d.total.backward(), &self.discriminator);
        let head = &self.discriminator.classifier_head;
        let [c, k] = head.weight.dims();
        let head_mask = self.restricted_classifier().map(|set| {
            (frozen_cols(set, c, k), frozen_cols(set, 1, k))
        });
        let head_before = head_mask.as_ref().map(|_| {
            (head.weight.val(), head.bias.as_ref().map(|b| b.val()))
        });
        if let Some((weight_mask, bias_mask)) = &head_mask {
            mask_gradient::<B, 2>(&mut grads, head.weight.id, weight_mask);
            if let Some(bias) = &head.bias {
                mask_gradient::<B, 1>(&mut grads, bias.id, bias_mask);
            }
        }
        // committed only once the generator loss is known to be finite
        let mut optim_d = self.optim_d.clone();
        let mut discriminator = optim_d.step(lr, self.discriminator.clone(), grads);
        if let (Some((weight_mask, bias_mask)), Some((weight, bias))) = (head_mask, head_before) {
            let head = &mut discriminator.classifier_head;
            restore_frozen(&mut head.weight, weight, &weight_mask);
            if let (Some(param), Some(before)) = (head.bias.as_mut(), bias) {
                restore_frozen(param, before, &bias_mask);
            }
        }

        // ── Generator ─────────────────────────────────────────────────────────
        let out         = self.generator.forward(source.clone(), style_ids.clone());
        let target_code = self.generator.encode(target.clone());
        let on_fake     = discriminator.discriminate(source, out.image.clone());
        let g = self.losses.generator(out.image, target, out.bottleneck, target_code, on_fake, style_ids);

        let g_loss = scalar(&g.total);
        if !g_loss.is_finite() {
            return Err(GanError::Divergence { step, d_loss, g_loss });
        }

        self.discriminator = discriminator;
        self.optim_d       = optim_d;

        let mut grads = GradientsParams::from_grads(g.total.backward(), &self.generator);
        drop_gradients::<B>(&mut grads, &self.frozen_encoder);

        let frozen: Option<Vec<(Vec<bool>, Tensor<B, 2>)>> = self.fine_tune.as_ref().map(|set| {
            per_style_params(&self.generator)
                .into_iter()
                .map(|param| {
                    let [rows, cols] = param.dims();
                    (frozen_rows(set, rows, cols), param.val())
                })
                .collect()
        });
        if let Some(frozen) = &frozen {
            for (param, (mask, _)) in per_style_params(&self.generator).into_iter().zip(frozen) {
                mask_gradient::<B, 2>(&mut grads, param.id, mask);
            }
        }
        self.generator = self.optim_g.step(lr, self.generator.clone(), grads);
        if let Some(frozen) = frozen {
            for (param, (mask, before)) in per_style_params_mut(&mut self.generator).into_iter().zip(frozen) {
                restore_frozen(param, before, &mask);
            }
        }

        self.state.global_step = step;
        self.batches_run += 1;
        Ok(LossReport::from_losses(&d, &g))
    }

    // ─── Side outputs ─────────────────────────────────────────────────────────

    /// Render the next validation slice with the current generator.
    pub fn sample(&mut self) -> GanResult<()> {
        let indices = self.val_window.next_indices(self.val.len(), self.config.batch_size);
        let items: Vec<Example> = indices.iter().filter_map(|&i| self.val.get(i)).collect();
        if items.is_empty() {
            return Ok(());
        }
        let size = self.model_config.image_size;

        let generator = self.generator.valid();
        let batcher   = GlyphBatcher::<B::InnerBackend>::new(self.session.device().clone());
        let batch     = batcher.batch(items);
        let batch     = if self.mode.no_target_source && !self.config.flip_labels {
            batch.swapped()
        } else {
            batch
        };

        let generated = generator.forward(batch.source.clone(), batch.style_ids.clone()).image;
        let sheet = SampleSheet {
            epoch:     self.state.epoch,
            step:      self.state.global_step,
            size,
            labels:    batch.labels.clone(),
            sources:   planes(batch.source, size)?,
            targets:   planes(batch.target, size)?,
            generated: planes(generated, size)?,
        };
        self.sampler.write_sample(&sheet)
    }

    /// RUNNING → CHECKPOINTING → RUNNING
    pub fn checkpoint(&mut self) -> GanResult<()> {
        self.phase.advance(TrainerPhase::Checkpointing)?;
        let saved = self.checkpoints.save(
            &self.generator,
            &self.discriminator,
            &self.optim_g,
            &self.optim_d,
            &self.state,
        );
        self.phase.advance(TrainerPhase::Running)?;
        saved?;
        self.checkpoints_written += 1;
        self.last_checkpoint_step = Some(self.state.global_step);
        Ok(())
    }

    fn log_step(&self, report: &LossReport, batch: usize, batches: usize) -> GanResult<()> {
        let step = self.state.global_step;
        if let Some(metrics) = &self.metrics {
            metrics.log(&StepMetrics {
                step,
                epoch:  self.state.epoch,
                lr:     self.state.learning_rate,
                losses: *report,
            })?;
        }
        if step % self.config.log_steps == 0 {
            tracing::info!(
                "Epoch: [{:2}], [{:4}/{:4}] step {} d_loss: {:.5}, g_loss: {:.5}, cheat: {:.5}, \
                 const: {:.5}, l1: {:.5}, tv: {:.5}, category: {:.5}",
                self.state.epoch, batch + 1, batches, step,
                report.d_loss, report.g_loss, report.cheat,
                report.constant, report.l1, report.tv, report.category_fake,
            );
        }
        Ok(())
    }

    // ─── Full run ─────────────────────────────────────────────────────────────

    /// Train for the configured epochs, checkpoint and stop.
    pub fn run(&mut self) -> GanResult<TrainingReport> {
        if self.train.is_empty() {
            return Err(GanError::data("no training examples to train on"));
        }
        if self.phase == TrainerPhase::Built {
            self.start()?;
        }

        let cycler  = EpochCycler::new(self.train.len(), self.config.batch_size);
        let batches = cycler.batches_per_epoch();
        let sampling = !self.config.no_val && !self.val.is_empty();

        for epoch in self.state.epoch..self.config.epoch {
            let lr = self.config.learning_rate(epoch);
            if lr != self.state.learning_rate {
                tracing::info!("Decay learning rate from {} to {}", self.state.learning_rate, lr);
            }
            self.state.epoch = epoch;
            self.state.learning_rate = lr;

            let order = cycler.epoch(self.session.rng());
            for (b, indices) in order.iter().enumerate() {
                let mut items: Vec<Example> =
                    indices.iter().filter_map(|&i| self.train.get(i)).collect();
                if self.config.augment {
                    for item in &mut items {
                        item.pair = augment_pair(&item.pair, self.session.rng())?;
                    }
                }
                let batch  = self.batcher.batch(items);
                let report = self.step_batch(batch)?;
                self.log_step(&report, b, batches)?;

                let step = self.state.global_step;
                if sampling && step % self.config.sample_steps == 0 {
                    self.sample()?;
                }
                // a checkpoint on the last batch must not replay this epoch
                if b + 1 == batches {
                    self.state.epoch = epoch + 1;
                }
                if step % self.config.checkpoint_steps == 0 {
                    self.checkpoint()?;
                }
            }
        }
        self.state.epoch = self.config.epoch.max(self.state.epoch);

        if self.state.global_step > 0 && self.last_checkpoint_step != Some(self.state.global_step) {
            self.checkpoint()?;
        }
        self.stop()?;

        Ok(TrainingReport {
            batches:             self.batches_run,
            checkpoints_written: self.checkpoints_written,
            final_step:          self.state.global_step,
            final_epoch:         self.state.epoch,
            phase:               self.phase,
        })
    }

    /// RUNNING → STOPPED, releasing the experiment lock.
    pub fn stop(&mut self) -> GanResult<()> {
        self.phase.advance(TrainerPhase::Stopped)?;
        self.lock = None;
        tracing::info!("Trainer stopped at step {}", self.state.global_step);
        Ok(())
    }
}

/// Split an image batch into one flat pixel vector per example.
fn planes<B: Backend>(images: Tensor<B, 4>, size: usize) -> GanResult<Vec<Vec<f32>>> {
    let values = images
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| GanError::data(format!("cannot read generated pixels: {e:?}")))?;
    Ok(values.chunks(size * size).map(<[f32]>::to_vec).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    use crate::domain::example::{ExampleLabel, ImagePair};
    use crate::ml::losses::LossWeights;

    type TestBackend = Autodiff<NdArray>;

    fn examples(n: usize) -> GlyphDataset {
        GlyphDataset::new(
            (0..n)
                .map(|i| {
                    let source = (0..256).map(|p| if p % 16 == i % 16 { 1.0 } else { -1.0 }).collect();
                    let target = (0..256).map(|p| if p / 16 == i % 16 { 1.0 } else { -1.0 }).collect();
                    Example::new(StyleId(i % 2), ImagePair::new(16, source, target), ExampleLabel::Sequence(i as u32))
                })
                .collect(),
        )
    }

    #[test]
    fn test_flip_labels_swaps_on_odd_steps() {
        let flip = BuildMode { is_training: true, inst_norm: false, no_target_source: true };
        let plain = BuildMode { no_target_source: false, ..flip };
        assert_eq!(
            (1..=4).map(|s| swaps_roles(&flip, true, s)).collect::<Vec<_>>(),
            vec![true, false, true, false]
        );
        assert!((1..=4).all(|s| swaps_roles(&flip, false, s)));
        assert!((1..=4).all(|s| !swaps_roles(&plain, false, s)));
    }

    #[test]
    fn test_generator_divergence_leaves_discriminator_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let config = TrainConfig {
            experiment_dir:    tmp.path().display().to_string(),
            image_size:        16,
            embedding_num:     2,
            embedding_dim:     4,
            generator_dim:     2,
            discriminator_dim: 2,
            batch_size:        4,
            ..TrainConfig::default()
        };
        let session = Session::<TestBackend>::new(Default::default(), config.seed);
        let mode = config.build_mode();
        let mut t = build_trainer(session, config, mode, examples(8), GlyphDataset::new(Vec::new())).unwrap();
        t.start().unwrap();
        t.losses = LossComposer::new(LossWeights { l1: f64::NAN, ..LossWeights::default() });

        let before = t.snapshot().unwrap();
        let batch = t.make_batch(&[0, 1, 2, 3]);
        match t.step_batch(batch) {
            Err(GanError::Divergence { step, d_loss, g_loss }) => {
                assert_eq!(step, 1);
                assert!(d_loss.is_finite());
                assert!(g_loss.is_nan());
            }
            other => panic!("expected divergence, got {other:?}"),
        }
        assert_eq!(t.snapshot().unwrap(), before);
        assert_eq!(t.state().global_step, 0);
    }

    #[test]
    fn test_row_and_column_masks() {
        let set = FineTuneSet::from_ids([1]);
        assert_eq!(frozen_rows(&set, 3, 2), vec![true, true, false, false, true, true]);
        assert_eq!(frozen_cols(&set, 2, 3), vec![true, false, true, true, false, true]);
    }
}
